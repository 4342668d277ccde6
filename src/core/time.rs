//! Tick timeline shared by every channel.
//!
//! Animation samples live on a fixed-rate integer timeline. Legacy
//! combined tracks used a finer tick unit which is divided down on load.

use crate::util::{Error, Result};

/// Integer sample time.
pub type Tick = i32;

/// Ticks per second of the compressed timeline.
pub const TICKS_PER_SECOND: u32 = 30;

/// Seconds covered by one tick.
pub const SECONDS_PER_TICK: f32 = 1.0 / TICKS_PER_SECOND as f32;

/// Legacy combined tracks store this many raw ticks per key.
pub const LEGACY_TICKS_PER_KEY: i32 = 160;

/// Legacy combined tracks store positions in centimetres.
pub const LEGACY_POSITION_SCALE: f32 = 0.01;

/// Largest tick magnitude an `f32` time key represents exactly.
pub const MAX_EXACT_F32_TICK: u32 = 1 << 24;

/// Index of the first key that is not strictly greater than its predecessor.
#[inline]
pub fn first_unsorted(times: &[Tick]) -> Option<usize> {
    times.windows(2).position(|w| w[1] <= w[0]).map(|i| i + 1)
}

/// Fail with [`Error::UnsortedKeys`] unless `times` is strictly ascending.
pub fn ensure_ascending(times: &[Tick]) -> Result<()> {
    match first_unsorted(times) {
        Some(index) => Err(Error::UnsortedKeys { index }),
        None => Ok(()),
    }
}

/// Convert a tick span to seconds.
#[inline]
pub fn ticks_to_seconds(ticks: Tick, seconds_per_tick: f32) -> f32 {
    ticks as f32 * seconds_per_tick
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_unsorted() {
        assert_eq!(first_unsorted(&[]), None);
        assert_eq!(first_unsorted(&[0, 1, 5, 9]), None);
        assert_eq!(first_unsorted(&[0, 1, 1, 2]), Some(2));
        assert_eq!(first_unsorted(&[3, 2]), Some(1));
    }

    #[test]
    fn test_ensure_ascending() {
        assert!(ensure_ascending(&[0, 2, 4]).is_ok());
        assert!(matches!(
            ensure_ascending(&[0, 4, 2]),
            Err(Error::UnsortedKeys { index: 2 })
        ));
    }

    #[test]
    fn test_ticks_to_seconds() {
        assert!((ticks_to_seconds(30, SECONDS_PER_TICK) - 1.0).abs() < 1e-6);
    }
}
