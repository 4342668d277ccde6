//! Keyed curves for a single joint property.

use std::fmt;

use super::time::{ensure_ascending, Tick};
use crate::util::{rotation_within, vector_within, Error, Quat, Result, Vec3};

/// Value type a channel can hold.
pub trait CurveValue: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Neutral value (identity rotation, zero offset).
    const IDENTITY: Self;

    /// Interpolate between two keys, `t` in `[0, 1]`.
    fn interpolate(a: Self, b: Self, t: f32) -> Self;

    /// Closeness test used for decimation and deletion.
    fn within(a: Self, b: Self, tolerance: f32) -> bool;

    fn is_finite(&self) -> bool;
}

impl CurveValue for Quat {
    const IDENTITY: Self = Quat::IDENTITY;

    #[inline]
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.slerp(b, t)
    }

    #[inline]
    fn within(a: Self, b: Self, tolerance: f32) -> bool {
        rotation_within(a, b, tolerance)
    }

    #[inline]
    fn is_finite(&self) -> bool {
        Quat::is_finite(*self)
    }
}

impl CurveValue for Vec3 {
    const IDENTITY: Self = Vec3::ZERO;

    #[inline]
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }

    #[inline]
    fn within(a: Self, b: Self, tolerance: f32) -> bool {
        vector_within(a, b, tolerance)
    }

    #[inline]
    fn is_finite(&self) -> bool {
        Vec3::is_finite(*self)
    }
}

/// Ordered `(tick, value)` samples with strictly ascending ticks.
#[derive(Clone, Debug, PartialEq)]
pub struct Channel<V> {
    times: Vec<Tick>,
    values: Vec<V>,
}

/// Rotation curve.
pub type RotationChannel = Channel<Quat>;
/// Position curve (metres).
pub type PositionChannel = Channel<Vec3>;
/// Per-axis scale curve.
pub type ScaleChannel = Channel<Vec3>;

impl<V: CurveValue> Channel<V> {
    /// Build a channel, checking array lengths and key order.
    pub fn new(times: Vec<Tick>, values: Vec<V>) -> Result<Self> {
        if times.len() != values.len() {
            return Err(Error::format(format!(
                "{} key times but {} values",
                times.len(),
                values.len()
            )));
        }
        ensure_ascending(&times)?;
        Ok(Self { times, values })
    }

    /// Channel with one sample per tick starting at `start`.
    pub fn from_dense(start: Tick, values: Vec<V>) -> Self {
        let times = (0..values.len() as Tick).map(|i| start + i).collect();
        Self { times, values }
    }

    /// Channel holding a single key.
    pub fn constant(tick: Tick, value: V) -> Self {
        Self { times: vec![tick], values: vec![value] }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    #[inline]
    pub fn times(&self) -> &[Tick] {
        &self.times
    }

    #[inline]
    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn first(&self) -> Option<(Tick, V)> {
        Some((*self.times.first()?, *self.values.first()?))
    }

    pub fn last(&self) -> Option<(Tick, V)> {
        Some((*self.times.last()?, *self.values.last()?))
    }

    /// Iterate over `(tick, value)` pairs.
    pub fn keys(&self) -> impl Iterator<Item = (Tick, V)> + '_ {
        self.times.iter().copied().zip(self.values.iter().copied())
    }

    /// Evaluate the curve at `tick`, clamping outside the key range.
    pub fn sample(&self, tick: Tick) -> Option<V> {
        let (first, last) = (self.first()?, self.last()?);
        if tick <= first.0 {
            return Some(first.1);
        }
        if tick >= last.0 {
            return Some(last.1);
        }
        let hi = self.times.partition_point(|&t| t <= tick);
        let lo = hi - 1;
        if self.times[lo] == tick {
            return Some(self.values[lo]);
        }
        let span = (self.times[hi] - self.times[lo]) as f32;
        let t = (tick - self.times[lo]) as f32 / span;
        Some(V::interpolate(self.values[lo], self.values[hi], t))
    }

    /// Evaluate at a normalized position in `[0, 1]` over the key range.
    pub fn sample_normalized(&self, t: f32) -> Option<V> {
        let (start, end) = (self.first()?.0, self.last()?.0);
        let tick = start as f32 + (end - start) as f32 * t.clamp(0.0, 1.0);
        let lo = tick.floor() as Tick;
        let frac = tick - lo as f32;
        let a = self.sample(lo)?;
        if frac <= 0.0 {
            return Some(a);
        }
        let b = self.sample(lo + 1)?;
        Some(V::interpolate(a, b, frac))
    }

    /// Replace every value in place. Key times are untouched.
    pub fn map_values(&mut self, mut f: impl FnMut(V) -> V) {
        for v in &mut self.values {
            *v = f(*v);
        }
    }

    /// Drop the first key.
    pub fn drop_first(&mut self) {
        if !self.times.is_empty() {
            self.times.remove(0);
            self.values.remove(0);
        }
    }

    pub fn into_parts(self) -> (Vec<Tick>, Vec<V>) {
        (self.times, self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates() {
        assert!(Channel::new(vec![0, 1, 2], vec![Vec3::ZERO; 3]).is_ok());
        assert!(matches!(
            Channel::new(vec![0, 2, 1], vec![Vec3::ZERO; 3]),
            Err(Error::UnsortedKeys { index: 2 })
        ));
        assert!(matches!(
            Channel::new(vec![0, 1], vec![Vec3::ZERO; 3]),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn test_sample_interpolates() {
        let ch = Channel::new(vec![0, 10], vec![Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0)]).unwrap();
        assert_eq!(ch.sample(-5), Some(Vec3::ZERO));
        assert_eq!(ch.sample(4), Some(Vec3::new(4.0, 0.0, 0.0)));
        assert_eq!(ch.sample(20), Some(Vec3::new(10.0, 0.0, 0.0)));
        assert_eq!(ch.sample_normalized(0.5), Some(Vec3::new(5.0, 0.0, 0.0)));

        let empty: Channel<Vec3> = Channel::new(vec![], vec![]).unwrap();
        assert_eq!(empty.sample(0), None);
    }

    #[test]
    fn test_map_and_drop_first() {
        let mut ch = Channel::from_dense(5, vec![Vec3::ONE, Vec3::splat(2.0)]);
        assert_eq!(ch.times(), &[5, 6]);
        ch.map_values(|v| v * 2.0);
        ch.drop_first();
        assert_eq!(ch.first(), Some((6, Vec3::splat(4.0))));
    }
}
