//! Per-channel format trial.
//!
//! Every candidate format decimates the channel as it would read back
//! through that format. A candidate is eligible when each stored key also
//! reads back within tolerance; the eligible candidate with the smallest
//! aligned output wins, ties going to the earlier candidate.

use tracing::{trace, warn};

use super::{KeyTimeFormat, ValueCodec};
use crate::compress::decimate;
use crate::core::{Channel, CurveValue, Tick};
use crate::util::{align4, Error, Result};

/// Winning format and the keys it stores.
#[derive(Clone, Debug, PartialEq)]
pub struct Selection<C: ValueCodec> {
    pub format: C,
    pub times: Vec<Tick>,
    pub values: Vec<C::Value>,
    /// Aligned value bytes plus aligned own time bytes.
    pub encoded_size: usize,
    /// Set when no candidate met the tolerance.
    pub warning: Option<String>,
}

/// Aligned size of a channel stored with its own time axis.
pub fn stored_size(byte_size: usize, times: &[Tick]) -> usize {
    let time_bytes = times.len() * KeyTimeFormat::narrowest(times).byte_size();
    align4(times.len() * byte_size) + align4(time_bytes)
}

/// Pick the smallest eligible format for `channel`.
///
/// When none is eligible, falls back with a warning to the first candidate
/// whose round trip keeps every value finite. Fails on an empty candidate
/// list or when no candidate can represent the values at all.
pub fn select_format<C: ValueCodec>(
    channel: &Channel<C::Value>,
    tolerance: f32,
    candidates: &[C],
) -> Result<Selection<C>> {
    let Some(&first) = candidates.first() else {
        return Err(Error::config("empty format candidate list"));
    };

    let mut best: Option<Selection<C>> = None;
    for &format in candidates {
        let d = decimate(channel.times(), channel.values(), tolerance, format);
        let exact = d
            .values
            .iter()
            .all(|&v| C::Value::within(format.round_trip(v), v, tolerance));
        let size = stored_size(format.byte_size(), &d.times);
        trace!(?format, keys = d.len(), size, exact, "format trial");
        if !exact {
            continue;
        }
        if best.as_ref().map_or(true, |b| size < b.encoded_size) {
            best = Some(Selection {
                format,
                times: d.times,
                values: d.values,
                encoded_size: size,
                warning: None,
            });
        }
    }

    if let Some(best) = best {
        return Ok(best);
    }

    // closest effort: the first candidate that can still represent every value
    let representable = candidates.iter().copied().find(|&format| {
        channel.values().iter().all(|&v| format.round_trip(v).is_finite())
    });
    let Some(format) = representable else {
        return Err(Error::format(format!(
            "no candidate format can represent the channel; first tried {first:?}"
        )));
    };
    let msg = format!("no format meets tolerance {tolerance}; using {format:?}");
    warn!("{msg}");
    let d = decimate(channel.times(), channel.values(), tolerance, format);
    let encoded_size = stored_size(format.byte_size(), &d.times);
    Ok(Selection {
        format,
        times: d.times,
        values: d.values,
        encoded_size,
        warning: Some(msg),
    })
}
