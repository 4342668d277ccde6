//! Normalization of on-disk track representations into sample arrays.

use crate::core::{Channel, CurveValue, Tick, Track};
use crate::util::{quat_exp, Error, Quat, Result, Vec3};

/// Legacy track: every key carries rotation, position and scale.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CombinedKeys {
    pub controller_id: u32,
    /// Key count stated by the source.
    pub declared_count: usize,
    /// Raw key times.
    pub times: Vec<Tick>,
    /// Half-angle log of the inverse rotation.
    pub rotation_logs: Vec<Vec3>,
    pub positions: Vec<Vec3>,
    /// Uniform scale per key; empty when the source has none.
    pub scales: Vec<f32>,
    /// Raw ticks per output tick.
    pub ticks_per_key: Tick,
    /// Multiplier applied to positions.
    pub position_scale: f32,
}

/// Independently keyed channels.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SeparatedKeys {
    pub controller_id: u32,
    pub rotation: Option<(Vec<Tick>, Vec<Quat>)>,
    pub position: Option<(Vec<Tick>, Vec<Vec3>)>,
    pub scale: Option<(Vec<Tick>, Vec<Vec3>)>,
}

/// Any track representation the extractor understands.
#[derive(Clone, Debug, PartialEq)]
pub enum RawTrack {
    Combined(CombinedKeys),
    Separated(SeparatedKeys),
}

/// Turn a raw track into a [`Track`] of clean channels.
///
/// Repeated timestamps keep their first sample. Non-finite components are
/// rejected with [`Error::Format`]; a declared count larger than the
/// arrays with [`Error::CorruptData`].
pub fn extract(raw: &RawTrack) -> Result<Track> {
    match raw {
        RawTrack::Combined(keys) => extract_combined(keys),
        RawTrack::Separated(keys) => extract_separated(keys),
    }
}

fn extract_combined(keys: &CombinedKeys) -> Result<Track> {
    let n = keys.declared_count;
    let available = [keys.times.len(), keys.rotation_logs.len(), keys.positions.len()]
        .into_iter()
        .chain((!keys.scales.is_empty()).then_some(keys.scales.len()))
        .min()
        .unwrap_or(0);
    if n > available {
        return Err(Error::CorruptData { declared: n, available });
    }
    let t0 = keys.times.first().copied().unwrap_or(0);
    let times = legacy_ticks(&keys.times[..n], t0, keys.ticks_per_key)?;
    let rotations = finite(&keys.rotation_logs[..n], "rotation")?
        .iter()
        .map(|&v| legacy_rotation(v))
        .collect();
    let positions = finite(&keys.positions[..n], "position")?
        .iter()
        .map(|&p| p * keys.position_scale)
        .collect();

    let mut track = Track::new(keys.controller_id)
        .with_rotation(dedup(&times, rotations)?)
        .with_position(dedup(&times, positions)?);
    if !keys.scales.is_empty() {
        let scales: Vec<Vec3> = keys.scales[..n].iter().map(|&s| Vec3::splat(s)).collect();
        track.scale = Some(dedup(&times, finite(&scales, "scale")?.to_vec())?);
    }
    Ok(track)
}

/// Convert raw legacy times to output ticks counted from `origin`.
///
/// Raw times that cannot be measured from `origin` in an `i32` are
/// rejected with [`Error::Format`].
pub fn legacy_ticks(raw: &[Tick], origin: Tick, ticks_per_key: Tick) -> Result<Vec<Tick>> {
    if ticks_per_key <= 0 {
        return Err(Error::format(format!("invalid ticks per key {ticks_per_key}")));
    }
    raw.iter()
        .map(|&t| {
            t.checked_sub(origin)
                .map(|d| d.div_euclid(ticks_per_key))
                .ok_or_else(|| Error::format(format!("legacy time {t} out of range from {origin}")))
        })
        .collect()
}

/// Rotation stored as the half-angle log of its inverse.
#[inline]
pub fn legacy_rotation(log: Vec3) -> Quat {
    quat_exp(log).conjugate().normalize()
}

fn extract_separated(keys: &SeparatedKeys) -> Result<Track> {
    let mut track = Track::new(keys.controller_id);
    if let Some((times, values)) = &keys.rotation {
        let values = paired(times, values, "rotation")?;
        track.rotation = Some(dedup(times, values.iter().map(|q| q.normalize()).collect())?);
    }
    if let Some((times, values)) = &keys.position {
        track.position = Some(dedup(times, paired(times, values, "position")?.to_vec())?);
    }
    if let Some((times, values)) = &keys.scale {
        track.scale = Some(dedup(times, paired(times, values, "scale")?.to_vec())?);
    }
    Ok(track)
}

fn paired<'a, V: CurveValue>(times: &[Tick], values: &'a [V], what: &str) -> Result<&'a [V]> {
    if values.len() < times.len() {
        return Err(Error::CorruptData { declared: times.len(), available: values.len() });
    }
    finite(&values[..times.len()], what)
}

fn finite<'a, V: CurveValue>(values: &'a [V], what: &str) -> Result<&'a [V]> {
    match values.iter().position(|v| !v.is_finite()) {
        Some(i) => Err(Error::format(format!("non-finite {what} at key {i}"))),
        None => Ok(values),
    }
}

/// Drop samples whose time repeats the previous one.
fn dedup<V: CurveValue>(times: &[Tick], values: Vec<V>) -> Result<Channel<V>> {
    let mut out_t = Vec::with_capacity(times.len());
    let mut out_v = Vec::with_capacity(times.len());
    for (&t, v) in times.iter().zip(values) {
        if out_t.last() == Some(&t) {
            continue;
        }
        out_t.push(t);
        out_v.push(v);
    }
    Channel::new(out_t, out_v)
}
