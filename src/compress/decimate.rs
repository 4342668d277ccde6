//! Error-bounded keyframe reduction.
//!
//! A single left-to-right pass grows a segment from the last kept key
//! until some skipped sample can no longer be rebuilt, within tolerance,
//! by interpolating between the quantized segment endpoints. The key just
//! before the failing end is then kept and the segment restarts there.

use crate::codec::ValueCodec;
use crate::core::{CurveValue, Tick};

/// Keys surviving decimation.
#[derive(Clone, Debug, PartialEq)]
pub struct Decimated<V> {
    pub times: Vec<Tick>,
    pub values: Vec<V>,
}

impl<V> Decimated<V> {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Indices of the samples to keep.
///
/// `interpolate` rebuilds in-between values, `round_trip` models the
/// quantization applied to stored keys and `within` is the closeness test.
/// The first and last index are always kept; a non-positive tolerance keeps
/// every sample.
pub fn decimate_indices<V, I, R, W>(
    values: &[V],
    tolerance: f32,
    interpolate: I,
    round_trip: R,
    within: W,
) -> Vec<usize>
where
    V: Copy,
    I: Fn(V, V, f32) -> V,
    R: Fn(V) -> V,
    W: Fn(V, V, f32) -> bool,
{
    let n = values.len();
    if n <= 2 || tolerance <= 0.0 {
        return (0..n).collect();
    }

    let mut keep = vec![0];
    let mut first = 0;
    let mut end = 2;
    while end < n {
        let a = round_trip(values[first]);
        let b = round_trip(values[end]);
        let span = (end - first) as f32;
        let fits = (first + 1..end).all(|i| {
            let rebuilt = interpolate(a, b, (i - first) as f32 / span);
            within(rebuilt, values[i], tolerance)
        });
        if fits {
            end += 1;
        } else {
            keep.push(end - 1);
            first = end - 1;
            end = first + 2;
        }
    }
    keep.push(n - 1);
    keep
}

/// Decimate with explicit interpolation, quantization and closeness.
pub fn decimate_with<V, I, R, W>(
    times: &[Tick],
    values: &[V],
    tolerance: f32,
    interpolate: I,
    round_trip: R,
    within: W,
) -> Decimated<V>
where
    V: Copy,
    I: Fn(V, V, f32) -> V,
    R: Fn(V) -> V,
    W: Fn(V, V, f32) -> bool,
{
    let n = times.len().min(values.len());
    let kept = decimate_indices(&values[..n], tolerance, interpolate, round_trip, within);
    Decimated {
        times: kept.iter().map(|&i| times[i]).collect(),
        values: kept.iter().map(|&i| values[i]).collect(),
    }
}

/// Decimate a curve as it will read back through `codec`.
pub fn decimate<C: ValueCodec>(
    times: &[Tick],
    values: &[C::Value],
    tolerance: f32,
    codec: C,
) -> Decimated<C::Value> {
    decimate_with(
        times,
        values,
        tolerance,
        C::Value::interpolate,
        |v| codec.round_trip(v),
        C::Value::within,
    )
}

/// Decimate ignoring quantization.
pub fn decimate_exact<V: CurveValue>(times: &[Tick], values: &[V], tolerance: f32) -> Decimated<V> {
    decimate_with(times, values, tolerance, V::interpolate, |v| v, V::within)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RotationFormat;
    use crate::util::test_support::Rng;
    use crate::util::{Quat, Vec3};

    fn ticks(n: usize) -> Vec<Tick> {
        (0..n as Tick).collect()
    }

    #[test]
    fn test_identical_rotations_collapse() {
        let values = vec![Quat::from_rotation_y(0.7); 5];
        let d = decimate(&ticks(5), &values, 0.01, RotationFormat::NoCompressQuat);
        assert_eq!(d.times, vec![0, 4]);
        assert_eq!(d.values.len(), 2);
    }

    #[test]
    fn test_collinear_positions_collapse() {
        let values: Vec<Vec3> = (0..10).map(|i| Vec3::new(0.25 * i as f32, 0.0, -0.1 * i as f32)).collect();
        let d = decimate_exact(&ticks(10), &values, 0.001);
        assert_eq!(d.times, vec![0, 9]);
        assert_eq!(d.values, vec![values[0], values[9]]);
    }

    #[test]
    fn test_zero_tolerance_keeps_all() {
        let values = vec![Vec3::ONE; 6];
        assert_eq!(decimate_exact(&ticks(6), &values, 0.0).len(), 6);
    }

    #[test]
    fn test_short_inputs() {
        assert!(decimate_exact::<Vec3>(&[], &[], 0.1).is_empty());
        assert_eq!(decimate_exact(&[3], &[Vec3::X], 0.1).times, vec![3]);
        assert_eq!(decimate_exact(&[3, 9], &[Vec3::X, Vec3::X], 0.1).times, vec![3, 9]);
    }

    #[test]
    fn test_corner_is_kept() {
        // up then down: the peak must survive
        let values: Vec<Vec3> = (0..9)
            .map(|i| Vec3::new(0.0, 4.0 - (i as f32 - 4.0).abs(), 0.0))
            .collect();
        let d = decimate_exact(&ticks(9), &values, 0.01);
        assert_eq!(d.times, vec![0, 4, 8]);
    }

    #[test]
    fn test_subsequence_and_error_bound() {
        let mut rng = Rng::new(7);
        let times: Vec<Tick> = (0..120).map(|i| i * 2).collect();
        let mut p = Vec3::ZERO;
        let values: Vec<Vec3> = times
            .iter()
            .map(|_| {
                p += rng.vec3(0.05);
                p
            })
            .collect();

        let tol = 0.02;
        let d = decimate_exact(&times, &values, tol);
        assert_eq!(d.times.first(), times.first());
        assert_eq!(d.times.last(), times.last());
        assert!(d.times.windows(2).all(|w| w[0] < w[1]));

        // every dropped sample rebuilds within tolerance from its segment
        for seg in d.times.windows(2) {
            let (a, b) = (seg[0] as usize / 2, seg[1] as usize / 2);
            for i in a + 1..b {
                let t = (i - a) as f32 / (b - a) as f32;
                let rebuilt = values[a].lerp(values[b], t);
                assert!(rebuilt.distance(values[i]) <= tol * 1.0001);
            }
        }
    }

    #[test]
    fn test_quantization_counts_toward_error() {
        // a slow spin decimates less under a coarse format
        let values: Vec<Quat> = (0..60).map(|i| Quat::from_rotation_z(i as f32 * 0.002)).collect();
        let exact = decimate(&ticks(60), &values, 0.004, RotationFormat::NoCompressQuat);
        let coarse = decimate(&ticks(60), &values, 0.004, RotationFormat::SmallTreeDword);
        assert_eq!(exact.len(), 2);
        assert!(coarse.len() >= exact.len());
    }
}
