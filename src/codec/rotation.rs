//! Quantized rotation encodings.
//!
//! Every format stores a unit quaternion in a fixed number of bytes.
//! The "smallest three" formats drop the largest-magnitude component,
//! flip the sign so it is positive, and quantize the other three within
//! `[-1/sqrt(2), 1/sqrt(2)]`; the index of the dropped component sits in
//! the top two bits.
//!
//! Buffers are little-endian; `word_size` describes how to swap them.

use std::f32::consts::FRAC_1_SQRT_2;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::ValueCodec;
use crate::util::{Error, Quat, Result};

/// Fixed-size rotation encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationFormat {
    /// Four raw `f32` components.
    NoCompressQuat,
    /// `x, y, z` as `i16` with `w` rebuilt as non-negative.
    ShortInt3Quat,
    /// Smallest three, 10 bits per component.
    SmallTreeDword,
    /// Smallest three, 15 bits per component.
    SmallTree48Bit,
    /// Smallest three, 20 bits per component.
    SmallTree64Bit,
    /// Smallest three, 20/21/21 bits.
    SmallTree64BitExt,
}

impl RotationFormat {
    /// All formats in declaration order.
    pub const ALL: [RotationFormat; 6] = [
        Self::NoCompressQuat,
        Self::ShortInt3Quat,
        Self::SmallTreeDword,
        Self::SmallTree48Bit,
        Self::SmallTree64Bit,
        Self::SmallTree64BitExt,
    ];

    pub fn from_tag(tag: u16) -> Result<Self> {
        Ok(match tag {
            1 => Self::NoCompressQuat,
            3 => Self::ShortInt3Quat,
            4 => Self::SmallTreeDword,
            5 => Self::SmallTree48Bit,
            6 => Self::SmallTree64Bit,
            8 => Self::SmallTree64BitExt,
            _ => return Err(Error::UnsupportedFormat { kind: "rotation", tag }),
        })
    }

    /// Worst-case angular error in radians for unit input.
    pub const fn error_bound(self) -> f32 {
        match self {
            Self::NoCompressQuat => 0.0,
            Self::ShortInt3Quat => 0.02,
            Self::SmallTreeDword => 0.01,
            Self::SmallTree48Bit => 5e-4,
            Self::SmallTree64Bit | Self::SmallTree64BitExt => 1e-4,
        }
    }

    /// Bits per stored component of a smallest-three format.
    const fn component_bits(self) -> [u32; 3] {
        match self {
            Self::SmallTreeDword => [10, 10, 10],
            Self::SmallTree48Bit => [15, 15, 15],
            Self::SmallTree64Bit => [20, 20, 20],
            Self::SmallTree64BitExt => [20, 21, 21],
            Self::NoCompressQuat | Self::ShortInt3Quat => [0, 0, 0],
        }
    }

    /// Bit offset of the dropped-component index.
    const fn index_shift(self) -> u32 {
        match self {
            Self::SmallTreeDword => 30,
            Self::SmallTree48Bit => 45,
            Self::SmallTree64Bit => 60,
            Self::SmallTree64BitExt => 62,
            Self::NoCompressQuat | Self::ShortInt3Quat => 0,
        }
    }
}

impl ValueCodec for RotationFormat {
    type Value = Quat;

    fn tag(self) -> u16 {
        match self {
            Self::NoCompressQuat => 1,
            Self::ShortInt3Quat => 3,
            Self::SmallTreeDword => 4,
            Self::SmallTree48Bit => 5,
            Self::SmallTree64Bit => 6,
            Self::SmallTree64BitExt => 8,
        }
    }

    fn byte_size(self) -> usize {
        match self {
            Self::NoCompressQuat => 16,
            Self::ShortInt3Quat | Self::SmallTree48Bit => 6,
            Self::SmallTreeDword => 4,
            Self::SmallTree64Bit | Self::SmallTree64BitExt => 8,
        }
    }

    fn word_size(self) -> usize {
        match self {
            Self::ShortInt3Quat | Self::SmallTree48Bit => 2,
            _ => 4,
        }
    }

    fn encode(self, q: Quat) -> SmallVec<[u8; 16]> {
        let mut out = SmallVec::new();
        match self {
            Self::NoCompressQuat => {
                for c in q.to_array() {
                    out.extend_from_slice(&c.to_le_bytes());
                }
            }
            Self::ShortInt3Quat => {
                let q = q.normalize();
                let q = if q.w < 0.0 { -q } else { q };
                for c in [q.x, q.y, q.z] {
                    let v = (c * SHORT_SCALE).round().clamp(-SHORT_SCALE, SHORT_SCALE) as i16;
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            Self::SmallTreeDword => {
                let packed = pack_smallest_three(q, self.component_bits(), self.index_shift());
                out.extend_from_slice(&(packed as u32).to_le_bytes());
            }
            Self::SmallTree48Bit => {
                let packed = pack_smallest_three(q, self.component_bits(), self.index_shift());
                out.extend_from_slice(&packed.to_le_bytes()[..6]);
            }
            Self::SmallTree64Bit | Self::SmallTree64BitExt => {
                let packed = pack_smallest_three(q, self.component_bits(), self.index_shift());
                out.extend_from_slice(&(packed as u32).to_le_bytes());
                out.extend_from_slice(&((packed >> 32) as u32).to_le_bytes());
            }
        }
        out
    }

    fn decode(self, bytes: &[u8]) -> Quat {
        match self {
            Self::NoCompressQuat => {
                let c = |i: usize| f32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
                Quat::from_xyzw(c(0), c(4), c(8), c(12))
            }
            Self::ShortInt3Quat => {
                let c = |i: usize| f32::from(i16::from_le_bytes([bytes[i], bytes[i + 1]])) / SHORT_SCALE;
                let (x, y, z) = (c(0), c(2), c(4));
                let w = (1.0 - (x * x + y * y + z * z)).max(0.0).sqrt();
                Quat::from_xyzw(x, y, z, w).normalize()
            }
            _ => {
                let mut raw = [0u8; 8];
                raw[..bytes.len()].copy_from_slice(bytes);
                unpack_smallest_three(u64::from_le_bytes(raw), self.component_bits(), self.index_shift())
            }
        }
    }
}

const SHORT_SCALE: f32 = 32767.0;

fn pack_smallest_three(q: Quat, bits: [u32; 3], index_shift: u32) -> u64 {
    let q = q.normalize().to_array();
    let largest = (0..4)
        .max_by(|&a, &b| q[a].abs().total_cmp(&q[b].abs()))
        .unwrap_or(3);
    let sign = if q[largest] < 0.0 { -1.0 } else { 1.0 };

    let mut packed = 0u64;
    let mut shift = 0;
    for (slot, i) in (0..4).filter(|&i| i != largest).enumerate() {
        let max = ((1u64 << bits[slot]) - 1) as f32;
        let unit = (q[i] * sign / FRAC_1_SQRT_2 + 1.0) * 0.5;
        let field = (unit * max).round().clamp(0.0, max) as u64;
        packed |= field << shift;
        shift += bits[slot];
    }
    packed | ((largest as u64) << index_shift)
}

fn unpack_smallest_three(packed: u64, bits: [u32; 3], index_shift: u32) -> Quat {
    let largest = ((packed >> index_shift) & 3) as usize;
    let mut q = [0.0f32; 4];
    let mut shift = 0;
    let mut sum = 0.0;
    for (slot, i) in (0..4).filter(|&i| i != largest).enumerate() {
        let mask = (1u64 << bits[slot]) - 1;
        let field = (packed >> shift) & mask;
        let v = (field as f32 / mask as f32 * 2.0 - 1.0) * FRAC_1_SQRT_2;
        q[i] = v;
        sum += v * v;
        shift += bits[slot];
    }
    q[largest] = (1.0 - sum).max(0.0).sqrt();
    Quat::from_array(q).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_support::Rng;
    use crate::util::{angle_between, Vec3};

    fn round_trip_error(format: RotationFormat, q: Quat) -> f32 {
        let bytes = format.encode(q);
        assert_eq!(bytes.len(), format.byte_size());
        angle_between(q, format.decode(&bytes))
    }

    fn awkward_rotations() -> Vec<Quat> {
        let mut out = vec![
            Quat::IDENTITY,
            -Quat::IDENTITY,
            Quat::from_xyzw(1.0, 0.0, 0.0, 0.0),
            Quat::from_xyzw(0.0, -1.0, 0.0, 0.0),
            Quat::from_xyzw(0.0, 0.0, 0.0, -1.0),
            Quat::from_xyzw(0.5, 0.5, 0.5, 0.5),
            Quat::from_xyzw(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2),
            Quat::from_xyzw(0.0, FRAC_1_SQRT_2, -FRAC_1_SQRT_2, 0.0),
        ];
        for angle in [1e-6f32, 1e-4, 1e-2] {
            out.push(Quat::from_axis_angle(Vec3::new(0.3, -0.8, 0.5).normalize(), angle));
            out.push(Quat::from_axis_angle(Vec3::X, std::f32::consts::PI - angle));
        }
        out
    }

    #[test]
    fn test_tags_round_trip() {
        for format in RotationFormat::ALL {
            assert_eq!(RotationFormat::from_tag(format.tag()).unwrap(), format);
        }
        assert!(matches!(
            RotationFormat::from_tag(2),
            Err(Error::UnsupportedFormat { kind: "rotation", tag: 2 })
        ));
    }

    #[test]
    fn test_error_bounds_fuzzed() {
        let mut rng = Rng::new(0x5eed);
        let mut samples = awkward_rotations();
        samples.extend((0..2000).map(|_| rng.unit_quat()));

        for format in RotationFormat::ALL {
            for &q in &samples {
                let err = round_trip_error(format, q);
                assert!(
                    err <= format.error_bound() + 1e-6,
                    "{format:?} error {err} exceeds bound for {q:?}"
                );
            }
        }
    }

    #[test]
    fn test_no_compress_is_exact() {
        let q = Quat::from_xyzw(0.1, -0.2, 0.3, 0.9);
        let back = RotationFormat::NoCompressQuat.decode(&RotationFormat::NoCompressQuat.encode(q));
        assert_eq!(back, q);
    }

    #[test]
    fn test_finer_formats_are_more_accurate() {
        let mut rng = Rng::new(99);
        let worst = |format: RotationFormat, rng: &mut Rng| {
            (0..500)
                .map(|_| round_trip_error(format, rng.unit_quat()))
                .fold(0.0f32, f32::max)
        };
        let dword = worst(RotationFormat::SmallTreeDword, &mut rng);
        let bit48 = worst(RotationFormat::SmallTree48Bit, &mut rng);
        let bit64 = worst(RotationFormat::SmallTree64Bit, &mut rng);
        assert!(bit48 < dword);
        assert!(bit64 < bit48);
    }

    #[test]
    fn test_dword_layout() {
        // identity drops w (index 3), others sit at mid-range
        let bytes = RotationFormat::SmallTreeDword.encode(Quat::IDENTITY);
        let packed = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(packed >> 30, 3);
        assert_eq!(packed & 0x3FF, 512);
    }
}
