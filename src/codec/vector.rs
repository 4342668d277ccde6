//! Position and scale encodings.

use half::f16;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::ValueCodec;
use crate::util::{Error, Result, Vec3};

/// Fixed-size 3-vector encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorFormat {
    /// Three raw `f32` components.
    NoCompressVec3,
    /// Three IEEE half floats. Only used when listed as a candidate.
    HalfVec3,
}

impl VectorFormat {
    pub const ALL: [VectorFormat; 2] = [Self::NoCompressVec3, Self::HalfVec3];

    pub fn from_tag(tag: u16) -> Result<Self> {
        match tag {
            2 => Ok(Self::NoCompressVec3),
            9 => Ok(Self::HalfVec3),
            _ => Err(Error::UnsupportedFormat { kind: "vector", tag }),
        }
    }
}

impl ValueCodec for VectorFormat {
    type Value = Vec3;

    fn tag(self) -> u16 {
        match self {
            Self::NoCompressVec3 => 2,
            Self::HalfVec3 => 9,
        }
    }

    fn byte_size(self) -> usize {
        match self {
            Self::NoCompressVec3 => 12,
            Self::HalfVec3 => 6,
        }
    }

    fn word_size(self) -> usize {
        match self {
            Self::NoCompressVec3 => 4,
            Self::HalfVec3 => 2,
        }
    }

    fn encode(self, v: Vec3) -> SmallVec<[u8; 16]> {
        let mut out = SmallVec::new();
        for c in v.to_array() {
            match self {
                Self::NoCompressVec3 => out.extend_from_slice(&c.to_le_bytes()),
                Self::HalfVec3 => out.extend_from_slice(&f16::from_f32(c).to_bits().to_le_bytes()),
            }
        }
        out
    }

    fn decode(self, bytes: &[u8]) -> Vec3 {
        let mut c = [0.0f32; 3];
        match self {
            Self::NoCompressVec3 => {
                for (i, chunk) in bytes.chunks_exact(4).enumerate().take(3) {
                    c[i] = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                }
            }
            Self::HalfVec3 => {
                for (i, chunk) in bytes.chunks_exact(2).enumerate().take(3) {
                    c[i] = f16::from_bits(u16::from_le_bytes([chunk[0], chunk[1]])).to_f32();
                }
            }
        }
        Vec3::from_array(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_precision_exact() {
        let v = Vec3::new(1.25, -3.0e-7, 4096.5);
        let f = VectorFormat::NoCompressVec3;
        assert_eq!(f.decode(&f.encode(v)), v);
    }

    #[test]
    fn test_half_precision() {
        let f = VectorFormat::HalfVec3;
        let v = Vec3::new(0.5, -1.0, 2.0);
        assert_eq!(f.decode(&f.encode(v)), v);

        let v = Vec3::new(0.1234, 12.345, -0.0042);
        let back = f.decode(&f.encode(v));
        assert!((back - v).abs().max_element() < 0.01);

        // beyond half range
        let back = f.decode(&f.encode(Vec3::splat(1.0e6)));
        assert!(!back.is_finite());
    }

    #[test]
    fn test_tags() {
        assert_eq!(VectorFormat::from_tag(2).unwrap(), VectorFormat::NoCompressVec3);
        assert_eq!(VectorFormat::from_tag(9).unwrap(), VectorFormat::HalfVec3);
        assert!(VectorFormat::from_tag(1).is_err());
    }
}
