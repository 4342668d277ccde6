//! Container and controller chunk constants and structures.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::util::{Error, Quat, Result, Vec3};

/// Magic bytes at the start of a container.
pub const CONTAINER_MAGIC: &[u8; 4] = b"ANPK";

/// Current container version.
pub const CONTAINER_VERSION: u16 = 1;

/// Magic, endianness byte, reserved byte, version, chunk count.
pub const CONTAINER_HEADER_SIZE: usize = 12;

/// Chunk type, version, payload size.
pub const CHUNK_RECORD_HEADER_SIZE: usize = 8;

/// Version of the motion parameters chunk.
pub const MOTION_PARAMS_VERSION: u16 = 0x0925;

/// Payload size of the motion parameters chunk.
pub const MOTION_PARAMS_SIZE: usize = 96;

/// Controller id and key count.
pub const COUNTED_HEADER_SIZE: usize = 8;

/// Header of a [`ChunkVersion::SplitV1`] controller.
pub const SPLIT_V1_HEADER_SIZE: usize = 20;

/// Header of a [`ChunkVersion::SplitV2`] controller.
pub const SPLIT_V2_HEADER_SIZE: usize = 28;

/// One key of a [`ChunkVersion::LegacyCombined`] controller.
pub const LEGACY_KEY_SIZE: usize = 28;

/// One key of a [`ChunkVersion::FlatPerSample`] controller.
pub const FLAT_KEY_SIZE: usize = std::mem::size_of::<FlatKey>();

/// Kind of a container chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkType {
    MotionParameters,
    Controller,
}

impl ChunkType {
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::MotionParameters => 1,
            Self::Controller => 2,
        }
    }

    pub const fn from_u16(v: u16) -> Option<Self> {
        match v {
            1 => Some(Self::MotionParameters),
            2 => Some(Self::Controller),
            _ => None,
        }
    }
}

/// Controller chunk layouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkVersion {
    /// Log rotation and centimetre position per key, raw tick times.
    LegacyCombined,
    /// Separate rotation and position channels.
    SplitV1,
    /// Separate rotation, position and scale channels, 4-byte aligned.
    SplitV2,
    /// Uncompressed rotation, position and scale per tick.
    FlatPerSample,
}

impl ChunkVersion {
    pub const ALL: [ChunkVersion; 4] =
        [Self::LegacyCombined, Self::SplitV1, Self::SplitV2, Self::FlatPerSample];

    pub const fn to_u16(self) -> u16 {
        match self {
            Self::LegacyCombined => 0x0827,
            Self::SplitV1 => 0x0829,
            Self::SplitV2 => 0x0832,
            Self::FlatPerSample => 0x0833,
        }
    }

    pub fn from_u16(v: u16) -> Result<Self> {
        match v {
            0x0827 => Ok(Self::LegacyCombined),
            0x0829 => Ok(Self::SplitV1),
            0x0832 => Ok(Self::SplitV2),
            0x0833 => Ok(Self::FlatPerSample),
            _ => Err(Error::UnsupportedVersion(v)),
        }
    }

    /// Whether this layout stores quantized, decimated channels.
    pub const fn is_split(self) -> bool {
        matches!(self, Self::SplitV1 | Self::SplitV2)
    }

    pub const fn supports_scale(self) -> bool {
        !matches!(self, Self::SplitV1 | Self::LegacyCombined)
    }
}

/// Key of a legacy combined controller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LegacyKey {
    /// Raw tick.
    pub time: i32,
    /// Centimetres.
    pub position: Vec3,
    /// Half-angle log of the inverse rotation.
    pub rotation_log: Vec3,
}

/// Key of a flat per-sample controller, read straight from the payload.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct FlatKey {
    pub rotation: [f32; 4],
    /// Metres.
    pub position: [f32; 3],
    pub scale: [f32; 3],
}

impl FlatKey {
    pub fn new(rotation: Quat, position: Vec3, scale: Vec3) -> Self {
        Self {
            rotation: rotation.to_array(),
            position: position.to_array(),
            scale: scale.to_array(),
        }
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        Quat::from_array(self.rotation)
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    #[inline]
    pub fn scale(&self) -> Vec3 {
        Vec3::from_array(self.scale)
    }

    /// Reverse the bytes of every component.
    pub fn swapped(self) -> Self {
        let mut words: [u32; 10] = bytemuck::cast(self);
        for w in &mut words {
            *w = w.swap_bytes();
        }
        bytemuck::cast(words)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_tags() {
        for v in ChunkVersion::ALL {
            assert_eq!(ChunkVersion::from_u16(v.to_u16()).unwrap(), v);
        }
        assert!(matches!(ChunkVersion::from_u16(0x0830), Err(Error::UnsupportedVersion(0x0830))));
        assert!(ChunkVersion::SplitV2.supports_scale());
        assert!(!ChunkVersion::SplitV1.supports_scale());
    }

    #[test]
    fn test_flat_key_layout() {
        assert_eq!(FLAT_KEY_SIZE, 40);
        let key = FlatKey::new(Quat::IDENTITY, Vec3::new(1.0, 2.0, 3.0), Vec3::ONE);
        assert_eq!(key.swapped().swapped(), key);
        assert_ne!(key.swapped(), key);
    }

    #[test]
    fn test_chunk_types() {
        assert_eq!(ChunkType::from_u16(ChunkType::Controller.to_u16()), Some(ChunkType::Controller));
        assert_eq!(ChunkType::from_u16(0), None);
    }
}
