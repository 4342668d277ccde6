//! Compression settings.
//!
//! Settings are plain serde structs so presets can be kept as JSON next to
//! the assets they apply to. Missing fields take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::policy::PolicySet;
use crate::chunk::ChunkVersion;
use crate::codec::{RotationFormat, VectorFormat};
use crate::util::{Endianness, Error, Result};

/// Reference used when deciding whether a channel is constant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingMode {
    /// Compare each channel with its own first sample.
    #[default]
    Standard,
    /// Compare each channel with the joint's bind pose.
    Override,
}

/// Everything the compressor needs besides the clip and skeleton.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub mode: ProcessingMode,
    /// Rotation formats tried per channel; ties go to the earlier entry.
    pub rotation_formats: Vec<RotationFormat>,
    pub position_formats: Vec<VectorFormat>,
    pub scale_formats: Vec<VectorFormat>,
    /// Controller chunk layout to write.
    pub chunk_version: ChunkVersion,
    /// Byte order recorded in the clip flags; see `CompressedClip::endianness`.
    pub endianness: Endianness,
    /// Pad channel blocks to four bytes in split layouts without mandatory alignment.
    pub align_tracks: bool,
    /// Flag clips whose joints end where they start as cyclic.
    pub detect_cycles: bool,
    /// Locator joint whose curve replaces the root's before compression.
    pub root_motion_joint: Option<String>,
    pub policies: PolicySet,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            mode: ProcessingMode::Standard,
            rotation_formats: RotationFormat::ALL.to_vec(),
            position_formats: vec![VectorFormat::NoCompressVec3],
            scale_formats: vec![VectorFormat::NoCompressVec3],
            chunk_version: ChunkVersion::SplitV2,
            endianness: Endianness::Little,
            align_tracks: true,
            detect_cycles: true,
            root_motion_joint: None,
            policies: PolicySet::default(),
        }
    }
}

impl CompressionConfig {
    /// Parse a JSON preset.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON preset from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings the compressor cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.rotation_formats.is_empty() {
            return Err(Error::config("rotation_formats is empty"));
        }
        if self.position_formats.is_empty() {
            return Err(Error::config("position_formats is empty"));
        }
        if self.scale_formats.is_empty() {
            return Err(Error::config("scale_formats is empty"));
        }
        self.policies.check_tolerances()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::DeletePolicy;
    use std::io::Write;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = CompressionConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CompressionConfig::default());
        assert_eq!(config.chunk_version, ChunkVersion::SplitV2);
        assert_eq!(config.rotation_formats.len(), 6);
    }

    #[test]
    fn test_json_preset() {
        let json = r#"{
            "mode": "override",
            "rotation_formats": ["small_tree48_bit", "no_compress_quat"],
            "chunk_version": "split_v1",
            "endianness": "big",
            "policies": { "rules": [ { "pattern": "*Nub", "policy": {} } ] }
        }"#;
        let config = CompressionConfig::from_json_str(json).unwrap();
        assert_eq!(config.mode, ProcessingMode::Override);
        assert_eq!(
            config.rotation_formats,
            vec![RotationFormat::SmallTree48Bit, RotationFormat::NoCompressQuat]
        );
        assert_eq!(config.chunk_version, ChunkVersion::SplitV1);
        assert_eq!(config.endianness, Endianness::Big);
        assert_eq!(config.policies.rules[0].pattern, "*Nub");
    }

    #[test]
    fn test_round_trip_json() {
        let mut config = CompressionConfig::default();
        config.policies.default.rotation.delete = DeletePolicy::Never;
        let text = config.to_json_string().unwrap();
        assert_eq!(CompressionConfig::from_json_str(&text).unwrap(), config);
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            CompressionConfig::from_json_str(r#"{ "rotation_formats": [] }"#),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            CompressionConfig::from_json_str(r#"{ "mode": "sideways" }"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "align_tracks": false }}"#).unwrap();
        let config = CompressionConfig::from_path(file.path()).unwrap();
        assert!(!config.align_tracks);

        assert!(matches!(
            CompressionConfig::from_path("/definitely/not/here.json"),
            Err(Error::FileNotFound(_))
        ));
    }
}
