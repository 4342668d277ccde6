//! # animpack
//!
//! Offline compression of skeletal animation curves and the versioned
//! binary chunk container they are stored in.
//!
//! A clip holds one track per joint, each with optional rotation, position
//! and scale channels keyed on a 30 Hz tick timeline. Compression deletes
//! channels that never move, re-bases additive clips, drops keys that
//! interpolation reproduces within tolerance, and picks the smallest
//! quantized format per channel.
//!
//! ## Modules
//!
//! - [`util`] - Errors, math helpers, byte order
//! - [`core`] - Channels, tracks, clips, skeletons, policies, settings
//! - [`codec`] - Rotation/vector quantizers and key time encodings
//! - [`compress`] - Extraction, deletion, re-basing, decimation, pipeline
//! - [`chunk`] - Controller chunk layouts and the clip container
//!
//! ## Example
//!
//! ```ignore
//! use animpack::prelude::*;
//!
//! let config = CompressionConfig::from_path("preset.json")?;
//! let report = compress_clip(&clip, &skeleton, &config);
//! let compressed = report.result?;
//! let bytes = write_clip(&compressed, compressed.endianness())?;
//!
//! let read = read_clip(&bytes)?;
//! println!("{} tracks", read.clip.tracks.len());
//! ```

pub mod util;
pub mod core;
pub mod codec;
pub mod compress;
pub mod chunk;

// Re-export commonly used types
pub use util::{Endianness, Error, Result};
pub use compress::{compress_batch, compress_clip, ClipReport, ClipStatus};
pub use chunk::{read_clip, write_clip, CompressedClip, ContainerSource};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Endianness, Error, Quat, Result, Transform, Vec3};
    pub use crate::core::{
        AnimationClip, AssetFlags, Channel, ChannelKind, CompressionConfig, DeletePolicy,
        JointPolicy, MotionParams, PolicySet, ProcessingMode, Skeleton, SkeletonProvider, Tick,
        Track,
    };
    pub use crate::codec::{RotationFormat, VectorFormat};
    pub use crate::compress::{compress_batch, compress_clip, ClipReport, ClipStatus, CompressionStats};
    pub use crate::chunk::{
        read_clip, write_clip, write_clip_to, ChunkVersion, ClipRead, CompressedClip,
        ContainerSource, ControllerChunk,
    };
}
