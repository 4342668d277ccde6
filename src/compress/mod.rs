//! Compression stages and the clip pipeline.
//!
//! This module provides:
//! - [`extract`] - Normalize raw track representations
//! - [`classify`] - Whole-channel deletion
//! - [`compute_base`] / [`rebase`] - Additive clip re-basing
//! - [`decimate`] - Greedy keyframe reduction
//! - [`detect_cycle`] / [`evaluate_motion`] - Clip-level motion values
//! - [`replace_root_by_locator`] - Root motion from a locator joint
//! - [`compress_clip`] / [`compress_batch`] - The full pipeline

mod extract;
mod eligibility;
mod base_frame;
mod decimate;
mod motion;
mod root_motion;
mod pipeline;

pub use extract::{extract, legacy_rotation, legacy_ticks, CombinedKeys, RawTrack, SeparatedKeys};
pub use eligibility::{classify, Eligibility, JointContext, ReferenceMode};
pub use base_frame::{compute_base, rebase, BaseFrame};
pub use decimate::{decimate, decimate_exact, decimate_indices, decimate_with, Decimated};
pub use motion::{detect_cycle, evaluate_motion, CYCLE_TOLERANCE};
pub use root_motion::replace_root_by_locator;
pub use pipeline::{compress_batch, compress_clip, ClipReport, ClipStatus, CompressionStats};
