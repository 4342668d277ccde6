//! Core layer - curve data model and compression inputs.
//!
//! This module provides:
//! - [`Tick`] and timeline constants
//! - [`Channel`] / [`CurveValue`] - Keyed curves for one joint property
//! - [`Track`] / [`AnimationClip`] / [`MotionParams`] - Clip data model
//! - [`SkeletonProvider`] / [`Skeleton`] - Rig access
//! - [`PolicySet`] / [`JointPolicy`] - Per-joint deletion and tolerance rules
//! - [`CompressionConfig`] - Settings loaded from JSON

mod time;
mod channel;
mod clip;
mod skeleton;
mod policy;
mod config;

pub use time::{
    ensure_ascending, first_unsorted, ticks_to_seconds, Tick, LEGACY_POSITION_SCALE,
    LEGACY_TICKS_PER_KEY, MAX_EXACT_F32_TICK, SECONDS_PER_TICK, TICKS_PER_SECOND,
};
pub use channel::{Channel, CurveValue, PositionChannel, RotationChannel, ScaleChannel};
pub use clip::{AnimationClip, AssetFlags, ChannelKind, MotionParams, Track};
pub use skeleton::{controller_id_for, Joint, Skeleton, SkeletonProvider};
pub use policy::{
    wildcard_match, ChannelPolicy, DeletePolicy, JointPolicy, PolicyProvider, PolicyRule, PolicySet,
};
pub use config::{CompressionConfig, ProcessingMode};
