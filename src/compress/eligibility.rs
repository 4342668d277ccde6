//! Whole-channel deletion.

use crate::core::{Channel, CurveValue, DeletePolicy};

/// Outcome of [`classify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eligibility {
    Keep,
    Delete,
}

/// Value an auto-deleted channel is compared against.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ReferenceMode<V> {
    /// The channel's own first sample.
    Standard,
    /// The joint's parent-relative bind pose; root channels are always kept.
    Override { bind_pose: V },
    /// The additive base frame.
    Additive { base: V },
}

/// Where the channel's joint sits in the skeleton.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct JointContext {
    pub index: usize,
    pub is_root: bool,
}

/// Decide whether a channel can be dropped.
///
/// `joint` is `None` when the track's controller is not in the skeleton.
pub fn classify<V: CurveValue>(
    channel: &Channel<V>,
    joint: Option<JointContext>,
    policy: &DeletePolicy,
    mode: ReferenceMode<V>,
) -> Eligibility {
    let Some(joint) = joint else {
        return Eligibility::Delete;
    };
    let tolerance = match *policy {
        DeletePolicy::Always => return Eligibility::Delete,
        DeletePolicy::Never => return Eligibility::Keep,
        DeletePolicy::Auto { tolerance } => tolerance,
    };
    let reference = match mode {
        ReferenceMode::Override { .. } if joint.is_root => return Eligibility::Keep,
        ReferenceMode::Override { bind_pose } => bind_pose,
        ReferenceMode::Additive { base } => base,
        ReferenceMode::Standard => match channel.first() {
            Some((_, v)) => v,
            None => return Eligibility::Delete,
        },
    };
    if channel.values().iter().all(|&v| V::within(v, reference, tolerance)) {
        Eligibility::Delete
    } else {
        Eligibility::Keep
    }
}
