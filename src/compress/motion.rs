//! Clip-level motion analysis: cycle detection and root locomotion values.

use tracing::debug;

use crate::core::{AnimationClip, MotionParams, SkeletonProvider, Track};
use crate::util::{heading_delta, rotation_within, Quat, Transform, Vec3};

/// Largest first/last rotation difference, in radians, of a looping clip.
pub const CYCLE_TOLERANCE: f32 = 0.1;

/// Root travel shorter than this yields no slope.
const MIN_SLOPE_DISTANCE: f32 = 0.01;

/// Distance is accumulated over this many evenly spaced root samples.
const DISTANCE_STEPS: usize = 100;

fn root_track<'a>(clip: &'a AnimationClip, skeleton: &dyn SkeletonProvider) -> Option<&'a Track> {
    let root = skeleton.root()?;
    clip.tracks
        .iter()
        .find(|t| skeleton.joint_index(t.controller_id) == Some(root))
}

/// True when every non-root joint ends where it started.
pub fn detect_cycle(clip: &AnimationClip, skeleton: &dyn SkeletonProvider) -> bool {
    let mut checked = 0;
    for track in &clip.tracks {
        let Some(joint) = skeleton.joint_index(track.controller_id) else {
            continue;
        };
        if skeleton.is_root(joint) {
            continue;
        }
        let Some(rot) = &track.rotation else {
            continue;
        };
        let (Some((_, first)), Some((_, last))) = (rot.first(), rot.last()) else {
            continue;
        };
        if !rotation_within(first, last, CYCLE_TOLERANCE) {
            return false;
        }
        checked += 1;
    }
    checked > 0
}

/// Root transform at a normalized clip position, falling back to `rest`.
fn root_at(track: Option<&Track>, rest: Transform, t: f32) -> Transform {
    let Some(track) = track else {
        return rest;
    };
    Transform {
        rotation: track
            .rotation
            .as_ref()
            .and_then(|c| c.sample_normalized(t))
            .unwrap_or(rest.rotation),
        position: track
            .position
            .as_ref()
            .and_then(|c| c.sample_normalized(t))
            .unwrap_or(rest.position),
        scale: Vec3::ONE,
    }
}

/// Fill distance, speed, slope, turn and root locations of `params`.
///
/// Returns warnings for values that could not be derived.
pub fn evaluate_motion(
    clip: &AnimationClip,
    skeleton: &dyn SkeletonProvider,
    params: &mut MotionParams,
) -> Vec<String> {
    let mut warnings = Vec::new();
    let root = root_track(clip, skeleton);
    let rest = skeleton
        .root()
        .and_then(|r| skeleton.bind_pose(r))
        .unwrap_or(Transform::IDENTITY);

    let duration = params.duration();
    if duration < 0.001 {
        warnings.push(format!("clip '{}' has zero duration; speed left at 0", clip.name));
    }

    // distance along the sampled root path
    let mut distance = 0.0;
    let mut prev = root_at(root, rest, 0.0).position;
    for step in 1..=DISTANCE_STEPS {
        let p = root_at(root, rest, step as f32 / DISTANCE_STEPS as f32).position;
        distance += prev.distance(p);
        prev = p;
    }

    let first = root_at(root, rest, 0.0);
    let middle = root_at(root, rest, 0.5);
    let last = root_at(root, rest, 1.0);

    params.distance = distance;
    params.speed = if duration >= 0.001 { distance / duration } else { 0.0 };
    params.slope = slope(first, last);
    params.asset_turn = heading_change(first.rotation, middle.rotation, last.rotation);
    params.turn_speed = if duration >= 0.001 { params.asset_turn / duration } else { 0.0 };
    params.start_location = first;
    params.end_location = last;

    debug!(
        clip = %clip.name,
        distance = params.distance,
        speed = params.speed,
        slope = params.slope,
        turn = params.asset_turn,
        "motion evaluated"
    );
    warnings
}

/// Pitch of the travel direction, expressed in the start orientation.
fn slope(first: Transform, last: Transform) -> f32 {
    let travel = last.position - first.position;
    if travel.length() <= MIN_SLOPE_DISTANCE {
        return 0.0;
    }
    let dir = (first.rotation.inverse() * travel).normalize();
    let horizontal = (dir.x * dir.x + dir.y * dir.y).sqrt();
    if horizontal <= 1e-4 {
        return 0.0;
    }
    (-dir.z * (dir.y / horizontal)).atan2(horizontal)
}

/// Heading change of the forward (+Y) axis through a middle sample.
fn heading_change(first: Quat, middle: Quat, last: Quat) -> f32 {
    let (a, b, c) = (first * Vec3::Y, middle * Vec3::Y, last * Vec3::Y);
    heading_delta(a, b) + heading_delta(b, c)
}
