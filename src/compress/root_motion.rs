//! Root motion taken from a locator joint.
//!
//! The locator's curve, offset so it starts at its first key, becomes the
//! root's curve. The root's direct children are re-expressed under the new
//! root so every joint keeps its world-space motion. Scale is not touched.

use tracing::debug;

use crate::core::{controller_id_for, AnimationClip, Channel, SkeletonProvider, Tick, Track};
use crate::util::{Quat, Transform, Vec3};

/// First locator rotations this close to identity are snapped to it.
const IDENTITY_SNAP: f32 = 1e-5;

#[inline]
fn compose(a: Transform, b: Transform) -> Transform {
    Transform::from_rotation_translation(a.rotation * b.rotation, a.rotation * b.position + a.position)
}

#[inline]
fn invert(a: Transform) -> Transform {
    let r = a.rotation.inverse();
    Transform::from_rotation_translation(r, -(r * a.position))
}

fn pose_at(track: &Track, tick: Tick, rest: Transform) -> Transform {
    Transform::from_rotation_translation(
        track.rotation.as_ref().and_then(|c| c.sample(tick)).unwrap_or(rest.rotation),
        track.position.as_ref().and_then(|c| c.sample(tick)).unwrap_or(rest.position),
    )
}

fn snap_identity(q: Quat) -> Quat {
    let near = 1.0 - q.w.abs() < IDENTITY_SNAP
        && q.x.abs() < IDENTITY_SNAP
        && q.y.abs() < IDENTITY_SNAP
        && q.z.abs() < IDENTITY_SNAP;
    if near {
        Quat::IDENTITY
    } else {
        q
    }
}

fn write_dense(track: &mut Track, start: Tick, poses: &[Transform]) {
    track.rotation = Some(Channel::from_dense(start, poses.iter().map(|p| p.rotation.normalize()).collect()));
    track.position = Some(Channel::from_dense(start, poses.iter().map(|p| p.position).collect()));
}

/// Replace the root curve with the locator's and re-parent root children.
///
/// Locator curves are in the same space as the root. Returns warnings when
/// the locator or root joint cannot be found, leaving the clip unchanged.
pub fn replace_root_by_locator(
    clip: &mut AnimationClip,
    skeleton: &dyn SkeletonProvider,
    locator_name: &str,
) -> Vec<String> {
    let locator_id = controller_id_for(locator_name);
    let Some(locator) = clip.track(locator_id).cloned() else {
        return vec![format!("root motion joint '{locator_name}' has no track; root left as is")];
    };
    let Some(root) = skeleton.root() else {
        return vec!["skeleton has no root joint; root motion skipped".into()];
    };
    let Some(root_track) = clip
        .tracks
        .iter()
        .position(|t| skeleton.joint_index(t.controller_id) == Some(root))
    else {
        return vec!["clip has no root track; root motion skipped".into()];
    };
    let locator_joint = skeleton.joint_index(locator_id);
    let root_rest = skeleton.bind_pose(root).unwrap_or(Transform::IDENTITY);

    let (start, end) = (clip.params.start_tick, clip.params.end_tick.max(clip.params.start_tick));
    let ticks: Vec<Tick> = (start..=end).collect();

    let mut first = pose_at(&locator, start, Transform::IDENTITY);
    first.rotation = snap_identity(first.rotation);
    let first_inv = invert(first);

    // direct root children other than the locator, with their world poses
    let children: Vec<(usize, Vec<Transform>)> = clip
        .tracks
        .iter()
        .enumerate()
        .filter_map(|(i, t)| {
            let joint = skeleton.joint_index(t.controller_id)?;
            if skeleton.parent(joint) != Some(root) || Some(joint) == locator_joint {
                return None;
            }
            let rest = skeleton.bind_pose(joint).unwrap_or(Transform::IDENTITY);
            let world = ticks
                .iter()
                .map(|&tick| {
                    let root_pose = pose_at(&clip.tracks[root_track], tick, root_rest);
                    compose(first_inv, compose(root_pose, pose_at(t, tick, rest)))
                })
                .collect();
            Some((i, world))
        })
        .collect();

    let new_root: Vec<Transform> = ticks
        .iter()
        .map(|&tick| compose(first_inv, pose_at(&locator, tick, Transform::IDENTITY)))
        .collect();
    write_dense(&mut clip.tracks[root_track], start, &new_root);

    for (i, world) in &children {
        let local: Vec<Transform> = world
            .iter()
            .zip(&new_root)
            .map(|(&w, &r)| compose(invert(r), w))
            .collect();
        write_dense(&mut clip.tracks[*i], start, &local);
    }

    debug!(locator = locator_name, children = children.len(), "root replaced by locator");
    Vec::new()
}
