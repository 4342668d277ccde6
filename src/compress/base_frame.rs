//! Additive clip re-basing.
//!
//! An additive clip stores every sample as a delta from its first sample.
//! The first sample is dropped afterwards since its delta is the identity.

use tracing::warn;

use crate::core::{Channel, CurveValue, Track};
use crate::util::{Error, Quat, Result, Vec3};

/// First sample of each present channel.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BaseFrame {
    pub rotation: Option<Quat>,
    pub position: Option<Vec3>,
    pub scale: Option<Vec3>,
    /// Set when a zero scale component was replaced by one.
    pub scale_clamped: bool,
}

impl BaseFrame {
    #[inline]
    pub fn restore_rotation(&self, delta: Quat) -> Quat {
        self.rotation.map_or(delta, |base| delta * base)
    }

    #[inline]
    pub fn restore_position(&self, delta: Vec3) -> Vec3 {
        self.position.map_or(delta, |base| delta + base)
    }

    #[inline]
    pub fn restore_scale(&self, delta: Vec3) -> Vec3 {
        self.scale.map_or(delta, |base| delta * base)
    }
}

fn first_of<V: CurveValue>(channel: &Option<Channel<V>>, name: &str, id: u32) -> Result<Option<V>> {
    let Some(ch) = channel else {
        return Ok(None);
    };
    if ch.len() < 2 {
        return Err(Error::DegenerateAnimation(format!(
            "controller {id:#010x} {name} channel has {} sample(s), additive needs 2",
            ch.len()
        )));
    }
    Ok(ch.first().map(|(_, v)| v))
}

/// Compute the base frame of a track.
pub fn compute_base(track: &Track) -> Result<BaseFrame> {
    let id = track.controller_id;
    let rotation = first_of(&track.rotation, "rotation", id)?;
    let position = first_of(&track.position, "position", id)?;
    let mut scale = first_of(&track.scale, "scale", id)?;

    let mut scale_clamped = false;
    if let Some(s) = scale.as_mut() {
        let mut c = s.to_array();
        for v in &mut c {
            if v.abs() <= f32::EPSILON {
                *v = 1.0;
                scale_clamped = true;
            }
        }
        *s = Vec3::from_array(c);
        if scale_clamped {
            warn!(controller = id, "zero scale in additive base frame replaced by 1");
        }
    }

    Ok(BaseFrame { rotation, position, scale, scale_clamped })
}

/// Replace every sample by its delta from `base` and drop the first sample.
pub fn rebase(track: &mut Track, base: &BaseFrame) -> Result<()> {
    let id = track.controller_id;
    first_of(&track.rotation, "rotation", id)?;
    first_of(&track.position, "position", id)?;
    first_of(&track.scale, "scale", id)?;

    if let (Some(ch), Some(b)) = (track.rotation.as_mut(), base.rotation) {
        let inv = b.inverse();
        ch.map_values(|q| q * inv);
        ch.drop_first();
    }
    if let (Some(ch), Some(b)) = (track.position.as_mut(), base.position) {
        ch.map_values(|p| p - b);
        ch.drop_first();
    }
    if let (Some(ch), Some(b)) = (track.scale.as_mut(), base.scale) {
        ch.map_values(|s| s / b);
        ch.drop_first();
    }
    Ok(())
}
