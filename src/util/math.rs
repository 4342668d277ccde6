//! Math type re-exports and rotation/vector comparison helpers.
//!
//! Re-exports the `glam` types used for curve values and adds the
//! closeness tests shared by decimation, channel deletion and format trials.

// Re-export glam types
pub use glam::{DQuat, DVec3, Quat, Vec3};

use serde::{Deserialize, Serialize};

/// Rotation, translation and scale of one joint.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub rotation: Quat,
    pub position: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        rotation: Quat::IDENTITY,
        position: Vec3::ZERO,
        scale: Vec3::ONE,
    };

    /// Create a transform without scale.
    #[inline]
    pub const fn from_rotation_translation(rotation: Quat, position: Vec3) -> Self {
        Self { rotation, position, scale: Vec3::ONE }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Test whether two rotations differ by at most `tolerance` radians.
///
/// Uses `1 - |1 - |dot(a, b)||` against `cos(tolerance / 2)` on inputs
/// renormalized in double precision, since the f32 norm error alone would
/// exceed `1 - cos(tolerance / 2)` for sub-milliradian tolerances.
/// Bit-identical inputs are always close, so a zero tolerance accepts
/// exact repeats.
#[inline]
pub fn rotation_within(a: Quat, b: Quat, tolerance: f32) -> bool {
    if a == b {
        return true;
    }
    let dot = a.as_dquat().normalize().dot(b.as_dquat().normalize()).abs();
    let closeness = 1.0 - (1.0 - dot).abs();
    closeness >= (f64::from(tolerance) * 0.5).cos()
}

/// Test whether two vectors are at most `tolerance` apart.
#[inline]
pub fn vector_within(a: Vec3, b: Vec3, tolerance: f32) -> bool {
    if a == b {
        return true;
    }
    let d = a.as_dvec3() - b.as_dvec3();
    let t = f64::from(tolerance);
    d.length_squared() <= t * t
}

/// Angle in radians of the rotation taking `a` to `b`.
pub fn angle_between(a: Quat, b: Quat) -> f32 {
    let delta = b.as_dquat() * a.as_dquat().conjugate();
    let s = DVec3::new(delta.x, delta.y, delta.z).length();
    (2.0 * s.atan2(delta.w.abs())) as f32
}

/// Quaternion exponent of a half-angle log vector.
pub fn quat_exp(v: Vec3) -> Quat {
    let theta = v.length();
    if theta < 1e-8 {
        return Quat::from_xyzw(v.x, v.y, v.z, 1.0).normalize();
    }
    let (s, c) = theta.sin_cos();
    let axis = v / theta * s;
    Quat::from_xyzw(axis.x, axis.y, axis.z, c)
}

/// Half-angle log vector of a unit quaternion; inverse of [`quat_exp`].
pub fn quat_log(q: Quat) -> Vec3 {
    let v = Vec3::new(q.x, q.y, q.z);
    let len = v.length();
    if len < 1e-8 {
        return v;
    }
    v / len * len.atan2(q.w)
}

/// Signed angle around +Z from the XY projection of `a` to that of `b`.
pub fn heading_delta(a: Vec3, b: Vec3) -> f32 {
    let cross = a.x * b.y - a.y * b.x;
    let dot = a.x * b.x + a.y * b.y;
    cross.atan2(dot)
}
