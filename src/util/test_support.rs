//! Deterministic sample generators for unit tests.

use super::{Quat, Vec3};

/// Xorshift generator; reproducible across runs.
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform in [-1, 1).
    pub fn signed(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 23) as f32 - 1.0
    }

    pub fn unit_quat(&mut self) -> Quat {
        loop {
            let q = Quat::from_xyzw(self.signed(), self.signed(), self.signed(), self.signed());
            if q.length_squared() > 1e-4 {
                return q.normalize();
            }
        }
    }

    pub fn vec3(&mut self, scale: f32) -> Vec3 {
        Vec3::new(self.signed(), self.signed(), self.signed()) * scale
    }
}
