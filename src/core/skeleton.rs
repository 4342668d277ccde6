//! Skeleton access used during compression.
//!
//! The compressor only needs joint names, parent links, bind poses and the
//! mapping from controller ids to joints. Rig loaders implement
//! [`SkeletonProvider`]; [`Skeleton`] is a plain in-memory implementation.

use std::collections::HashMap;

use flate2::Crc;

use crate::util::{Error, Result, Transform};

/// Controller id of a joint: CRC-32 of its lower-cased name.
pub fn controller_id_for(name: &str) -> u32 {
    let mut crc = Crc::new();
    crc.update(name.to_lowercase().as_bytes());
    crc.sum()
}

/// Read-only view of a rig.
pub trait SkeletonProvider {
    fn joint_count(&self) -> usize;

    fn joint_name(&self, index: usize) -> Option<&str>;

    /// Joint driven by a controller id.
    fn joint_index(&self, controller_id: u32) -> Option<usize>;

    fn parent(&self, index: usize) -> Option<usize>;

    /// Parent-relative rest transform.
    fn bind_pose(&self, index: usize) -> Option<Transform>;

    /// Root joints have no parent.
    fn is_root(&self, index: usize) -> bool {
        index < self.joint_count() && self.parent(index).is_none()
    }

    /// First root joint.
    fn root(&self) -> Option<usize> {
        (0..self.joint_count()).find(|&i| self.is_root(i))
    }
}

/// A joint of an in-memory skeleton.
#[derive(Clone, Debug, PartialEq)]
pub struct Joint {
    pub name: String,
    pub controller_id: u32,
    pub parent: Option<usize>,
    pub bind_pose: Transform,
}

/// Joints in parent-before-child order.
#[derive(Clone, Debug, Default)]
pub struct Skeleton {
    joints: Vec<Joint>,
    by_controller: HashMap<u32, usize>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a joint and return its index.
    ///
    /// The parent must already exist and the name must hash to a controller
    /// id not used by another joint.
    pub fn add_joint(
        &mut self,
        name: impl Into<String>,
        parent: Option<usize>,
        bind_pose: Transform,
    ) -> Result<usize> {
        let name = name.into();
        let index = self.joints.len();
        if let Some(p) = parent {
            if p >= index {
                return Err(Error::config(format!(
                    "joint '{name}' references parent {p} which is not defined yet"
                )));
            }
        }
        let controller_id = controller_id_for(&name);
        if let Some(&other) = self.by_controller.get(&controller_id) {
            return Err(Error::config(format!(
                "joint '{name}' collides with '{}' (controller id {controller_id:#010x})",
                self.joints[other].name
            )));
        }
        self.by_controller.insert(controller_id, index);
        self.joints.push(Joint { name, controller_id, parent, bind_pose });
        Ok(index)
    }

    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    pub fn joint(&self, index: usize) -> Option<&Joint> {
        self.joints.get(index)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.joints.iter().position(|j| j.name.eq_ignore_ascii_case(name))
    }
}

impl SkeletonProvider for Skeleton {
    fn joint_count(&self) -> usize {
        self.joints.len()
    }

    fn joint_name(&self, index: usize) -> Option<&str> {
        self.joints.get(index).map(|j| j.name.as_str())
    }

    fn joint_index(&self, controller_id: u32) -> Option<usize> {
        self.by_controller.get(&controller_id).copied()
    }

    fn parent(&self, index: usize) -> Option<usize> {
        self.joints.get(index)?.parent
    }

    fn bind_pose(&self, index: usize) -> Option<Transform> {
        self.joints.get(index).map(|j| j.bind_pose)
    }
}
