//! The local pose every entity carries.
//!
//! Fields are private so that every mutation stamps a new *revision*. The
//! [`TransformGraph`](crate::hierarchy::TransformGraph) compares revisions
//! against its cache to decide whether a world matrix must be recomputed.
//! Revisions come from one process-wide counter, so two transforms with
//! different poses never share a revision, even across entities or after
//! a component is replaced wholesale.
//!
//! Axes follow a left-handed convention: +X right, +Y up, +Z forward.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::component::{Component, ComponentTypeId};

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Position, rotation and scale relative to the parent node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transform {
    position: Vec3,
    rotation: Quat,
    scale: Vec3,
    #[serde(skip, default = "next_revision")]
    revision: u64,
}

impl Component for Transform {
    const KIND: ComponentTypeId = ComponentTypeId::TRANSFORM;
    const NAME: &'static str = "transform";
}

// Revisions are bookkeeping, not part of the pose.
impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
            && self.rotation == other.rotation
            && self.scale == other.scale
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::from_position(Vec3::ZERO)
    }
}

impl Transform {
    /// Identity rotation and unit scale at `position`.
    pub fn from_position(position: Vec3) -> Self {
        Self::from_parts(position, Quat::IDENTITY, Vec3::ONE)
    }

    pub fn from_parts(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
            revision: next_revision(),
        }
    }

    /// Decompose an affine matrix. Shear is discarded.
    pub fn from_matrix(matrix: Mat4) -> Self {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        Self::from_parts(position, rotation, scale)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// Changes each time the pose is written.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Local-to-parent matrix (scale, then rotate, then translate).
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Local +Z axis.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }

    /// Local +X axis.
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    /// Local +Y axis.
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    /// Rotation as (pitch, yaw, roll) in degrees, YXZ order.
    pub fn euler_degrees(&self) -> Vec3 {
        let (yaw, pitch, roll) = self.rotation.to_euler(EulerRot::YXZ);
        Vec3::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
    }

    // -- mutation -----------------------------------------------------------

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.touch();
    }

    pub fn translate(&mut self, offset: Vec3) {
        self.position += offset;
        self.touch();
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation.normalize();
        self.touch();
    }

    /// Apply `delta` after the current rotation.
    pub fn rotate(&mut self, delta: Quat) {
        self.rotation = (delta * self.rotation).normalize();
        self.touch();
    }

    /// Move the rotation a fraction `t` of the way towards `target`.
    pub fn rotate_slerp(&mut self, target: Quat, t: f32) {
        self.rotation = self.rotation.slerp(target, t).normalize();
        self.touch();
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.scale = scale;
        self.touch();
    }

    /// Replace the pose with the decomposition of `matrix`.
    pub fn set_local_matrix(&mut self, matrix: Mat4) {
        let (scale, rotation, position) = matrix.to_scale_rotation_translation();
        self.position = position;
        self.rotation = rotation;
        self.scale = scale;
        self.touch();
    }

    fn touch(&mut self) {
        self.revision = next_revision();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_write_changes_revision() {
        let mut t = Transform::default();
        let r0 = t.revision();
        t.translate(Vec3::X);
        let r1 = t.revision();
        t.set_scale(Vec3::splat(2.0));
        assert_ne!(r0, r1);
        assert_ne!(r1, t.revision());
    }

    #[test]
    fn clone_keeps_revision_but_fresh_transforms_differ() {
        let a = Transform::default();
        let b = a.clone();
        let c = Transform::default();
        assert_eq!(a.revision(), b.revision());
        assert_ne!(a.revision(), c.revision());
    }

    #[test]
    fn local_matrix_round_trips_through_decomposition() {
        let t = Transform::from_parts(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_rotation_y(0.5),
            Vec3::splat(2.0),
        );
        let back = Transform::from_matrix(t.local_matrix());
        assert!(back.position().abs_diff_eq(t.position(), 1e-5));
        assert!(back.scale().abs_diff_eq(t.scale(), 1e-5));
        assert!(back.local_matrix().abs_diff_eq(t.local_matrix(), 1e-5));
    }

    #[test]
    fn forward_is_positive_z() {
        let t = Transform::default();
        assert_eq!(t.forward(), Vec3::Z);
        let turned = Transform::from_parts(
            Vec3::ZERO,
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            Vec3::ONE,
        );
        assert!(turned.forward().abs_diff_eq(Vec3::X, 1e-6));
    }

    #[test]
    fn deserialized_transform_gets_fresh_revision() {
        let t = Transform::from_position(Vec3::new(4.0, 5.0, 6.0));
        let json = serde_json::to_string(&t).unwrap();
        let back: Transform = serde_json::from_str(&json).unwrap();
        assert_eq!(back.position(), t.position());
        assert_ne!(back.revision(), t.revision());
    }
}
