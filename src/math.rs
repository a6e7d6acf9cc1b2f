//! Math types for listener placement

pub use glam::{Quat, Vec3};

/// Position and orientation of the listener in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self::new(Vec3::ZERO, Quat::IDENTITY)
    }

    pub fn from_position(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }

    /// Facing direction; the unrotated listener looks down -Z.
    pub fn forward(&self) -> Vec3 {
        self.rotation * (-Vec3::Z)
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite()
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}
