use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position, rotation and scale of a node relative to its parent space.
///
/// Composition follows the usual TRS convention: `parent.mul_transform(&child)`
/// yields the child expressed in the parent's parent space. Non-uniform scale
/// combined with rotation is approximated component-wise, the same way engines
/// report a "lossy" world scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::ONE,
        }
    }

    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * (point * self.scale) + self.position
    }

    pub fn transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation * direction
    }

    pub fn transform_rotation(&self, rotation: Quat) -> Quat {
        (self.rotation * rotation).normalize()
    }

    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        let unrotated = self.rotation.inverse() * (point - self.position);
        unrotated / safe_scale(self.scale)
    }

    pub fn inverse_transform_direction(&self, direction: Vec3) -> Vec3 {
        self.rotation.inverse() * direction
    }

    pub fn inverse_transform_rotation(&self, rotation: Quat) -> Quat {
        (self.rotation.inverse() * rotation).normalize()
    }

    /// Expresses `child` (given in this transform's local space) in the space
    /// this transform lives in.
    pub fn mul_transform(&self, child: &Transform) -> Transform {
        Transform {
            position: self.transform_point(child.position),
            rotation: self.transform_rotation(child.rotation),
            scale: self.scale * child.scale,
        }
    }

    /// Inverse of [`Transform::mul_transform`]: expresses `world` in this
    /// transform's local space.
    pub fn relative(&self, world: &Transform) -> Transform {
        Transform {
            position: self.inverse_transform_point(world.position),
            rotation: self.inverse_transform_rotation(world.rotation),
            scale: world.scale / safe_scale(self.scale),
        }
    }

    /// Rotates the whole transform around a world-space pivot.
    pub fn rotate_around(&mut self, pivot: Vec3, rotation: Quat) {
        self.position = pivot + rotation * (self.position - pivot);
        self.rotation = (rotation * self.rotation).normalize();
    }

    /// Pose without scale, as used for grabber-relative snapshots.
    pub fn unscaled(&self) -> Transform {
        Transform::from_position_rotation(self.position, self.rotation)
    }

    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            rotation: self.rotation.slerp(other.rotation, t),
            scale: self.scale.lerp(other.scale, t),
        }
    }
}

fn safe_scale(scale: Vec3) -> Vec3 {
    let fix = |s: f32| if s.abs() < 1e-6 { 1e-6_f32.copysign(s) } else { s };
    Vec3::new(fix(scale.x), fix(scale.y), fix(scale.z))
}
