use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Oriented box expressed in some parent space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxVolume {
    pub center: Vec3,
    pub half_extents: Vec3,
    #[serde(default = "identity")]
    pub rotation: Quat,
}

fn identity() -> Quat {
    Quat::IDENTITY
}

/// Sphere expressed in some parent space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SphereVolume {
    pub center: Vec3,
    pub radius: f32,
}

impl BoxVolume {
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents: half_extents.abs(),
            rotation: Quat::IDENTITY,
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    fn to_local(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse() * (point - self.center)
    }

    fn from_local(&self, local: Vec3) -> Vec3 {
        self.rotation * local + self.center
    }

    pub fn contains_point(&self, point: Vec3) -> bool {
        let p = self.to_local(point).abs();
        p.x <= self.half_extents.x && p.y <= self.half_extents.y && p.z <= self.half_extents.z
    }

    /// Closest point inside or on the box.
    pub fn clamp_point(&self, point: Vec3) -> Vec3 {
        let local = self.to_local(point).clamp(-self.half_extents, self.half_extents);
        self.from_local(local)
    }
}

impl SphereVolume {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            radius: radius.abs(),
        }
    }

    /// Closest point inside or on the sphere.
    pub fn clamp_point(&self, point: Vec3) -> Vec3 {
        let offset = point - self.center;
        if offset.length_squared() <= self.radius * self.radius {
            point
        } else {
            self.center + offset.normalize_or_zero() * self.radius
        }
    }
}
