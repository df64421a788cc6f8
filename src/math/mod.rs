//! Math utilities module
//!
//! Transform conversions, rotation helpers and clamp volumes shared by the
//! grab resolution code.

mod spatial;
mod transform;
mod volume;

pub use spatial::{
    average_quaternions, average_quaternions_weighted, component, grab_weight, project_on_plane,
    rotation_between, signed_angle_around, threshold_gradient, twist_angle, unwrap_angle_delta,
    wrap_degrees, Axis, PitchYawRoll,
};
pub use transform::Transform;
pub use volume::{BoxVolume, SphereVolume};

// Re-export commonly used glam types
pub use glam::{Quat, Vec3, Vec4};
