use glam::{Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

const EPSILON: f32 = 1e-6;

/// Local coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Axis {
    X,
    Y,
    #[default]
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn from_index(index: usize) -> Axis {
        match index % 3 {
            0 => Axis::X,
            1 => Axis::Y,
            _ => Axis::Z,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }

    /// The two axes following this one in right-handed cyclic order, so that
    /// `next.unit().cross(after.unit()) == self.unit()`.
    pub fn perpendicular_pair(self) -> (Axis, Axis) {
        let i = self.index();
        (Axis::from_index(i + 1), Axis::from_index(i + 2))
    }
}

/// Component of a vector along one axis.
pub fn component(v: Vec3, axis: Axis) -> f32 {
    v.to_array()[axis.index()]
}

/// Wraps an angle in degrees to `[-180, 180)`.
pub fn wrap_degrees(angle: f32) -> f32 {
    (angle + 180.0).rem_euclid(360.0) - 180.0
}

/// Brings a per-tick angle delta back across the ±180° seam so that a small
/// real rotation that crosses the seam isn't read as a near full turn.
pub fn unwrap_angle_delta(delta: f32) -> f32 {
    if delta > 180.0 {
        delta - 360.0
    } else if delta < -180.0 {
        delta + 360.0
    } else {
        delta
    }
}

pub fn project_on_plane(v: Vec3, normal: Vec3) -> Vec3 {
    let n = normal.normalize_or_zero();
    v - n * v.dot(n)
}

/// Signed angle in degrees from `from` to `to` measured around `axis`, after
/// projecting both vectors on the plane perpendicular to it.
pub fn signed_angle_around(from: Vec3, to: Vec3, axis: Vec3) -> f32 {
    let axis = axis.normalize_or_zero();
    let a = project_on_plane(from, axis);
    let b = project_on_plane(to, axis);

    if a.length_squared() < EPSILON || b.length_squared() < EPSILON {
        return 0.0;
    }

    axis.dot(a.cross(b)).atan2(a.dot(b)).to_degrees()
}

/// Shortest rotation taking direction `from` onto direction `to`. Degenerate
/// inputs yield the identity.
pub fn rotation_between(from: Vec3, to: Vec3) -> Quat {
    let a = from.normalize_or_zero();
    let b = to.normalize_or_zero();

    if a.length_squared() < EPSILON || b.length_squared() < EPSILON {
        return Quat::IDENTITY;
    }

    Quat::from_rotation_arc(a, b)
}

/// Angle in degrees of the twist part of `rotation` around `axis`, in
/// `[-180, 180)`.
pub fn twist_angle(rotation: Quat, axis: Vec3) -> f32 {
    let axis = axis.normalize_or_zero();
    let [x, y, z, w] = rotation.to_array();
    let projected = axis.dot(Vec3::new(x, y, z));

    if projected.abs() < EPSILON && w.abs() < EPSILON {
        return 0.0;
    }

    wrap_degrees((2.0 * projected.atan2(w)).to_degrees())
}

/// Averages rotations by hemisphere-aligned component summation. Accurate for
/// rotations that are reasonably close together, which is what per-grab
/// contributions of the same object are.
pub fn average_quaternions(rotations: &[Quat]) -> Quat {
    let weighted: Vec<(Quat, f32)> = rotations.iter().map(|&q| (q, 1.0)).collect();
    average_quaternions_weighted(&weighted)
}

pub fn average_quaternions_weighted(rotations: &[(Quat, f32)]) -> Quat {
    let Some(&(reference, _)) = rotations.first() else {
        return Quat::IDENTITY;
    };

    let mut sum = Vec4::ZERO;
    let mut total_weight = 0.0;

    for &(q, weight) in rotations {
        let v = Vec4::from(q);
        let aligned = if v.dot(Vec4::from(reference)) < 0.0 { -v } else { v };
        sum += aligned * weight;
        total_weight += weight;
    }

    if total_weight <= 0.0 || sum.length_squared() < EPSILON {
        return reference;
    }

    Quat::from_vec4(sum / total_weight).normalize()
}

/// Weight of the `index`-th (zero-based) grab in look-at averaging: the first
/// three grabs count fully, later ones contribute `1/n`.
pub fn grab_weight(index: usize) -> f32 {
    if index < 3 {
        1.0
    } else {
        1.0 / (index + 1) as f32
    }
}

/// Linear 0..1 blend factor for `value` between `start` and `end`.
pub fn threshold_gradient(value: f32, start: f32, end: f32) -> f32 {
    if end <= start {
        return if value >= end { 1.0 } else { 0.0 };
    }
    ((value - start) / (end - start)).clamp(0.0, 1.0)
}

/// Decomposition of a rotation relative to a longitudinal axis `L`:
/// `rotation = R(a2, yaw) * R(a1, pitch) * R(L, roll)` with `(a1, a2)` the
/// perpendicular pair of `L`. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PitchYawRoll {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl PitchYawRoll {
    pub fn decompose(rotation: Quat, longitudinal: Axis) -> Self {
        let (a1, a2) = longitudinal.perpendicular_pair();
        let d = rotation * longitudinal.unit();

        let d_l = component(d, longitudinal);
        let d_a1 = component(d, a1);
        let d_a2 = component(d, a2);

        let pitch = (-d_a2).atan2((d_l * d_l + d_a1 * d_a1).sqrt());
        let yaw = d_a1.atan2(d_l);

        let swing = Quat::from_axis_angle(a2.unit(), yaw) * Quat::from_axis_angle(a1.unit(), pitch);
        let twist = swing.inverse() * rotation;
        let roll = twist_angle(twist, longitudinal.unit());

        Self {
            pitch: pitch.to_degrees(),
            yaw: yaw.to_degrees(),
            roll,
        }
    }

    pub fn compose(&self, longitudinal: Axis) -> Quat {
        let (a1, a2) = longitudinal.perpendicular_pair();
        (Quat::from_axis_angle(a2.unit(), self.yaw.to_radians())
            * Quat::from_axis_angle(a1.unit(), self.pitch.to_radians())
            * Quat::from_axis_angle(longitudinal.unit(), self.roll.to_radians()))
        .normalize()
    }
}
