use glam::{Quat, Vec3};
use std::f32::consts::PI;

/// Value that can be driven by [`SecondOrderDynamics`].
pub trait Interpolatable: Clone + Copy {
    fn zero() -> Self;
    fn add(self, other: Self) -> Self;
    fn sub(self, other: Self) -> Self;
    fn scale(self, factor: f32) -> Self;
}

impl Interpolatable for f32 {
    fn zero() -> Self { 0.0 }
    fn add(self, other: Self) -> Self { self + other }
    fn sub(self, other: Self) -> Self { self - other }
    fn scale(self, factor: f32) -> Self { self * factor }
}

impl Interpolatable for Vec3 {
    fn zero() -> Self { Vec3::ZERO }
    fn add(self, other: Self) -> Self { self + other }
    fn sub(self, other: Self) -> Self { self - other }
    fn scale(self, factor: f32) -> Self { self * factor }
}

// Component-wise; callers keep targets in the same hemisphere and normalize
// the output.
impl Interpolatable for Quat {
    fn zero() -> Self { Quat::from_xyzw(0.0, 0.0, 0.0, 0.0) }
    fn add(self, other: Self) -> Self { self + other }
    fn sub(self, other: Self) -> Self { self - other }
    fn scale(self, factor: f32) -> Self { self * factor }
}

/// Second order system following a moving target.
///
/// `f` is the natural frequency in Hz, `z` the damping ratio (1 = critically
/// damped) and `r` the initial response (0 = no anticipation).
#[derive(Debug, Clone, Copy)]
pub struct SecondOrderDynamics<T: Interpolatable> {
    y: T,
    yd: T,
    xp: T,
    k1: f32,
    k2: f32,
    k3: f32,
}

impl<T: Interpolatable> SecondOrderDynamics<T> {
    pub fn new(f: f32, z: f32, r: f32, initial: T) -> Self {
        let (k1, k2, k3) = Self::compute_constants(f, z, r);
        Self {
            y: initial,
            yd: T::zero(),
            xp: initial,
            k1,
            k2,
            k3,
        }
    }

    /// Critically damped follower without anticipation: approaches the target
    /// exponentially and never overshoots a step.
    pub fn critically_damped(frequency: f32, initial: T) -> Self {
        Self::new(frequency, 1.0, 0.0, initial)
    }

    fn compute_constants(f: f32, z: f32, r: f32) -> (f32, f32, f32) {
        let f = f.max(1e-3);
        let w = 2.0 * PI * f;
        let k1 = z / (PI * f);
        let k2 = 1.0 / (w * w);
        let k3 = r * z / (PI * f);
        (k1, k2, k3)
    }

    pub fn reset(&mut self, value: T) {
        self.y = value;
        self.yd = T::zero();
        self.xp = value;
    }

    pub fn update(&mut self, x: T, dt: f32) -> T {
        if dt <= 0.0 {
            return self.y;
        }

        let xd = x.sub(self.xp).scale(1.0 / dt);
        self.xp = x;

        let k2_stable = self.k2.max(
            (dt * dt / 2.0 + dt * self.k1 / 2.0).max(dt * self.k1)
        );

        self.y = self.y.add(self.yd.scale(dt));

        let accel = x.add(xd.scale(self.k3))
            .sub(self.y)
            .sub(self.yd.scale(self.k1))
            .scale(1.0 / k2_stable);

        self.yd = self.yd.add(accel.scale(dt));

        self.y
    }

    pub fn current(&self) -> T {
        self.y
    }
}

impl SecondOrderDynamics<Quat> {
    /// Rotation update: keeps the target on the follower's hemisphere and
    /// returns a unit quaternion.
    pub fn update_rotation(&mut self, target: Quat, dt: f32) -> Quat {
        let target = if self.y.dot(target) < 0.0 { -target } else { target };
        let y = self.update(target, dt);
        if y.length_squared() < 1e-8 {
            self.reset(target);
            return target;
        }
        y.normalize()
    }
}
