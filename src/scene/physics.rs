use glam::Vec3;
use std::fmt::Debug;

/// Handle to a rigid body owned by an external physics engine.
///
/// The resolver never integrates anything: it flips the kinematic flag while an
/// object is held or placed and injects the release velocity when it is let go.
pub trait PhysicsBody: Send + Sync + Debug {
    fn is_kinematic(&self) -> bool;
    fn set_kinematic(&mut self, kinematic: bool);
    fn linear_velocity(&self) -> Vec3;
    fn angular_velocity(&self) -> Vec3;
    fn set_velocities(&mut self, linear: Vec3, angular: Vec3);
    fn is_sleeping(&self) -> bool;
    fn wake_up(&mut self);
}

/// Plain-data body used when no engine is attached, and by the demo and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RigidBodyState {
    pub kinematic: bool,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub sleeping: bool,
}

impl RigidBodyState {
    pub fn dynamic() -> Self {
        Self::default()
    }

    pub fn kinematic() -> Self {
        Self {
            kinematic: true,
            ..Self::default()
        }
    }
}

impl PhysicsBody for RigidBodyState {
    fn is_kinematic(&self) -> bool {
        self.kinematic
    }

    fn set_kinematic(&mut self, kinematic: bool) {
        self.kinematic = kinematic;
        if kinematic {
            self.linear_velocity = Vec3::ZERO;
            self.angular_velocity = Vec3::ZERO;
        }
    }

    fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    fn set_velocities(&mut self, linear: Vec3, angular: Vec3) {
        self.linear_velocity = linear;
        self.angular_velocity = angular;
    }

    fn is_sleeping(&self) -> bool {
        self.sleeping
    }

    fn wake_up(&mut self) {
        self.sleeping = false;
    }
}
