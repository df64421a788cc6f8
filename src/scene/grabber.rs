use super::arena::{AvatarId, ObjectId};
use super::grab_point::HandSide;
use crate::math::Transform;
use glam::{Quat, Vec3};
use std::collections::VecDeque;
use std::f32::consts::PI;

/// Owner of a set of grabbers.
#[derive(Debug, Clone)]
pub struct Avatar {
    pub name: String,
    /// Prefab name used to look up per-avatar grab point overrides.
    pub prefab: Option<String>,
    pub transform: Transform,
}

impl Avatar {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefab: None,
            transform: Transform::IDENTITY,
        }
    }

    pub fn with_prefab(mut self, prefab: impl Into<String>) -> Self {
        self.prefab = Some(prefab.into());
        self
    }
}

/// One entry of the grabber's rolling motion window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsSample {
    pub position: Vec3,
    pub rotation: Quat,
    pub velocity: Vec3,
    pub angular_velocity: Vec3,
    pub age: f32,
}

/// Tracked hand proxy able to hold one object.
#[derive(Debug, Clone)]
pub struct Grabber {
    pub avatar: AvatarId,
    pub side: HandSide,
    pub enabled: bool,
    /// Hand bone pose relative to the grabber.
    pub hand_bone_offset: Transform,
    pub(crate) pose: Transform,
    pub(crate) hand_bone: Transform,
    pub(crate) grabbed_object: Option<ObjectId>,
    previous_pose: Option<Transform>,
    samples: VecDeque<PhysicsSample>,
}

impl Grabber {
    pub fn new(avatar: AvatarId, side: HandSide) -> Self {
        Self {
            avatar,
            side,
            enabled: true,
            hand_bone_offset: Transform::IDENTITY,
            pose: Transform::IDENTITY,
            hand_bone: Transform::IDENTITY,
            grabbed_object: None,
            previous_pose: None,
            samples: VecDeque::new(),
        }
    }

    pub fn with_pose(mut self, pose: Transform) -> Self {
        self.pose = pose.unscaled();
        self.hand_bone = self.pose.mul_transform(&self.hand_bone_offset);
        self
    }

    pub fn with_hand_bone_offset(mut self, offset: Transform) -> Self {
        self.hand_bone_offset = offset;
        self.hand_bone = self.pose.mul_transform(&offset);
        self
    }

    pub fn pose(&self) -> Transform {
        self.pose
    }

    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    /// World pose of the hand bone after grips were kept in place.
    pub fn hand_bone(&self) -> Transform {
        self.hand_bone
    }

    pub fn grabbed_object(&self) -> Option<ObjectId> {
        self.grabbed_object
    }

    pub fn is_grabbing(&self) -> bool {
        self.grabbed_object.is_some()
    }

    /// Applies a tracked pose. The hand bone follows the tracking until grips
    /// are kept in place for the frame.
    pub(crate) fn set_pose(&mut self, pose: Transform) {
        self.pose = pose.unscaled();
        self.hand_bone = self.pose.mul_transform(&self.hand_bone_offset);
    }

    /// Records the motion since the previous sample and drops samples older
    /// than `window` seconds.
    pub(crate) fn sample(&mut self, dt: f32, window: f32) {
        if dt <= 0.0 {
            return;
        }

        for s in self.samples.iter_mut() {
            s.age += dt;
        }
        while self.samples.front().is_some_and(|s| s.age > window) {
            self.samples.pop_front();
        }

        let (velocity, angular_velocity) = match self.previous_pose {
            Some(prev) => (
                (self.pose.position - prev.position) / dt,
                angular_velocity(prev.rotation, self.pose.rotation, dt),
            ),
            None => (Vec3::ZERO, Vec3::ZERO),
        };

        self.samples.push_back(PhysicsSample {
            position: self.pose.position,
            rotation: self.pose.rotation,
            velocity,
            angular_velocity,
            age: 0.0,
        });
        self.previous_pose = Some(self.pose);
    }

    pub fn samples(&self) -> impl Iterator<Item = &PhysicsSample> + '_ {
        self.samples.iter()
    }

    pub fn smoothed_velocity(&self) -> Vec3 {
        if self.samples.is_empty() {
            return Vec3::ZERO;
        }
        self.samples.iter().map(|s| s.velocity).sum::<Vec3>() / self.samples.len() as f32
    }

    pub fn smoothed_angular_velocity(&self) -> Vec3 {
        if self.samples.is_empty() {
            return Vec3::ZERO;
        }
        self.samples.iter().map(|s| s.angular_velocity).sum::<Vec3>() / self.samples.len() as f32
    }
}

fn angular_velocity(from: Quat, to: Quat, dt: f32) -> Vec3 {
    let delta = (to * from.inverse()).normalize();
    let (axis, mut angle) = delta.to_axis_angle();
    if angle > PI {
        angle -= 2.0 * PI;
    }
    if !axis.is_finite() || angle.abs() < 1e-6 {
        return Vec3::ZERO;
    }
    axis * (angle / dt)
}
