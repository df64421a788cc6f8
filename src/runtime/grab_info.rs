use crate::math::Transform;
use crate::scene::GrabberId;
use glam::Vec3;

/// State of one grabber holding one object.
///
/// Everything except the single-axis accumulator and the parent leverage
/// positions is captured when the grab starts and stays fixed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeGrabInfo {
    pub grabber: GrabberId,
    pub grab_point: usize,
    /// Object pose in grabber space.
    pub relative_grab: Transform,
    /// Pose the hand is shown at, in object-local space.
    pub relative_grabber: Transform,
    /// Snap pose in grabber space. Carried by grab events so a remote peer
    /// reproduces the grab without re-deriving the snap from its own tracking.
    pub grabber_local_snap: Transform,
    /// Grab position in object-local space, the lever arm end point.
    pub leverage_source_local: Vec3,
    /// Same point in grabber space at grab time.
    pub grabber_local_leverage_source: Vec3,
    /// Leverage direction at grab time in parent space, used by the pivot
    /// single-axis model.
    pub initial_leverage_direction: Vec3,
    /// Angle this grab added to the object's cumulative single-axis angle.
    pub single_rotation_angle_contribution: f32,
    /// Last raw angle read for this grab, in `[-180, 180)`.
    pub last_accumulated_angle: f32,
    pub parent_local_grab_position_before_update: Vec3,
    pub parent_local_grab_position_after_update: Vec3,
}

impl RuntimeGrabInfo {
    pub fn new(grabber: GrabberId, grab_point: usize) -> Self {
        Self {
            grabber,
            grab_point,
            relative_grab: Transform::IDENTITY,
            relative_grabber: Transform::IDENTITY,
            grabber_local_snap: Transform::IDENTITY,
            leverage_source_local: Vec3::ZERO,
            grabber_local_leverage_source: Vec3::ZERO,
            initial_leverage_direction: Vec3::ZERO,
            single_rotation_angle_contribution: 0.0,
            last_accumulated_angle: 0.0,
            parent_local_grab_position_before_update: Vec3::ZERO,
            parent_local_grab_position_after_update: Vec3::ZERO,
        }
    }

    /// Object pose the grabber at `grabber_pose` asks for.
    pub fn target_object_pose(&self, grabber_pose: &Transform) -> Transform {
        grabber_pose.mul_transform(&self.relative_grab)
    }

    /// Where the lever arm end point should be with the grabber at
    /// `grabber_pose`.
    pub fn current_leverage_point(&self, grabber_pose: &Transform) -> Vec3 {
        grabber_pose.transform_point(self.grabber_local_leverage_source)
    }

    /// Hand pose shown on an object at `object_world`.
    pub fn hand_pose_on(&self, object_world: &Transform) -> Transform {
        object_world.mul_transform(&self.relative_grabber).unscaled()
    }
}
