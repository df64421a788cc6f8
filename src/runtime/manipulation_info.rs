use super::grab_info::RuntimeGrabInfo;
use crate::scene::{AnchorId, GrabberId, ObjectId};
use glam::Vec3;

/// Runtime record of an object currently held by at least one grabber.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeManipulationInfo {
    pub grabbed_object: ObjectId,
    /// Anchor the object was taken from, if any.
    pub source_anchor: Option<AnchorId>,
    /// Object-local pivot the object turns around when its children drive it.
    pub local_rotation_pivot: Vec3,
    grabs: Vec<RuntimeGrabInfo>,
}

impl RuntimeManipulationInfo {
    pub fn new(
        grabbed_object: ObjectId,
        source_anchor: Option<AnchorId>,
        local_rotation_pivot: Vec3,
    ) -> Self {
        Self {
            grabbed_object,
            source_anchor,
            local_rotation_pivot,
            grabs: Vec::new(),
        }
    }

    pub fn grabs(&self) -> &[RuntimeGrabInfo] {
        &self.grabs
    }

    pub fn grabs_mut(&mut self) -> &mut [RuntimeGrabInfo] {
        &mut self.grabs
    }

    pub fn grab_count(&self) -> usize {
        self.grabs.len()
    }

    pub fn grabbers(&self) -> impl Iterator<Item = GrabberId> + '_ {
        self.grabs.iter().map(|g| g.grabber)
    }

    pub fn grab_for(&self, grabber: GrabberId) -> Option<&RuntimeGrabInfo> {
        self.grabs.iter().find(|g| g.grabber == grabber)
    }

    pub fn grab_for_mut(&mut self, grabber: GrabberId) -> Option<&mut RuntimeGrabInfo> {
        self.grabs.iter_mut().find(|g| g.grabber == grabber)
    }

    pub fn is_grabbed_by(&self, grabber: GrabberId) -> bool {
        self.grab_for(grabber).is_some()
    }

    /// Grabbers holding the given grab point.
    pub fn grabbers_at_point(&self, grab_point: usize) -> Vec<GrabberId> {
        self.grabs
            .iter()
            .filter(|g| g.grab_point == grab_point)
            .map(|g| g.grabber)
            .collect()
    }

    pub(crate) fn add_grab(&mut self, grab: RuntimeGrabInfo) {
        self.grabs.retain(|g| g.grabber != grab.grabber);
        self.grabs.push(grab);
    }

    pub(crate) fn remove_grab(&mut self, grabber: GrabberId) -> Option<RuntimeGrabInfo> {
        let index = self.grabs.iter().position(|g| g.grabber == grabber)?;
        Some(self.grabs.remove(index))
    }

    /// Removes the part of the averaged single-axis delta that the limits
    /// clamped away, in equal shares, so a grab released later doesn't take
    /// the excess with it.
    pub(crate) fn subtract_single_axis_excess(&mut self, excess: f32) {
        if excess == 0.0 {
            return;
        }
        for grab in self.grabs.iter_mut() {
            grab.single_rotation_angle_contribution -= excess;
        }
    }
}
