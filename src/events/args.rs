use crate::math::Transform;
use crate::scene::{AnchorId, GrabberId, ObjectId};
use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManipulationEventType {
    Grabbing,
    Grabbed,
    Releasing,
    Released,
    Placing,
    Placed,
    Removing,
    Removed,
    /// A held object became the nearest candidate of an anchor.
    AnchorRangeEntered,
    /// A held object stopped being the nearest candidate of an anchor.
    AnchorRangeLeft,
}

impl ManipulationEventType {
    /// Events raised before the state they describe is applied.
    pub fn is_pre_mutation(self) -> bool {
        matches!(
            self,
            Self::Grabbing | Self::Releasing | Self::Placing | Self::Removing
        )
    }
}

/// Flags controlling [`crate::ManipulationResolver::place_object`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlacementOptions {
    /// Interpolate into the anchor instead of snapping instantly.
    pub smooth: bool,
    /// Keep current grips while placing.
    pub dont_release: bool,
}

impl PlacementOptions {
    pub const NONE: Self = Self {
        smooth: false,
        dont_release: false,
    };
    pub const SMOOTH: Self = Self {
        smooth: true,
        dont_release: false,
    };
    pub const DONT_RELEASE: Self = Self {
        smooth: false,
        dont_release: true,
    };
}

impl BitOr for PlacementOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            smooth: self.smooth || rhs.smooth,
            dont_release: self.dont_release || rhs.dont_release,
        }
    }
}

/// Pose record with a fixed binary layout.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct ReplayPose {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

impl ReplayPose {
    pub const SIZE: usize = std::mem::size_of::<ReplayPose>();

    pub fn to_transform(&self) -> Transform {
        Transform::from_position_rotation(
            Vec3::from_array(self.position),
            Quat::from_array(self.rotation),
        )
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out.copy_from_slice(bytemuck::bytes_of(self));
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        bytemuck::try_pod_read_unaligned(bytes).ok()
    }
}

impl From<Transform> for ReplayPose {
    fn from(t: Transform) -> Self {
        Self {
            position: t.position.to_array(),
            rotation: t.rotation.to_array(),
        }
    }
}

/// Velocity handed to the physics body on release.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct ReleaseVelocity {
    pub linear: [f32; 3],
    pub angular: [f32; 3],
}

impl ReleaseVelocity {
    pub fn new(linear: Vec3, angular: Vec3) -> Self {
        Self {
            linear: linear.to_array(),
            angular: angular.to_array(),
        }
    }

    pub fn linear(&self) -> Vec3 {
        Vec3::from_array(self.linear)
    }

    pub fn angular(&self) -> Vec3 {
        Vec3::from_array(self.angular)
    }
}

/// Snapshot describing one manipulation transition.
///
/// Grab events carry the grabber-local snap pose, release events the final
/// release velocity and place events the object pose before placement, so a
/// receiver can reproduce the transition without its own tracking data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManipulationEventArgs {
    pub event_type: ManipulationEventType,
    pub object: ObjectId,
    pub anchor: Option<AnchorId>,
    pub grabber: Option<GrabberId>,
    pub grab_point: Option<usize>,
    pub is_multi_hands: bool,
    pub is_switch_hands: bool,
    pub placement_options: PlacementOptions,
    pub grabber_local_snap: Option<ReplayPose>,
    pub release_velocity: Option<ReleaseVelocity>,
    pub object_pose: Option<ReplayPose>,
}

impl ManipulationEventArgs {
    pub fn new(event_type: ManipulationEventType, object: ObjectId) -> Self {
        Self {
            event_type,
            object,
            anchor: None,
            grabber: None,
            grab_point: None,
            is_multi_hands: false,
            is_switch_hands: false,
            placement_options: PlacementOptions::NONE,
            grabber_local_snap: None,
            release_velocity: None,
            object_pose: None,
        }
    }

    pub fn with_type(&self, event_type: ManipulationEventType) -> Self {
        Self {
            event_type,
            ..self.clone()
        }
    }

    pub fn anchor(mut self, anchor: AnchorId) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn grabber(mut self, grabber: GrabberId, grab_point: usize) -> Self {
        self.grabber = Some(grabber);
        self.grab_point = Some(grab_point);
        self
    }

    pub fn hands(mut self, multi_hands: bool, switch_hands: bool) -> Self {
        self.is_multi_hands = multi_hands;
        self.is_switch_hands = switch_hands;
        self
    }

    pub fn placement(mut self, options: PlacementOptions, object_pose: Transform) -> Self {
        self.placement_options = options;
        self.object_pose = Some(object_pose.into());
        self
    }

    pub fn snap(mut self, grabber_local_snap: Transform) -> Self {
        self.grabber_local_snap = Some(grabber_local_snap.into());
        self
    }

    pub fn velocity(mut self, velocity: ReleaseVelocity) -> Self {
        self.release_velocity = Some(velocity);
        self
    }
}
