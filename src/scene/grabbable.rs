use super::arena::{AnchorId, AvatarId, ObjectId};
use super::grab_point::GrabPoint;
use super::physics::PhysicsBody;
use crate::dynamics::SecondOrderDynamics;
use crate::math::{Axis, BoxVolume, SphereVolume, Transform};
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// How the position of an object is restricted, in its parent space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum TranslationConstraint {
    #[default]
    Free,
    RestrictToBox(BoxVolume),
    RestrictToSphere(SphereVolume),
    /// Offset from the initial local position, measured in the initial local
    /// axes, limited by `translation_limits_min/max`.
    RestrictLocalOffset,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationConstraint {
    #[default]
    Free,
    /// Euler-style limits in degrees relative to the initial local rotation,
    /// given by `rotation_angle_limits_min/max`.
    RestrictLocalRotation,
    Locked,
}

/// Source of the object rotation while it is manipulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationProvider {
    /// The object follows the hand orientation.
    #[default]
    HandOrientation,
    /// The object turns around its pivot following the hand position, like a
    /// lever or a steering wheel.
    HandPositionAroundPivot,
}

/// Static configuration of a grabbable object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrabbableConfig {
    pub grabbable: bool,
    pub allow_multi_grab: bool,
    pub translation_constraint: TranslationConstraint,
    pub translation_limits_min: Vec3,
    pub translation_limits_max: Vec3,
    pub rotation_constraint: RotationConstraint,
    /// Degrees.
    pub rotation_angle_limits_min: Vec3,
    /// Degrees.
    pub rotation_angle_limits_max: Vec3,
    /// Axis kept as the roll axis when more than one rotation axis is free.
    pub rotation_longitudinal_axis: Axis,
    pub rotation_provider: RotationProvider,
    /// Object-local pivot for `HandPositionAroundPivot`.
    pub rotation_pivot: Vec3,
    pub needs_two_hands_to_rotate: bool,
    /// 0 = no resistance, 1 = does not move.
    pub translation_resistance: f32,
    pub rotation_resistance: f32,
    /// Reparent under the grabbing avatar while held.
    pub use_parenting: bool,
    /// Take part in a leverage chain with the grabbable parent.
    pub uses_grabbable_parent_dependency: bool,
    /// Turning this object turns the grabbable parent.
    pub control_parent_direction: bool,
    pub tag: Option<String>,
    /// Place on the nearest compatible anchor when released in range.
    pub place_on_release: bool,
    /// Seconds after release before returning to the anchor it was taken
    /// from.
    pub return_to_anchor_seconds: Option<f32>,
    /// Override of the global auto-release distance.
    pub release_distance: Option<f32>,
}

impl Default for GrabbableConfig {
    fn default() -> Self {
        Self {
            grabbable: true,
            allow_multi_grab: true,
            translation_constraint: TranslationConstraint::Free,
            translation_limits_min: Vec3::ZERO,
            translation_limits_max: Vec3::ZERO,
            rotation_constraint: RotationConstraint::Free,
            rotation_angle_limits_min: Vec3::ZERO,
            rotation_angle_limits_max: Vec3::ZERO,
            rotation_longitudinal_axis: Axis::Z,
            rotation_provider: RotationProvider::HandOrientation,
            rotation_pivot: Vec3::ZERO,
            needs_two_hands_to_rotate: false,
            translation_resistance: 0.0,
            rotation_resistance: 0.0,
            use_parenting: false,
            uses_grabbable_parent_dependency: false,
            control_parent_direction: false,
            tag: None,
            place_on_release: true,
            return_to_anchor_seconds: None,
            release_distance: None,
        }
    }
}

impl GrabbableConfig {
    /// Axes with a non-empty rotation range. Only meaningful under
    /// `RestrictLocalRotation`.
    pub fn rotation_range_axes(&self) -> Vec<Axis> {
        let min = self.rotation_angle_limits_min.to_array();
        let max = self.rotation_angle_limits_max.to_array();
        Axis::ALL
            .into_iter()
            .filter(|a| (max[a.index()] - min[a.index()]).abs() > f32::EPSILON)
            .collect()
    }

    /// The single rotation axis when rotation is restricted to exactly one.
    pub fn single_rotation_axis(&self) -> Option<Axis> {
        if self.rotation_constraint != RotationConstraint::RestrictLocalRotation {
            return None;
        }
        match self.rotation_range_axes().as_slice() {
            [axis] => Some(*axis),
            _ => None,
        }
    }

    pub fn rotation_limits(&self, axis: Axis) -> (f32, f32) {
        let i = axis.index();
        let a = self.rotation_angle_limits_min.to_array()[i];
        let b = self.rotation_angle_limits_max.to_array()[i];
        (a.min(b), a.max(b))
    }
}

/// What an object's local transform is relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParentLink {
    #[default]
    World,
    Object(ObjectId),
    Anchor(AnchorId),
    Avatar(AvatarId),
}

/// Interpolation toward the anchor after a smooth placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlacementTransition {
    pub from: Transform,
    pub duration: f32,
    pub elapsed: f32,
}

/// Pending return to an anchor after release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ReturnTimer {
    pub anchor: AnchorId,
    pub remaining: f32,
}

/// Followers used to apply resistance.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResistanceState {
    pub position: SecondOrderDynamics<Vec3>,
    pub rotation: SecondOrderDynamics<Quat>,
    pub angle: SecondOrderDynamics<f32>,
}

/// Manipulable entity.
#[derive(Debug)]
pub struct GrabbableObject {
    pub name: String,
    pub config: GrabbableConfig,
    pub grab_points: Vec<GrabPoint>,
    pub enabled: bool,
    pub(crate) local: Transform,
    pub(crate) parent: ParentLink,
    pub(crate) grabbable_parent: Option<ObjectId>,
    pub(crate) initial_local: Transform,
    pub(crate) single_rotation_angle: f32,
    pub(crate) current_anchor: Option<AnchorId>,
    pub(crate) physics: Option<Box<dyn PhysicsBody>>,
    pub(crate) local_before_update: Transform,
    pub(crate) angle_before_update: f32,
    pub(crate) parent_before_grab: Option<ParentLink>,
    pub(crate) resistance: Option<ResistanceState>,
    pub(crate) placement_transition: Option<PlacementTransition>,
    pub(crate) return_timer: Option<ReturnTimer>,
}

impl GrabbableObject {
    pub fn builder(name: impl Into<String>) -> GrabbableObjectBuilder {
        GrabbableObjectBuilder::new(name)
    }

    pub fn local_transform(&self) -> Transform {
        self.local
    }

    pub fn parent(&self) -> ParentLink {
        self.parent
    }

    pub fn grabbable_parent(&self) -> Option<ObjectId> {
        self.grabbable_parent
    }

    pub fn current_anchor(&self) -> Option<AnchorId> {
        self.current_anchor
    }

    pub fn initial_local_transform(&self) -> Transform {
        self.initial_local
    }

    pub fn physics(&self) -> Option<&dyn PhysicsBody> {
        self.physics.as_deref()
    }

    pub fn grab_point(&self, index: usize) -> Option<&GrabPoint> {
        self.grab_points.get(index)
    }

    /// Whether the leverage chain to the grabbable parent is active.
    pub fn depends_on_grabbable_parent(&self) -> bool {
        self.config.uses_grabbable_parent_dependency && self.grabbable_parent.is_some()
    }

    pub fn controls_parent_direction(&self) -> bool {
        self.depends_on_grabbable_parent() && self.config.control_parent_direction
    }

    pub fn is_placing_smoothly(&self) -> bool {
        self.placement_transition.is_some()
    }

    pub(crate) fn set_kinematic(&mut self, kinematic: bool) {
        if let Some(body) = self.physics.as_mut() {
            body.set_kinematic(kinematic);
        }
    }
}

/// Builds a [`GrabbableObject`] in the object's initial pose.
pub struct GrabbableObjectBuilder {
    name: String,
    config: GrabbableConfig,
    grab_points: Vec<GrabPoint>,
    local: Transform,
    parent: ParentLink,
    grabbable_parent: Option<ObjectId>,
    physics: Option<Box<dyn PhysicsBody>>,
    single_rotation_angle: f32,
}

impl GrabbableObjectBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: GrabbableConfig::default(),
            grab_points: Vec::new(),
            local: Transform::IDENTITY,
            parent: ParentLink::World,
            grabbable_parent: None,
            physics: None,
            single_rotation_angle: 0.0,
        }
    }

    pub fn config(mut self, config: GrabbableConfig) -> Self {
        self.config = config;
        self
    }

    pub fn grab_point(mut self, point: GrabPoint) -> Self {
        self.grab_points.push(point);
        self
    }

    pub fn local_transform(mut self, local: Transform) -> Self {
        self.local = local;
        self
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.local.position = position;
        self
    }

    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.local.rotation = rotation;
        self
    }

    pub fn parent(mut self, parent: ParentLink) -> Self {
        self.parent = parent;
        self
    }

    /// Makes `parent` both the transform parent and the grabbable parent of
    /// the leverage chain.
    pub fn grabbable_parent(mut self, parent: ObjectId) -> Self {
        self.parent = ParentLink::Object(parent);
        self.grabbable_parent = Some(parent);
        self
    }

    pub fn physics<B: PhysicsBody + 'static>(mut self, body: B) -> Self {
        self.physics = Some(Box::new(body));
        self
    }

    /// Initial value of the single-axis angle, clamped to the limits.
    pub fn single_rotation_angle(mut self, degrees: f32) -> Self {
        self.single_rotation_angle = degrees;
        self
    }

    pub fn build(self) -> GrabbableObject {
        let mut grab_points = self.grab_points;
        if grab_points.is_empty() {
            grab_points.push(GrabPoint::default());
        }

        // The built rotation is the zero-angle reference of the single axis.
        let initial_local = self.local;
        let mut local = self.local;
        let angle = match self.config.single_rotation_axis() {
            Some(axis) => {
                let (min, max) = self.config.rotation_limits(axis);
                let angle = self.single_rotation_angle.clamp(min, max);
                local.rotation = initial_local.rotation
                    * Quat::from_axis_angle(axis.unit(), angle.to_radians());
                angle
            }
            None => 0.0,
        };

        GrabbableObject {
            name: self.name,
            config: self.config,
            grab_points,
            enabled: true,
            local,
            parent: self.parent,
            grabbable_parent: self.grabbable_parent,
            initial_local,
            single_rotation_angle: angle,
            current_anchor: None,
            physics: self.physics,
            local_before_update: local,
            angle_before_update: angle,
            parent_before_grab: None,
            resistance: None,
            placement_transition: None,
            return_timer: None,
        }
    }
}
