use crate::math::{BoxVolume, Transform};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which hand a grabber tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HandSide {
    Left,
    Right,
}

/// How a grab on a point is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GrabMode {
    /// Held while the grab gesture is held.
    #[default]
    GrabWhilePressed,
    /// One gesture grabs, the next one releases.
    GrabToggle,
    /// Never released by gestures, only programmatically.
    KeepAlways,
}

/// Hands allowed to use a grab point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompatibleHands {
    #[default]
    Both,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SnapMode {
    DontSnap,
    Position,
    Rotation,
    #[default]
    PositionAndRotation,
}

impl SnapMode {
    pub fn snaps_position(self) -> bool {
        matches!(self, SnapMode::Position | SnapMode::PositionAndRotation)
    }

    pub fn snaps_rotation(self) -> bool {
        matches!(self, SnapMode::Rotation | SnapMode::PositionAndRotation)
    }
}

/// Which side moves to meet the other when snapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SnapDirection {
    /// The object jumps so that its snap pose lands on the hand.
    #[default]
    ObjectToHand,
    /// The object stays; the hand is shown at the snap pose.
    HandToObject,
}

/// How a grabber qualifies as being in range of a point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum ProximityMode {
    /// Distance to the proximity point must be within `max_distance`.
    #[default]
    UseProximity,
    /// The grabber must be inside this box, given in object-local space.
    BoxConstrained(BoxVolume),
}

/// Optional extent of a grab point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum GrabPointShape {
    #[default]
    None,
    /// A segment through the snap position along a local direction. The grab
    /// slides to the closest point of the segment and several hands can hold
    /// the same point.
    Axis { direction: Vec3, length: f32 },
}

/// Declarative description of one place where an object can be held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrabPoint {
    pub name: String,
    pub grab_mode: GrabMode,
    pub compatible_hands: CompatibleHands,
    pub snap_mode: SnapMode,
    pub snap_direction: SnapDirection,
    /// Object-local pose the grabber aligns to.
    pub snap: Transform,
    /// Per avatar prefab replacements for `snap`.
    pub avatar_snap_overrides: BTreeMap<String, Transform>,
    pub proximity_mode: ProximityMode,
    /// Object-local point used for distance checks, defaults to the snap
    /// position.
    pub proximity_point: Option<Vec3>,
    pub max_distance: f32,
    pub shape: GrabPointShape,
}

impl Default for GrabPoint {
    fn default() -> Self {
        Self::new("main")
    }
}

impl GrabPoint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grab_mode: GrabMode::default(),
            compatible_hands: CompatibleHands::default(),
            snap_mode: SnapMode::default(),
            snap_direction: SnapDirection::default(),
            snap: Transform::IDENTITY,
            avatar_snap_overrides: BTreeMap::new(),
            proximity_mode: ProximityMode::default(),
            proximity_point: None,
            max_distance: 0.2,
            shape: GrabPointShape::None,
        }
    }

    pub fn grab_mode(mut self, mode: GrabMode) -> Self {
        self.grab_mode = mode;
        self
    }

    pub fn hands(mut self, hands: CompatibleHands) -> Self {
        self.compatible_hands = hands;
        self
    }

    pub fn snap(mut self, mode: SnapMode, direction: SnapDirection) -> Self {
        self.snap_mode = mode;
        self.snap_direction = direction;
        self
    }

    pub fn snap_pose(mut self, snap: Transform) -> Self {
        self.snap = snap;
        self
    }

    pub fn avatar_override(mut self, avatar_prefab: impl Into<String>, snap: Transform) -> Self {
        self.avatar_snap_overrides.insert(avatar_prefab.into(), snap);
        self
    }

    pub fn proximity(mut self, mode: ProximityMode) -> Self {
        self.proximity_mode = mode;
        self
    }

    pub fn proximity_point(mut self, point: Vec3) -> Self {
        self.proximity_point = Some(point);
        self
    }

    pub fn max_distance(mut self, distance: f32) -> Self {
        self.max_distance = distance;
        self
    }

    pub fn shape(mut self, shape: GrabPointShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn is_compatible(&self, side: HandSide) -> bool {
        match self.compatible_hands {
            CompatibleHands::Both => true,
            CompatibleHands::Left => side == HandSide::Left,
            CompatibleHands::Right => side == HandSide::Right,
        }
    }

    /// Whether two grabbers may hold this same point at once.
    pub fn allows_shared_grab(&self) -> bool {
        !matches!(self.shape, GrabPointShape::None)
    }

    pub fn local_snap(&self, avatar_prefab: Option<&str>) -> Transform {
        avatar_prefab
            .and_then(|prefab| self.avatar_snap_overrides.get(prefab))
            .copied()
            .unwrap_or(self.snap)
    }

    /// Distance used to rank this point for a grabber, or `None` when the
    /// grabber is out of range.
    pub fn proximity_distance(
        &self,
        object_world: &Transform,
        grabber_position: Vec3,
    ) -> Option<f32> {
        let local_point = self.proximity_point.unwrap_or(self.snap.position);
        let distance = object_world.transform_point(local_point).distance(grabber_position);

        match self.proximity_mode {
            ProximityMode::UseProximity => (distance <= self.max_distance).then_some(distance),
            ProximityMode::BoxConstrained(volume) => {
                let local = object_world.inverse_transform_point(grabber_position);
                volume.contains_point(local).then_some(distance)
            }
        }
    }

    /// World pose the grabber should align to when grabbing from
    /// `grabber_position`, honoring the point shape.
    pub fn world_snap(
        &self,
        object_world: &Transform,
        grabber_position: Vec3,
        avatar_prefab: Option<&str>,
    ) -> Transform {
        let local = self.local_snap(avatar_prefab);
        let mut world = object_world.mul_transform(&local).unscaled();

        if let GrabPointShape::Axis { direction, length } = self.shape {
            let half = direction.normalize_or_zero() * (length * 0.5);
            let a = object_world.transform_point(local.position - half);
            let b = object_world.transform_point(local.position + half);
            let segment = b - a;
            let t = if segment.length_squared() > 1e-8 {
                ((grabber_position - a).dot(segment) / segment.length_squared()).clamp(0.0, 1.0)
            } else {
                0.5
            };
            world.position = a + segment * t;
        }

        world
    }
}
