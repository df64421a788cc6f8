use super::anchor::GrabbableAnchor;
use super::arena::{AnchorId, Arena, AvatarId, GrabberId, ObjectId};
use super::grab_point::HandSide;
use super::grabbable::{GrabbableObject, ParentLink};
use super::grabber::{Avatar, Grabber};
use crate::error::ManipulationError;
use crate::math::Transform;
use crate::runtime::RuntimeManipulationInfo;
use std::collections::BTreeMap;

// Parent chains deeper than this are treated as cycles.
const MAX_PARENT_DEPTH: usize = 32;

/// Everything the resolver operates on: the entity arenas, the table of
/// active manipulations and the anchor candidate cache.
///
/// Passed explicitly into every resolver call; nothing here is global.
#[derive(Debug, Default)]
pub struct ManipulationContext {
    avatars: Arena<AvatarId, Avatar>,
    grabbers: Arena<GrabberId, Grabber>,
    objects: Arena<ObjectId, GrabbableObject>,
    anchors: Arena<AnchorId, GrabbableAnchor>,
    pub(crate) manipulations: BTreeMap<ObjectId, RuntimeManipulationInfo>,
    /// Nearest grabbed object each anchor would receive if it were released.
    pub(crate) anchor_candidates: BTreeMap<AnchorId, ObjectId>,
}

/// A grabbable point in range of a grabber.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrabCandidate {
    pub object: ObjectId,
    pub grab_point: usize,
    pub distance: f32,
}

impl ManipulationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_avatar(&mut self, avatar: Avatar) -> AvatarId {
        self.avatars.insert(avatar)
    }

    pub fn add_grabber(&mut self, grabber: Grabber) -> GrabberId {
        self.grabbers.insert(grabber)
    }

    pub fn add_object(&mut self, object: GrabbableObject) -> ObjectId {
        self.objects.insert(object)
    }

    pub fn add_anchor(&mut self, anchor: GrabbableAnchor) -> AnchorId {
        self.anchors.insert(anchor)
    }

    pub fn avatar(&self, id: AvatarId) -> Option<&Avatar> {
        self.avatars.get(id)
    }

    pub fn grabber(&self, id: GrabberId) -> Option<&Grabber> {
        self.grabbers.get(id)
    }

    pub fn object(&self, id: ObjectId) -> Option<&GrabbableObject> {
        self.objects.get(id)
    }

    pub fn anchor(&self, id: AnchorId) -> Option<&GrabbableAnchor> {
        self.anchors.get(id)
    }

    pub(crate) fn grabber_mut(&mut self, id: GrabberId) -> Option<&mut Grabber> {
        self.grabbers.get_mut(id)
    }

    pub(crate) fn object_mut(&mut self, id: ObjectId) -> Option<&mut GrabbableObject> {
        self.objects.get_mut(id)
    }

    pub(crate) fn anchor_mut(&mut self, id: AnchorId) -> Option<&mut GrabbableAnchor> {
        self.anchors.get_mut(id)
    }

    pub fn grabbers(&self) -> impl Iterator<Item = (GrabberId, &Grabber)> + '_ {
        self.grabbers.iter()
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &GrabbableObject)> + '_ {
        self.objects.iter()
    }

    pub fn anchors(&self) -> impl Iterator<Item = (AnchorId, &GrabbableAnchor)> + '_ {
        self.anchors.iter()
    }

    pub(crate) fn grabbers_mut(
        &mut self,
    ) -> impl Iterator<Item = (GrabberId, &mut Grabber)> + '_ {
        self.grabbers.iter_mut()
    }

    pub(crate) fn objects_mut(
        &mut self,
    ) -> impl Iterator<Item = (ObjectId, &mut GrabbableObject)> + '_ {
        self.objects.iter_mut()
    }

    /// Enables or disables an object. Disabled objects can still be grabbed
    /// programmatically, with a warning.
    pub fn set_object_enabled(
        &mut self,
        id: ObjectId,
        enabled: bool,
    ) -> Result<(), ManipulationError> {
        let object = self.objects.get_mut(id).ok_or(ManipulationError::UnknownObject(id))?;
        object.enabled = enabled;
        Ok(())
    }

    pub fn set_grabber_enabled(
        &mut self,
        id: GrabberId,
        enabled: bool,
    ) -> Result<(), ManipulationError> {
        let grabber = self.grabbers.get_mut(id).ok_or(ManipulationError::UnknownGrabber(id))?;
        grabber.enabled = enabled;
        Ok(())
    }

    /// Pose provider entry point: the tracked world pose of a grabber.
    pub fn set_grabber_pose(
        &mut self,
        id: GrabberId,
        pose: Transform,
    ) -> Result<(), ManipulationError> {
        let grabber = self.grabbers.get_mut(id).ok_or(ManipulationError::UnknownGrabber(id))?;
        grabber.set_pose(pose);
        Ok(())
    }

    pub fn set_avatar_transform(
        &mut self,
        id: AvatarId,
        transform: Transform,
    ) -> Result<(), ManipulationError> {
        let avatar = self.avatars.get_mut(id).ok_or(ManipulationError::UnknownAvatar(id))?;
        avatar.transform = transform;
        Ok(())
    }

    pub fn manipulation(&self, object: ObjectId) -> Option<&RuntimeManipulationInfo> {
        self.manipulations.get(&object)
    }

    pub fn manipulations(&self) -> impl Iterator<Item = &RuntimeManipulationInfo> + '_ {
        self.manipulations.values()
    }

    pub fn is_grabbed(&self, object: ObjectId) -> bool {
        self.manipulations.contains_key(&object)
    }

    pub fn grab_count(&self, object: ObjectId) -> usize {
        self.manipulations.get(&object).map_or(0, |m| m.grab_count())
    }

    /// Object each anchor currently offers to receive.
    pub fn anchor_candidate(&self, anchor: AnchorId) -> Option<ObjectId> {
        self.anchor_candidates.get(&anchor).copied()
    }

    pub fn find_grabbers(&self, avatar: AvatarId, side: HandSide) -> Vec<GrabberId> {
        self.grabbers
            .iter()
            .filter(|(_, g)| g.avatar == avatar && g.side == side)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn parent_world(&self, link: ParentLink) -> Transform {
        self.parent_world_at_depth(link, 0)
    }

    pub fn object_world(&self, id: ObjectId) -> Option<Transform> {
        self.object_world_at_depth(id, 0)
    }

    pub fn anchor_world(&self, id: AnchorId) -> Option<Transform> {
        self.anchor_world_at_depth(id, 0)
    }

    fn parent_world_at_depth(&self, link: ParentLink, depth: usize) -> Transform {
        if depth > MAX_PARENT_DEPTH {
            log::error!("parent chain too deep at {link:?}, treating as world");
            return Transform::IDENTITY;
        }
        match link {
            ParentLink::World => Transform::IDENTITY,
            ParentLink::Object(id) => self.object_world_at_depth(id, depth + 1).unwrap_or_default(),
            ParentLink::Anchor(id) => self.anchor_world_at_depth(id, depth + 1).unwrap_or_default(),
            ParentLink::Avatar(id) => self.avatars.get(id).map(|a| a.transform).unwrap_or_default(),
        }
    }

    fn object_world_at_depth(&self, id: ObjectId, depth: usize) -> Option<Transform> {
        let object = self.objects.get(id)?;
        let parent = self.parent_world_at_depth(object.parent, depth);
        Some(parent.mul_transform(&object.local))
    }

    fn anchor_world_at_depth(&self, id: AnchorId, depth: usize) -> Option<Transform> {
        let anchor = self.anchors.get(id)?;
        let parent = match anchor.parent {
            Some(object) => self.object_world_at_depth(object, depth + 1).unwrap_or_default(),
            None => Transform::IDENTITY,
        };
        Some(parent.mul_transform(&anchor.local))
    }

    /// World transform of an object's parent space.
    pub fn object_parent_world(&self, id: ObjectId) -> Option<Transform> {
        self.objects.get(id).map(|o| self.parent_world(o.parent))
    }

    /// Moves an object to a world pose without constraints. Scale is kept.
    pub(crate) fn set_object_world_pose(&mut self, id: ObjectId, world: &Transform) {
        let Some(parent) = self.object_parent_world(id) else {
            return;
        };
        let local = parent.relative(world);
        if let Some(object) = self.objects.get_mut(id) {
            object.local.position = local.position;
            object.local.rotation = local.rotation;
        }
    }

    /// Changes an object's parent link keeping its world pose.
    pub(crate) fn reparent_object(&mut self, id: ObjectId, link: ParentLink) {
        let Some(world) = self.object_world(id) else {
            return;
        };
        let parent = self.parent_world(link);
        if let Some(object) = self.objects.get_mut(id) {
            object.parent = link;
            object.local = parent.relative(&world);
        }
    }

    /// Objects whose grabbable parent is `id` and that take part in the
    /// leverage chain.
    pub fn grabbable_children(&self, id: ObjectId) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, o)| {
                o.grabbable_parent == Some(id) && o.config.uses_grabbable_parent_dependency
            })
            .map(|(child, _)| child)
            .collect()
    }

    pub fn grabbable_descendant_count(&self, id: ObjectId) -> usize {
        let mut count = 0;
        let mut stack = self.grabbable_children(id);
        let mut visited = 0;
        while let Some(child) = stack.pop() {
            visited += 1;
            if visited > self.objects.len() {
                log::error!("cycle in grabbable parent chain of {id:?}");
                break;
            }
            count += 1;
            stack.extend(self.grabbable_children(child));
        }
        count
    }

    /// Whether any object in the leverage subtree below `id` is held.
    pub fn is_child_leverage_grabbed(&self, id: ObjectId) -> bool {
        let mut stack = self.grabbable_children(id);
        let mut visited = 0;
        while let Some(child) = stack.pop() {
            visited += 1;
            if visited > self.objects.len() {
                break;
            }
            if self.is_grabbed(child) {
                return true;
            }
            stack.extend(self.grabbable_children(child));
        }
        false
    }

    /// Nearest grab point in range of a grabber. Ties go to the lower object
    /// handle, then the lower point index.
    pub fn closest_grab_candidate(&self, grabber: GrabberId) -> Option<GrabCandidate> {
        let grabber = self.grabbers.get(grabber)?;
        let position = grabber.position();

        let mut best: Option<GrabCandidate> = None;

        for (id, object) in self.objects.iter() {
            if !object.enabled || !object.config.grabbable {
                continue;
            }
            let Some(world) = self.object_world(id) else {
                continue;
            };

            for (index, point) in object.grab_points.iter().enumerate() {
                if !point.is_compatible(grabber.side) {
                    continue;
                }
                let Some(distance) = point.proximity_distance(&world, position) else {
                    continue;
                };
                match &best {
                    Some(b) if b.distance <= distance => {}
                    _ => {
                        best = Some(GrabCandidate {
                            object: id,
                            grab_point: index,
                            distance,
                        })
                    }
                }
            }
        }

        best
    }

    /// Nearest enabled, free anchor accepting the object's tag within the
    /// anchor's placing distance.
    pub fn closest_compatible_anchor(&self, object: ObjectId) -> Option<(AnchorId, f32)> {
        let item = self.objects.get(object)?;
        let position = self.object_world(object)?.position;

        self.anchors
            .iter()
            .filter(|(_, a)| a.enabled && a.parent != Some(object))
            .filter(|(_, a)| a.current_placed_object.map_or(true, |o| o == object))
            .filter(|(_, a)| a.accepts_tag(item.config.tag.as_deref()))
            .filter_map(|(id, a)| {
                let distance = self.anchor_world(id)?.position.distance(position);
                (distance <= a.max_placing_distance).then_some((id, distance))
            })
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Checks the two-way anchor links: every placed object points back to
    /// its anchor and no object sits in two anchors.
    pub fn anchors_consistent(&self) -> bool {
        let mut seen = BTreeMap::new();
        for (anchor_id, anchor) in self.anchors.iter() {
            if let Some(object) = anchor.current_placed_object {
                if seen.insert(object, anchor_id).is_some() {
                    return false;
                }
                if self.objects.get(object).and_then(|o| o.current_anchor) != Some(anchor_id) {
                    return false;
                }
            }
        }
        self.objects.iter().all(|(id, o)| match o.current_anchor {
            Some(anchor) => seen.get(&id) == Some(&anchor),
            None => !seen.contains_key(&id),
        })
    }
}
