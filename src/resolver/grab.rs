use super::{solve, ManipulationResolver, ReleaseMode};
use crate::error::ManipulationError;
use crate::events::{ManipulationEventArgs, ManipulationEventType};
use crate::math::{project_on_plane, Transform};
use crate::runtime::{RuntimeGrabInfo, RuntimeManipulationInfo};
use crate::scene::{
    AvatarId, GrabMode, GrabPoint, GrabbableObject, GrabberId, HandSide, ManipulationContext,
    ObjectId, ParentLink, RotationConstraint, RotationProvider, SnapDirection,
    TranslationConstraint,
};

impl ManipulationResolver {
    /// Input path for a grab button press: every grabber of the hand grabs
    /// the nearest point in range. A grabber already holding a toggle point
    /// releases it instead. Returns whether anything changed.
    pub fn try_grab(
        &mut self,
        ctx: &mut ManipulationContext,
        avatar: AvatarId,
        side: HandSide,
    ) -> bool {
        let grabbers = ctx.find_grabbers(avatar, side);
        if grabbers.is_empty() {
            log::debug!("no {side:?} grabber for {avatar:?}");
            return false;
        }

        let mut changed = false;
        for grabber in grabbers {
            let Some(state) = ctx.grabber(grabber) else {
                continue;
            };
            if !state.enabled {
                continue;
            }
            if let Some(object) = state.grabbed_object() {
                if grab_mode_of(ctx, grabber, object) == Some(GrabMode::GrabToggle) {
                    changed |= self.release_object(ctx, Some(grabber), object, true).is_ok();
                }
                continue;
            }
            let Some(candidate) = ctx.closest_grab_candidate(grabber) else {
                continue;
            };
            changed |= self
                .grab_object(ctx, grabber, candidate.object, candidate.grab_point, true)
                .is_ok();
        }
        changed
    }

    /// Input path for a grab button release. Points with
    /// [`GrabMode::KeepAlways`] are never released here.
    pub fn try_release(
        &mut self,
        ctx: &mut ManipulationContext,
        avatar: AvatarId,
        side: HandSide,
    ) -> bool {
        let mut changed = false;
        for grabber in ctx.find_grabbers(avatar, side) {
            let Some(object) = ctx.grabber(grabber).and_then(|g| g.grabbed_object()) else {
                continue;
            };
            if grab_mode_of(ctx, grabber, object) == Some(GrabMode::KeepAlways) {
                continue;
            }
            changed |= self.release_object(ctx, Some(grabber), object, true).is_ok();
        }
        changed
    }

    pub fn grab_object(
        &mut self,
        ctx: &mut ManipulationContext,
        grabber: GrabberId,
        object: ObjectId,
        grab_point: usize,
        propagate: bool,
    ) -> Result<(), ManipulationError> {
        self.grab_object_with_snap(ctx, grabber, object, grab_point, None, propagate)
    }

    /// Grab with an explicit grabber-local snap pose instead of one derived
    /// from the current tracking, as carried by grab events.
    pub fn grab_object_with_snap(
        &mut self,
        ctx: &mut ManipulationContext,
        grabber: GrabberId,
        object: ObjectId,
        grab_point: usize,
        grabber_local_snap: Option<Transform>,
        propagate: bool,
    ) -> Result<(), ManipulationError> {
        self.synced(|r| {
            r.grab_internal(ctx, grabber, object, grab_point, grabber_local_snap, propagate)
        })
    }

    fn grab_internal(
        &mut self,
        ctx: &mut ManipulationContext,
        grabber: GrabberId,
        object: ObjectId,
        grab_point: usize,
        grabber_local_snap: Option<Transform>,
        propagate: bool,
    ) -> Result<(), ManipulationError> {
        let Some(state) = ctx.grabber(grabber) else {
            log::error!("grab requested by unknown grabber {grabber:?}");
            return Err(ManipulationError::UnknownGrabber(grabber));
        };
        let Some(item) = ctx.object(object) else {
            log::error!("grab requested on unknown object {object:?}");
            return Err(ManipulationError::UnknownObject(object));
        };
        let Some(point) = item.grab_point(grab_point).cloned() else {
            log::error!("{object:?} has no grab point {grab_point}");
            return Err(ManipulationError::GrabPointOutOfRange {
                object,
                index: grab_point,
                count: item.grab_points.len(),
            });
        };
        if !state.enabled {
            log::warn!("{grabber:?} is disabled, grabbing {} anyway", item.name);
        }
        if !item.enabled {
            log::warn!("{} is disabled, grabbing anyway", item.name);
        }
        if !point.is_compatible(state.side) {
            log::warn!(
                "grab point {} of {} is not meant for the {:?} hand",
                point.name,
                item.name,
                state.side
            );
        }

        let already_held_here = ctx
            .manipulation(object)
            .and_then(|m| m.grab_for(grabber))
            .is_some_and(|g| g.grab_point == grab_point);
        if already_held_here {
            return Ok(());
        }

        if let Some(previous) = state.grabbed_object() {
            let mode = ReleaseMode::Normal;
            self.release_internal(ctx, Some(grabber), previous, None, mode, propagate)?;
        }

        let (displaced, is_multi_hands) = resolve_collision(ctx, object, grab_point, &point);
        for other in displaced.iter().copied() {
            log::debug!("{other:?} hands {object:?} over to {grabber:?}");
            let mode = ReleaseMode::SwitchHands;
            self.release_internal(ctx, Some(other), object, None, mode, propagate)?;
        }

        let (grabber_pose, avatar) = match ctx.grabber(grabber) {
            Some(g) => (g.pose(), g.avatar),
            None => return Err(ManipulationError::UnknownGrabber(grabber)),
        };
        let Some(object_world) = ctx.object_world(object) else {
            return Err(ManipulationError::UnknownObject(object));
        };
        let prefab = ctx.avatar(avatar).and_then(|a| a.prefab.clone());
        let snap_world = match grabber_local_snap {
            Some(local) => grabber_pose.mul_transform(&local),
            None => required_snap(&point, &object_world, &grabber_pose, prefab.as_deref()),
        };

        let source_anchor = ctx.object(object).and_then(|o| o.current_anchor());
        let args = ManipulationEventArgs::new(ManipulationEventType::Grabbing, object)
            .grabber(grabber, grab_point)
            .hands(is_multi_hands, !displaced.is_empty())
            .snap(grabber_pose.relative(&snap_world));

        if let Some(anchor) = source_anchor {
            self.raise(propagate, args.with_type(ManipulationEventType::Removing).anchor(anchor));
        }
        self.raise(propagate, args.clone());

        if source_anchor.is_some() {
            super::placement::detach_from_anchor(ctx, object);
        }

        if !ctx.is_grabbed(object) {
            let Some(item) = ctx.object_mut(object) else {
                return Err(ManipulationError::UnknownObject(object));
            };
            item.resistance = None;
            item.return_timer = None;
            item.set_kinematic(true);
            let pivot = item.config.rotation_pivot;
            if parents_to_avatar(item) {
                item.parent_before_grab = Some(item.parent);
                ctx.reparent_object(object, ParentLink::Avatar(avatar));
            }
            ctx.manipulations
                .insert(object, RuntimeManipulationInfo::new(object, source_anchor, pivot));
        }

        let direction = point.snap_direction;
        let mut info = build_grab_info(ctx, grabber, object, grab_point, &snap_world, direction)
            .ok_or(ManipulationError::UnknownObject(object))?;
        init_single_axis(ctx, object, &mut info, &grabber_pose);

        if let Some(manipulation) = ctx.manipulations.get_mut(&object) {
            manipulation.add_grab(info);
        }
        if let Some(g) = ctx.grabber_mut(grabber) {
            g.grabbed_object = Some(object);
        }

        if let Some(anchor) = source_anchor {
            self.raise(propagate, args.with_type(ManipulationEventType::Removed).anchor(anchor));
        }
        self.raise(propagate, args.with_type(ManipulationEventType::Grabbed));

        log::debug!(
            "{grabber:?} grabbed {object:?} at point {grab_point} ({} grabs)",
            ctx.grab_count(object)
        );
        Ok(())
    }
}

fn grab_mode_of(
    ctx: &ManipulationContext,
    grabber: GrabberId,
    object: ObjectId,
) -> Option<GrabMode> {
    let point = ctx.manipulation(object)?.grab_for(grabber)?.grab_point;
    ctx.object(object)?.grab_point(point).map(|p| p.grab_mode)
}

/// Grabbers that must let go for a new grab at `grab_point`, and whether the
/// object stays held by several hands afterwards.
fn resolve_collision(
    ctx: &ManipulationContext,
    object: ObjectId,
    grab_point: usize,
    point: &GrabPoint,
) -> (Vec<GrabberId>, bool) {
    let Some(manipulation) = ctx.manipulation(object) else {
        return (Vec::new(), false);
    };
    let multi = ctx.object(object).is_some_and(|o| o.config.allow_multi_grab);
    let at_point = manipulation.grabbers_at_point(grab_point);

    let displaced: Vec<GrabberId> = if !multi {
        manipulation.grabbers().collect()
    } else if !at_point.is_empty() && !point.allows_shared_grab() {
        at_point
    } else {
        Vec::new()
    };

    let remaining = manipulation.grab_count() - displaced.len();
    (displaced, remaining > 0)
}

/// Objects reparented under the avatar while held. Constrained objects keep
/// their parent since their limits are expressed in it.
fn parents_to_avatar(object: &GrabbableObject) -> bool {
    object.config.use_parenting
        && !object.depends_on_grabbable_parent()
        && object.config.translation_constraint == TranslationConstraint::Free
        && object.config.rotation_constraint == RotationConstraint::Free
}

/// World pose the grabber aligns to, with the components the snap mode
/// leaves alone taken from the grabber.
fn required_snap(
    point: &GrabPoint,
    object_world: &Transform,
    grabber_pose: &Transform,
    avatar_prefab: Option<&str>,
) -> Transform {
    let target = point.world_snap(object_world, grabber_pose.position, avatar_prefab);
    Transform::from_position_rotation(
        if point.snap_mode.snaps_position() {
            target.position
        } else {
            grabber_pose.position
        },
        if point.snap_mode.snaps_rotation() {
            target.rotation
        } else {
            grabber_pose.rotation
        },
    )
}

fn build_grab_info(
    ctx: &ManipulationContext,
    grabber: GrabberId,
    object: ObjectId,
    grab_point: usize,
    snap_world: &Transform,
    direction: SnapDirection,
) -> Option<RuntimeGrabInfo> {
    let grabber_pose = ctx.grabber(grabber)?.pose();
    let object_world = ctx.object_world(object)?;
    let object_pose = object_world.unscaled();

    let mut info = RuntimeGrabInfo::new(grabber, grab_point);
    info.grabber_local_snap = grabber_pose.relative(snap_world);

    let held_world = match direction {
        SnapDirection::ObjectToHand => {
            info.relative_grab = snap_world.relative(&object_pose);
            let held = grabber_pose.mul_transform(&info.relative_grab);
            let held_world = Transform::new(held.position, held.rotation, object_world.scale);
            info.relative_grabber = held_world.relative(&grabber_pose);
            held_world
        }
        SnapDirection::HandToObject => {
            info.relative_grab = grabber_pose.relative(&object_pose);
            info.relative_grabber = object_world.relative(snap_world);
            object_world
        }
    };

    info.leverage_source_local = info.relative_grabber.position;
    let leverage_source = held_world.transform_point(info.leverage_source_local);
    info.grabber_local_leverage_source = grabber_pose.inverse_transform_point(leverage_source);
    Some(info)
}

/// Seeds the single-axis accumulator of a new grab so the first solve reads
/// no rotation.
fn init_single_axis(
    ctx: &ManipulationContext,
    object: ObjectId,
    info: &mut RuntimeGrabInfo,
    grabber_pose: &Transform,
) {
    let Some(item) = ctx.object(object) else {
        return;
    };
    let Some(axis) = item.config.single_rotation_axis() else {
        return;
    };
    let parent = ctx.parent_world(item.parent());
    let initial = item.initial_local_transform();

    match item.config.rotation_provider {
        RotationProvider::HandOrientation => {
            info.last_accumulated_angle =
                solve::hand_twist_angle(&parent, &initial, axis, info, grabber_pose);
        }
        RotationProvider::HandPositionAroundPivot => {
            let world = parent.mul_transform(&item.local_transform());
            let pivot = world.transform_point(item.config.rotation_pivot);
            let axis_parent = initial.rotation * axis.unit();
            let lever = parent
                .inverse_transform_direction(info.current_leverage_point(grabber_pose) - pivot);
            info.initial_leverage_direction = project_on_plane(lever, axis_parent);
            info.last_accumulated_angle = 0.0;
        }
    }
}
