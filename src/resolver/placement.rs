use super::{ManipulationResolver, ReleaseMode};
use crate::error::ManipulationError;
use crate::events::{ManipulationEventArgs, ManipulationEventType, PlacementOptions};
use crate::math::Transform;
use crate::scene::{AnchorId, ManipulationContext, ObjectId, ParentLink, PlacementTransition};
use glam::{Quat, Vec3};

impl ManipulationResolver {
    /// Puts `object` on `anchor`, releasing its grabs first unless
    /// `options.dont_release` is set. An object moving from another anchor is
    /// removed from it in the same frame.
    pub fn place_object(
        &mut self,
        ctx: &mut ManipulationContext,
        object: ObjectId,
        anchor: AnchorId,
        options: PlacementOptions,
        propagate: bool,
    ) -> Result<(), ManipulationError> {
        self.synced(|r| r.place_internal(ctx, object, anchor, options, propagate))
    }

    pub(crate) fn place_internal(
        &mut self,
        ctx: &mut ManipulationContext,
        object: ObjectId,
        anchor: AnchorId,
        options: PlacementOptions,
        propagate: bool,
    ) -> Result<(), ManipulationError> {
        if ctx.object(object).is_none() {
            log::error!("place requested for unknown object {object:?}");
            return Err(ManipulationError::UnknownObject(object));
        }
        let Some(target) = ctx.anchor(anchor) else {
            log::error!("place requested on unknown anchor {anchor:?}");
            return Err(ManipulationError::UnknownAnchor(anchor));
        };
        match target.current_placed_object() {
            Some(current) if current == object => return Ok(()),
            Some(occupant) => {
                log::warn!("{} already holds {occupant:?}, {object:?} not placed", target.name);
                return Err(ManipulationError::AnchorOccupied { anchor, occupant });
            }
            None => {}
        }
        if target.parent() == Some(object) {
            log::error!("{object:?} can't be placed on its own anchor {}", target.name);
            return Err(ManipulationError::IncompatibleAnchor { anchor, object });
        }
        if !target.enabled {
            log::warn!("placing {object:?} on disabled anchor {}", target.name);
        }

        let held_by = ctx
            .manipulation(object)
            .and_then(|m| m.grabs().first())
            .map(|g| (g.grabber, g.grab_point));
        if held_by.is_some() && !options.dont_release {
            self.release_internal(ctx, None, object, None, ReleaseMode::Placement, false)?;
        }

        let world = ctx.object_world(object).unwrap_or_default();

        if let Some(previous) = ctx.object(object).and_then(|o| o.current_anchor()) {
            let removing = ManipulationEventArgs::new(ManipulationEventType::Removing, object)
                .anchor(previous);
            self.raise(propagate, removing.clone());
            detach_from_anchor(ctx, object);
            self.raise(propagate, removing.with_type(ManipulationEventType::Removed));
        }

        let mut args = ManipulationEventArgs::new(ManipulationEventType::Placing, object)
            .anchor(anchor)
            .placement(options, world);
        if let Some((grabber, grab_point)) = held_by {
            args = args.grabber(grabber, grab_point);
        }
        self.raise(propagate, args.clone());

        if let Some(a) = ctx.anchor_mut(anchor) {
            a.current_placed_object = Some(object);
        }
        ctx.reparent_object(object, ParentLink::Anchor(anchor));
        let smooth_seconds = self.settings.smooth_placement_seconds;
        if let Some(item) = ctx.object_mut(object) {
            item.current_anchor = Some(anchor);
            item.return_timer = None;
            // The anchor owns the object now; a later release must not undo that.
            item.parent_before_grab = None;
            item.set_kinematic(true);
            if options.smooth && smooth_seconds > 0.0 {
                item.placement_transition = Some(PlacementTransition {
                    from: item.local,
                    duration: smooth_seconds,
                    elapsed: 0.0,
                });
            } else {
                item.placement_transition = None;
                item.local.position = Vec3::ZERO;
                item.local.rotation = Quat::IDENTITY;
            }
        }
        ctx.anchor_candidates.retain(|_, o| *o != object);

        self.raise(propagate, args.with_type(ManipulationEventType::Placed));
        log::debug!("{object:?} placed on {anchor:?}");
        Ok(())
    }

    /// Takes `object` off its anchor. An object that isn't placed is left
    /// alone.
    pub fn remove_object_from_anchor(
        &mut self,
        ctx: &mut ManipulationContext,
        object: ObjectId,
        propagate: bool,
    ) -> Result<(), ManipulationError> {
        let Some(item) = ctx.object(object) else {
            log::error!("remove requested for unknown object {object:?}");
            return Err(ManipulationError::UnknownObject(object));
        };
        let Some(anchor) = item.current_anchor() else {
            log::debug!("{} is not on an anchor", item.name);
            return Ok(());
        };

        self.synced(|r| {
            let args =
                ManipulationEventArgs::new(ManipulationEventType::Removing, object).anchor(anchor);
            r.raise(propagate, args.clone());

            detach_from_anchor(ctx, object);
            let keep_kinematic = ctx.is_grabbed(object) || ctx.is_child_leverage_grabbed(object);
            if !keep_kinematic {
                if let Some(body) = ctx.object_mut(object).and_then(|o| o.physics.as_mut()) {
                    body.set_kinematic(false);
                    body.wake_up();
                }
            }

            r.raise(propagate, args.with_type(ManipulationEventType::Removed));
        });
        log::debug!("{object:?} removed from {anchor:?}");
        Ok(())
    }

    /// Advances smooth placements toward the anchor origin.
    pub(crate) fn update_placement_transitions(&mut self, ctx: &mut ManipulationContext, dt: f32) {
        for (_, item) in ctx.objects_mut() {
            let Some(transition) = item.placement_transition.as_mut() else {
                continue;
            };
            transition.elapsed += dt;
            let t = if transition.duration > 0.0 {
                (transition.elapsed / transition.duration).min(1.0)
            } else {
                1.0
            };
            let eased = t * t * (3.0 - 2.0 * t);
            let target = Transform::new(Vec3::ZERO, Quat::IDENTITY, transition.from.scale);
            item.local = transition.from.lerp(&target, eased);
            if t >= 1.0 {
                item.placement_transition = None;
            }
        }
    }
}

/// Clears both sides of the anchor link and moves the object back to world
/// space, keeping its world pose.
pub(crate) fn detach_from_anchor(
    ctx: &mut ManipulationContext,
    object: ObjectId,
) -> Option<AnchorId> {
    let item = ctx.object_mut(object)?;
    let anchor = item.current_anchor.take()?;
    item.placement_transition = None;
    if let Some(a) = ctx.anchor_mut(anchor) {
        if a.current_placed_object == Some(object) {
            a.current_placed_object = None;
        }
    }
    ctx.reparent_object(object, ParentLink::World);
    Some(anchor)
}
