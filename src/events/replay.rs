use super::args::{ManipulationEventArgs, ManipulationEventType};
use super::dispatcher::SyncFrame;
use crate::error::ManipulationError;
use crate::resolver::{ManipulationResolver, ReleaseMode};
use crate::scene::ManipulationContext;

/// Applies a received event to the local state without raising events.
///
/// Only post-mutation events change state; pre-mutation and anchor range
/// events are informational. Grabs reuse the carried grabber-local snap and
/// releases the carried velocity, so the result does not depend on local
/// tracking.
pub fn apply_event(
    resolver: &mut ManipulationResolver,
    ctx: &mut ManipulationContext,
    args: &ManipulationEventArgs,
) -> Result<(), ManipulationError> {
    let object = args.object;

    match args.event_type {
        ManipulationEventType::Grabbed => {
            let (Some(grabber), Some(grab_point)) = (args.grabber, args.grab_point) else {
                log::warn!("grab event for {object:?} without grabber, ignored");
                return Ok(());
            };
            let snap = args.grabber_local_snap.map(|p| p.to_transform());
            resolver.grab_object_with_snap(ctx, grabber, object, grab_point, snap, false)
        }
        ManipulationEventType::Released => {
            let Some(grabber) = args.grabber else {
                log::warn!("release event for {object:?} without grabber, ignored");
                return Ok(());
            };
            let held = ctx.manipulation(object).is_some_and(|m| m.is_grabbed_by(grabber));
            if !held {
                log::debug!("{grabber:?} no longer holds {object:?}, release skipped");
                return Ok(());
            }
            let mode = if args.is_switch_hands {
                ReleaseMode::SwitchHands
            } else {
                ReleaseMode::Normal
            };
            let velocity = args.release_velocity;
            resolver.release_internal(ctx, Some(grabber), object, velocity, mode, false)
        }
        ManipulationEventType::Placed => {
            let Some(anchor) = args.anchor else {
                log::warn!("place event for {object:?} without anchor, ignored");
                return Ok(());
            };
            let already_placed =
                ctx.anchor(anchor).and_then(|a| a.current_placed_object) == Some(object);
            if !already_placed && !ctx.is_grabbed(object) {
                if let Some(pose) = args.object_pose {
                    let mut world = pose.to_transform();
                    world.scale = ctx.object_world(object).map_or(world.scale, |w| w.scale);
                    ctx.set_object_world_pose(object, &world);
                }
            }
            resolver.place_object(ctx, object, anchor, args.placement_options, false)
        }
        ManipulationEventType::Removed => {
            let current = ctx.object(object).and_then(|o| o.current_anchor());
            if current.is_some() && current == args.anchor {
                resolver.remove_object_from_anchor(ctx, object, false)
            } else {
                Ok(())
            }
        }
        ManipulationEventType::Grabbing
        | ManipulationEventType::Releasing
        | ManipulationEventType::Placing
        | ManipulationEventType::Removing
        | ManipulationEventType::AnchorRangeEntered
        | ManipulationEventType::AnchorRangeLeft => Ok(()),
    }
}

/// Applies every event of a frame in order, stopping at the first failure.
pub fn apply_frame(
    resolver: &mut ManipulationResolver,
    ctx: &mut ManipulationContext,
    frame: &SyncFrame,
) -> Result<(), ManipulationError> {
    frame
        .events
        .iter()
        .try_for_each(|args| apply_event(resolver, ctx, args))
}
