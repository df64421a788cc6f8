use super::ManipulationResolver;
use crate::error::ManipulationError;
use crate::events::{
    ManipulationEventArgs, ManipulationEventType, PlacementOptions, ReleaseVelocity,
};
use crate::math::threshold_gradient;
use crate::scene::{AnchorId, GrabberId, ManipulationContext, ObjectId, ReturnTimer};
use glam::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseMode {
    Normal,
    /// Another grabber takes over the same point right away.
    SwitchHands,
    /// The object goes onto an anchor.
    Placement,
}

/// Factor applied to one release velocity component: 1 below `start`, the
/// full `multiplier` above `end`, linear in between.
pub fn release_speed_factor(speed: f32, start: f32, end: f32, multiplier: f32) -> f32 {
    1.0 + (multiplier - 1.0) * threshold_gradient(speed, start, end)
}

impl ManipulationResolver {
    /// Releases `object` from `grabber`, or from every grabber when `None`.
    pub fn release_object(
        &mut self,
        ctx: &mut ManipulationContext,
        grabber: Option<GrabberId>,
        object: ObjectId,
        propagate: bool,
    ) -> Result<(), ManipulationError> {
        self.release_object_with_velocity(ctx, grabber, object, None, propagate)
    }

    /// Like [`Self::release_object`] with a caller-provided velocity. The
    /// override is used as is, without release multipliers.
    pub fn release_object_with_velocity(
        &mut self,
        ctx: &mut ManipulationContext,
        grabber: Option<GrabberId>,
        object: ObjectId,
        velocity: Option<ReleaseVelocity>,
        propagate: bool,
    ) -> Result<(), ManipulationError> {
        self.synced(|r| {
            r.release_internal(ctx, grabber, object, velocity, ReleaseMode::Normal, propagate)
        })
    }

    pub fn release_grabs(
        &mut self,
        ctx: &mut ManipulationContext,
        object: ObjectId,
        propagate: bool,
    ) -> Result<(), ManipulationError> {
        self.release_object(ctx, None, object, propagate)
    }

    /// Releases whatever `grabber` holds. Holding nothing is not an error.
    pub fn release_grab(
        &mut self,
        ctx: &mut ManipulationContext,
        grabber: GrabberId,
        propagate: bool,
    ) -> Result<(), ManipulationError> {
        let Some(state) = ctx.grabber(grabber) else {
            log::error!("release requested by unknown grabber {grabber:?}");
            return Err(ManipulationError::UnknownGrabber(grabber));
        };
        match state.grabbed_object() {
            Some(object) => self.release_object(ctx, Some(grabber), object, propagate),
            None => Ok(()),
        }
    }

    pub(crate) fn release_internal(
        &mut self,
        ctx: &mut ManipulationContext,
        grabber: Option<GrabberId>,
        object: ObjectId,
        velocity: Option<ReleaseVelocity>,
        mode: ReleaseMode,
        propagate: bool,
    ) -> Result<(), ManipulationError> {
        let Some(manipulation) = ctx.manipulation(object) else {
            if ctx.object(object).is_none() {
                log::error!("release requested on unknown object {object:?}");
                return Err(ManipulationError::UnknownObject(object));
            }
            log::error!("release requested on {object:?} which is not grabbed");
            return Err(ManipulationError::NotGrabbed(object));
        };

        let targets: Vec<GrabberId> = match grabber {
            Some(g) if manipulation.is_grabbed_by(g) => vec![g],
            Some(g) => {
                log::error!("{g:?} asked to release {object:?} it doesn't hold");
                return Err(ManipulationError::NotHeldBy { grabber: g, object });
            }
            None => manipulation.grabbers().collect(),
        };
        let release_all = grabber.is_none();
        let mut place_on = None;

        for (i, g) in targets.into_iter().enumerate() {
            // Releasing every grab only reports the first grabber.
            let report = propagate && !(release_all && i > 0);

            let Some((grab_point, turned)) = ctx
                .manipulation(object)
                .and_then(|m| m.grab_for(g))
                .map(|info| (info.grab_point, info.single_rotation_angle_contribution))
            else {
                continue;
            };
            let remaining = ctx.grab_count(object);
            let velocity = velocity.unwrap_or_else(|| self.release_velocity(ctx, g));

            let args = ManipulationEventArgs::new(ManipulationEventType::Releasing, object)
                .grabber(g, grab_point)
                .hands(remaining > 1, mode == ReleaseMode::SwitchHands)
                .velocity(velocity);
            self.raise(report, args.clone());

            let last = match ctx.manipulations.get_mut(&object) {
                Some(m) => {
                    m.remove_grab(g);
                    m.grab_count() == 0
                }
                None => true,
            };
            if let Some(state) = ctx.grabber_mut(g) {
                state.grabbed_object = None;
                let pose = state.pose();
                state.set_pose(pose);
            }
            if last {
                let source_anchor = ctx.manipulations.remove(&object).and_then(|m| m.source_anchor);
                place_on = self.finish_release(ctx, object, velocity, source_anchor, mode);
            }

            self.raise(report, args.with_type(ManipulationEventType::Released));
            log::debug!("{g:?} released {object:?} after turning it {turned:.1} degrees");
        }

        if let Some(anchor) = place_on {
            self.place_internal(ctx, object, anchor, PlacementOptions::SMOOTH, propagate)?;
        }
        Ok(())
    }

    /// Hands the object back to physics after its last grab is gone. Returns
    /// the anchor to place it on, if it was let go in range of one.
    fn finish_release(
        &mut self,
        ctx: &mut ManipulationContext,
        object: ObjectId,
        velocity: ReleaseVelocity,
        source_anchor: Option<AnchorId>,
        mode: ReleaseMode,
    ) -> Option<AnchorId> {
        let restore = ctx.object_mut(object).and_then(|item| {
            item.resistance = None;
            item.parent_before_grab.take()
        });
        if let Some(link) = restore {
            ctx.reparent_object(object, link);
        }

        if mode != ReleaseMode::Normal {
            return None;
        }

        let child_held = ctx.is_child_leverage_grabbed(object);
        let item = ctx.object(object)?;
        if item.current_anchor().is_some() {
            return None;
        }

        let anchor = if item.config.place_on_release {
            ctx.closest_compatible_anchor(object).map(|(anchor, _)| anchor)
        } else {
            None
        };
        let return_after = item.config.return_to_anchor_seconds;

        let item = ctx.object_mut(object)?;
        if anchor.is_some() {
            return anchor;
        }
        if !child_held {
            if let Some(body) = item.physics.as_mut() {
                body.set_kinematic(false);
                body.set_velocities(velocity.linear(), velocity.angular());
                body.wake_up();
            }
        }
        if let (Some(seconds), Some(anchor)) = (return_after, source_anchor) {
            item.return_timer = Some(ReturnTimer {
                anchor,
                remaining: seconds,
            });
        }
        None
    }

    /// Smoothed grabber velocity with the horizontal and vertical release
    /// multipliers blended in above the speed gradient.
    pub fn release_velocity(
        &self,
        ctx: &ManipulationContext,
        grabber: GrabberId,
    ) -> ReleaseVelocity {
        let Some(state) = ctx.grabber(grabber) else {
            return ReleaseVelocity::default();
        };
        let s = &self.settings;
        let v = state.smoothed_velocity();

        let horizontal = Vec3::new(v.x, 0.0, v.z);
        let horizontal_factor = release_speed_factor(
            horizontal.length(),
            s.release_speed_gradient_start,
            s.release_speed_gradient_end,
            s.horizontal_release_multiplier,
        );
        let vertical_factor = release_speed_factor(
            v.y.abs(),
            s.release_speed_gradient_start,
            s.release_speed_gradient_end,
            s.vertical_release_multiplier,
        );

        ReleaseVelocity::new(
            horizontal * horizontal_factor + Vec3::Y * (v.y * vertical_factor),
            state.smoothed_angular_velocity(),
        )
    }
}
