use super::ManipulationResolver;
use crate::math::Transform;
use crate::scene::{GrabberId, HandSide, ManipulationContext, ObjectId};

impl ManipulationResolver {
    /// Moves the hand bone of every grabbing hand onto its grip on the
    /// object, wherever the tracked hand is.
    pub fn keep_grips_in_place(&self, ctx: &mut ManipulationContext) {
        let mut grips: Vec<(GrabberId, Transform)> = Vec::new();
        for manipulation in ctx.manipulations() {
            let Some(world) = ctx.object_world(manipulation.grabbed_object) else {
                continue;
            };
            for grab in manipulation.grabs() {
                grips.push((grab.grabber, grab.hand_pose_on(&world)));
            }
        }

        for (grabber, hand) in grips {
            if let Some(state) = ctx.grabber_mut(grabber) {
                state.hand_bone = hand.mul_transform(&state.hand_bone_offset);
            }
        }
    }

    /// Releases grips whose tracked hand drifted further than the release
    /// distance from where the hand is shown, with a haptic pulse.
    pub(crate) fn release_far_grips(&mut self, ctx: &mut ManipulationContext) -> usize {
        let default_distance = self.settings.auto_release_distance;
        let mut far: Vec<(GrabberId, HandSide, ObjectId, f32)> = Vec::new();

        for manipulation in ctx.manipulations() {
            let object = manipulation.grabbed_object;
            let limit = ctx
                .object(object)
                .map(|o| o.config.release_distance.unwrap_or(default_distance));
            let Some(limit) = limit else {
                continue;
            };
            if limit <= 0.0 {
                continue;
            }
            let Some(world) = ctx.object_world(object) else {
                continue;
            };
            for grab in manipulation.grabs() {
                let Some(state) = ctx.grabber(grab.grabber) else {
                    continue;
                };
                let distance = grab.hand_pose_on(&world).position.distance(state.position());
                if distance > limit {
                    far.push((grab.grabber, state.side, object, distance));
                }
            }
        }

        let pulse = self.settings.far_release_haptics;
        let mut released = 0;
        for (grabber, side, object, distance) in far {
            log::debug!("{grabber:?} drifted {distance:.3} from its grip on {object:?}, releasing");
            match self.release_object(ctx, Some(grabber), object, true) {
                Ok(()) => {
                    self.haptics.send_pulse(grabber, side, pulse);
                    released += 1;
                }
                Err(err) => log::warn!("far grip release failed: {err}"),
            }
        }
        released
    }
}
