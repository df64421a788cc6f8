use super::ManipulationResolver;
use crate::events::{ManipulationEventArgs, ManipulationEventType, PlacementOptions};
use crate::scene::{AnchorId, ManipulationContext, ObjectId};
use std::collections::BTreeMap;

impl ManipulationResolver {
    /// Recomputes which held object each anchor would receive and reports
    /// changes as range events.
    pub(crate) fn update_anchor_candidates(&mut self, ctx: &mut ManipulationContext) {
        let mut nearest: BTreeMap<AnchorId, (ObjectId, f32)> = BTreeMap::new();

        for &object in ctx.manipulations.keys() {
            if ctx.object(object).map_or(true, |o| o.current_anchor().is_some()) {
                continue;
            }
            let Some((anchor, distance)) = ctx.closest_compatible_anchor(object) else {
                continue;
            };
            match nearest.get(&anchor) {
                Some(&(_, best)) if best <= distance => {}
                _ => {
                    nearest.insert(anchor, (object, distance));
                }
            }
        }

        let next: BTreeMap<AnchorId, ObjectId> =
            nearest.into_iter().map(|(a, (o, _))| (a, o)).collect();
        let previous = std::mem::replace(&mut ctx.anchor_candidates, next.clone());

        if !self.settings.anchor_range_events {
            return;
        }
        self.synced(|r| {
            for (&anchor, &object) in &previous {
                if next.get(&anchor) != Some(&object) {
                    let left = ManipulationEventType::AnchorRangeLeft;
                    r.raise(true, ManipulationEventArgs::new(left, object).anchor(anchor));
                }
            }
            for (&anchor, &object) in &next {
                if previous.get(&anchor) != Some(&object) {
                    let entered = ManipulationEventType::AnchorRangeEntered;
                    r.raise(true, ManipulationEventArgs::new(entered, object).anchor(anchor));
                }
            }
        });
    }

    /// Counts down return timers and puts due objects back on their anchor.
    pub(crate) fn update_return_timers(&mut self, ctx: &mut ManipulationContext, dt: f32) -> usize {
        let mut due = Vec::new();
        for (id, item) in ctx.objects_mut() {
            let Some(timer) = item.return_timer.as_mut() else {
                continue;
            };
            timer.remaining -= dt;
            if timer.remaining <= 0.0 {
                due.push((id, timer.anchor));
                item.return_timer = None;
            }
        }

        let mut returned = 0;
        for (object, anchor) in due {
            let placed = ctx.object(object).is_some_and(|o| o.current_anchor().is_some());
            if placed || ctx.is_grabbed(object) {
                continue;
            }
            match self.place_object(ctx, object, anchor, PlacementOptions::SMOOTH, true) {
                Ok(()) => {
                    log::debug!("{object:?} returned to {anchor:?}");
                    returned += 1;
                }
                Err(err) => log::warn!("{object:?} could not return to {anchor:?}: {err}"),
            }
        }
        returned
    }
}
