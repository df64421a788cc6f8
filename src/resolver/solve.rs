use super::constraints::constrain_position;
use super::look_at::{follow_without_rotation, look_at_average};
use super::ManipulationResolver;
use crate::dynamics::SecondOrderDynamics;
use crate::math::{
    average_quaternions, grab_weight, rotation_between, signed_angle_around, twist_angle,
    unwrap_angle_delta, Axis, Transform,
};
use crate::runtime::RuntimeGrabInfo;
use crate::scene::{ManipulationContext, ObjectId, ResistanceState, RotationProvider};
use glam::{Quat, Vec3};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet};

/// Summary of one [`ManipulationResolver::update_manipulation`] tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolveReport {
    pub objects_solved: usize,
    /// Grabbable parents turned by their children.
    pub parents_solved: usize,
    /// Grips released because the hand drifted too far from them.
    pub grips_released: usize,
    /// Objects that went back to the anchor they were taken from.
    pub anchors_returned: usize,
}

/// Twist around `axis` of the object rotation a grab asks for, relative to
/// the initial local rotation.
pub(super) fn hand_twist_angle(
    parent: &Transform,
    initial: &Transform,
    axis: Axis,
    info: &RuntimeGrabInfo,
    grabber_pose: &Transform,
) -> f32 {
    let wanted = parent.inverse_transform_rotation(info.target_object_pose(grabber_pose).rotation);
    twist_angle(initial.rotation.inverse() * wanted, axis.unit())
}

/// Angle of the lever arm around the pivot since the grab started, measured
/// in parent space.
fn pivot_lever_angle(
    parent: &Transform,
    pivot_world: Vec3,
    axis_parent: Vec3,
    info: &RuntimeGrabInfo,
    grabber_pose: &Transform,
) -> f32 {
    let lever =
        parent.inverse_transform_direction(info.current_leverage_point(grabber_pose) - pivot_world);
    signed_angle_around(info.initial_leverage_direction, lever, axis_parent)
}

/// Rotates a local transform by `rotation`, expressed in its own frame,
/// keeping the local `pivot` in place.
fn rotate_local_around(local: &mut Transform, pivot: Vec3, rotation: Quat) {
    let pivot_parent = local.transform_point(pivot);
    local.rotation = (local.rotation * rotation).normalize();
    local.position = pivot_parent - local.rotation * (pivot * local.scale);
}

fn grab_poses(ctx: &ManipulationContext, grabs: &[RuntimeGrabInfo]) -> Vec<Transform> {
    grabs
        .iter()
        .map(|g| ctx.grabber(g.grabber).map_or(Transform::IDENTITY, |s| s.pose()))
        .collect()
}

/// The grabbable parent an object turns, if any.
fn driven_parent(ctx: &ManipulationContext, id: ObjectId) -> Option<ObjectId> {
    let item = ctx.object(id)?;
    if !item.controls_parent_direction() {
        return None;
    }
    item.grabbable_parent().filter(|p| ctx.object(*p).is_some())
}

impl ManipulationResolver {
    /// Advances every manipulation by one tick.
    ///
    /// Samples the grabbers, solves held objects parents first, then runs
    /// smooth placements, grip display, far-grip release, anchor range
    /// tracking and return timers.
    pub fn update_manipulation(&mut self, ctx: &mut ManipulationContext, dt: f32) -> SolveReport {
        let window = self.settings.physics_sample_window;
        for (_, grabber) in ctx.grabbers_mut() {
            grabber.sample(dt, window);
        }

        let mut report = SolveReport::default();
        self.solve_manipulations(ctx, dt, &mut report);
        self.update_placement_transitions(ctx, dt);
        self.keep_grips_in_place(ctx);
        report.grips_released = self.release_far_grips(ctx);
        self.update_anchor_candidates(ctx);
        report.anchors_returned = self.update_return_timers(ctx, dt);

        log::trace!("manipulation tick: {report:?}");
        report
    }

    fn solve_manipulations(
        &mut self,
        ctx: &mut ManipulationContext,
        dt: f32,
        report: &mut SolveReport,
    ) {
        let mut order: Vec<ObjectId> = ctx
            .manipulations
            .keys()
            .copied()
            .filter(|&id| ctx.object(id).is_some_and(|o| o.current_anchor().is_none()))
            .collect();
        order.sort_by_key(|&id| (Reverse(ctx.grabbable_descendant_count(id)), id));

        let mut expected: BTreeMap<ObjectId, usize> = BTreeMap::new();
        for &id in &order {
            snapshot(ctx, id);
            if let Some(parent) = driven_parent(ctx, id) {
                *expected.entry(parent).or_default() += 1;
                if !ctx.is_grabbed(parent) {
                    snapshot(ctx, parent);
                }
            }
        }

        let mut waiting: BTreeMap<ObjectId, Vec<ObjectId>> = BTreeMap::new();
        let mut deferred: BTreeSet<ObjectId> = BTreeSet::new();

        for &id in &order {
            if let Some(parent) = driven_parent(ctx, id) {
                self.record_parent_leverage(ctx, id, parent);
                let children = waiting.entry(parent).or_default();
                children.push(id);
                if children.len() >= expected.get(&parent).copied().unwrap_or(0) {
                    let children = waiting.remove(&parent).unwrap_or_default();
                    deferred.remove(&parent);
                    self.complete_parent(ctx, parent, &children, dt, report);
                }
                continue;
            }

            let Some((world, resolved)) = self.solve_object(ctx, id) else {
                continue;
            };
            report.objects_solved += 1;

            if expected.contains_key(&id) {
                // Children turn this object later in the tick.
                ctx.set_object_world_pose(id, &world);
                deferred.insert(id);
            } else {
                self.finalize(ctx, id, &world, resolved, dt);
            }
        }

        for (parent, children) in std::mem::take(&mut waiting) {
            deferred.remove(&parent);
            self.complete_parent(ctx, parent, &children, dt, report);
        }
        for id in deferred {
            self.finalize_local(ctx, id, false, dt);
        }
    }

    fn complete_parent(
        &mut self,
        ctx: &mut ManipulationContext,
        parent: ObjectId,
        children: &[ObjectId],
        dt: f32,
        report: &mut SolveReport,
    ) {
        let resolved = self.solve_parent(ctx, parent, children);
        self.finalize_local(ctx, parent, resolved, dt);
        report.parents_solved += 1;

        // Children are solved in the frame of the parent they just moved.
        for &child in children {
            if let Some((world, resolved)) = self.solve_object(ctx, child) {
                self.finalize(ctx, child, &world, resolved, dt);
                report.objects_solved += 1;
            }
        }
    }

    /// Pose a held object asks for, and whether its single-axis angle was
    /// accumulated directly.
    fn solve_object(
        &mut self,
        ctx: &mut ManipulationContext,
        id: ObjectId,
    ) -> Option<(Transform, bool)> {
        let provider = ctx.object(id)?.config.rotation_provider;
        match provider {
            RotationProvider::HandOrientation => self.solve_hand_orientation(ctx, id),
            RotationProvider::HandPositionAroundPivot => {
                let positioned = solve_pivot_position(ctx, id)?;
                Some(self.solve_pivot_rotation(ctx, id, positioned))
            }
        }
    }

    fn solve_hand_orientation(
        &mut self,
        ctx: &mut ManipulationContext,
        id: ObjectId,
    ) -> Option<(Transform, bool)> {
        let item = ctx.object(id)?;
        let manipulation = ctx.manipulation(id)?;
        let before = ctx.object_world(id)?;
        let grabs = manipulation.grabs();
        let poses = grab_poses(ctx, grabs);

        let locked = item.config.needs_two_hands_to_rotate && grabs.len() < 2;
        let mut solved = if locked {
            follow_without_rotation(&before, grabs.first()?, poses.first()?)
        } else {
            look_at_average(grabs, &poses, before.scale, self.settings.center_between_grabs)?
        };
        solved.scale = before.scale;

        let single_axis = if locked { None } else { item.config.single_rotation_axis() };
        let Some(axis) = single_axis else {
            return Some((solved, false));
        };

        let parent = ctx.parent_world(item.parent());
        let initial = item.initial_local_transform();
        let angles: Vec<f32> = grabs
            .iter()
            .zip(&poses)
            .map(|(g, p)| hand_twist_angle(&parent, &initial, axis, g, p))
            .collect();

        let angle = accumulate_single_axis(ctx, id, axis, &angles);
        let local = initial.rotation * Quat::from_axis_angle(axis.unit(), angle.to_radians());
        solved.rotation = parent.transform_rotation(local);
        Some((solved, true))
    }

    /// Turns an object around its pivot toward the grabbers. `solved` holds
    /// the already translated pose.
    fn solve_pivot_rotation(
        &mut self,
        ctx: &mut ManipulationContext,
        id: ObjectId,
        solved: Transform,
    ) -> (Transform, bool) {
        let Some(item) = ctx.object(id) else {
            return (solved, false);
        };
        let Some(manipulation) = ctx.manipulation(id) else {
            return (solved, false);
        };
        let grabs = manipulation.grabs();
        if grabs.is_empty() || (item.config.needs_two_hands_to_rotate && grabs.len() < 2) {
            return (solved, false);
        }

        let poses = grab_poses(ctx, grabs);
        let pivot_local = manipulation.local_rotation_pivot;
        let pivot_world = solved.transform_point(pivot_local);

        let (rotation, resolved) = match item.config.single_rotation_axis() {
            Some(axis) => {
                let parent = ctx.parent_world(item.parent());
                let initial = item.initial_local_transform();
                let axis_parent = initial.rotation * axis.unit();
                let angles: Vec<f32> = grabs
                    .iter()
                    .zip(&poses)
                    .map(|(g, p)| pivot_lever_angle(&parent, pivot_world, axis_parent, g, p))
                    .collect();

                let angle = accumulate_single_axis(ctx, id, axis, &angles);
                let turn = Quat::from_axis_angle(axis.unit(), angle.to_radians());
                (parent.transform_rotation(initial.rotation * turn), true)
            }
            None => {
                let arcs: Vec<Quat> = grabs
                    .iter()
                    .zip(&poses)
                    .map(|(g, p)| {
                        rotation_between(
                            solved.transform_point(g.leverage_source_local) - pivot_world,
                            g.current_leverage_point(p) - pivot_world,
                        )
                    })
                    .collect();
                ((average_quaternions(&arcs) * solved.rotation).normalize(), false)
            }
        };

        let mut out = solved;
        out.rotation = rotation;
        out.position = pivot_world - rotation * (pivot_local * solved.scale);
        (out, resolved)
    }

    /// Stores where each grab of a parent-driving child was and should be,
    /// in the parent's local space.
    fn record_parent_leverage(
        &self,
        ctx: &mut ManipulationContext,
        child: ObjectId,
        parent: ObjectId,
    ) {
        let Some(parent_world) = ctx.object_world(parent) else {
            return;
        };
        let Some(before) = ctx.object(child).map(|o| o.local_before_update) else {
            return;
        };
        let poses = match ctx.manipulation(child) {
            Some(m) => grab_poses(ctx, m.grabs()),
            None => return,
        };
        let Some(manipulation) = ctx.manipulations.get_mut(&child) else {
            return;
        };

        for (grab, pose) in manipulation.grabs_mut().iter_mut().zip(&poses) {
            grab.parent_local_grab_position_before_update =
                before.transform_point(grab.leverage_source_local);
            grab.parent_local_grab_position_after_update =
                parent_world.inverse_transform_point(grab.current_leverage_point(pose));
        }
    }

    /// Turns a grabbable parent from the grab motion of its children.
    /// Returns whether the single-axis angle was accumulated directly.
    fn solve_parent(
        &mut self,
        ctx: &mut ManipulationContext,
        parent: ObjectId,
        children: &[ObjectId],
    ) -> bool {
        let contributions: Vec<(Vec3, Vec3)> = children
            .iter()
            .filter_map(|c| ctx.manipulation(*c))
            .flat_map(|m| m.grabs().iter())
            .map(|g| {
                (
                    g.parent_local_grab_position_before_update,
                    g.parent_local_grab_position_after_update,
                )
            })
            .collect();
        if contributions.is_empty() {
            return false;
        }

        let Some(item) = ctx.object(parent) else {
            return false;
        };
        let pivot = item.config.rotation_pivot;
        let provider = item.config.rotation_provider;
        let single_axis = item.config.single_rotation_axis();
        let mut local = item.local_transform();

        let resolved = match (provider, single_axis) {
            (RotationProvider::HandPositionAroundPivot, Some(axis)) => {
                let delta = contributions
                    .iter()
                    .map(|(b, a)| signed_angle_around(*b - pivot, *a - pivot, axis.unit()))
                    .sum::<f32>()
                    / contributions.len() as f32;

                let Some(item) = ctx.object_mut(parent) else {
                    return false;
                };
                let (min, max) = item.config.rotation_limits(axis);
                let angle = (item.single_rotation_angle + delta).clamp(min, max);
                item.single_rotation_angle = angle;

                let target = item.initial_local.rotation
                    * Quat::from_axis_angle(axis.unit(), angle.to_radians());
                let turn = (local.rotation.inverse() * target).normalize();
                rotate_local_around(&mut local, pivot, turn);
                true
            }
            (RotationProvider::HandPositionAroundPivot, None) => {
                let arcs: Vec<Quat> = contributions
                    .iter()
                    .map(|(b, a)| rotation_between(*b - pivot, *a - pivot))
                    .collect();
                rotate_local_around(&mut local, pivot, average_quaternions(&arcs));
                false
            }
            (RotationProvider::HandOrientation, _) if ctx.is_grabbed(parent) => {
                let centroid = own_grab_centroid(ctx, parent).unwrap_or(pivot);
                let count = contributions.len() as f32;
                let old = contributions.iter().map(|(b, _)| *b).sum::<Vec3>() / count;
                let new = contributions.iter().map(|(_, a)| *a).sum::<Vec3>() / count;
                let turn = rotation_between(old - centroid, new - centroid);
                rotate_local_around(&mut local, centroid, turn);
                false
            }
            (RotationProvider::HandOrientation, _) => {
                let mut accumulated = Quat::IDENTITY;
                for (i, (b, a)) in contributions.iter().enumerate() {
                    let current = accumulated * (*b - pivot);
                    let arc = rotation_between(current, *a - pivot);
                    let weighted = Quat::IDENTITY.slerp(arc, grab_weight(i));
                    accumulated = (weighted * accumulated).normalize();
                }
                rotate_local_around(&mut local, pivot, accumulated);
                false
            }
        };

        if let Some(item) = ctx.object_mut(parent) {
            item.local = local;
        }
        resolved
    }

    fn finalize(
        &self,
        ctx: &mut ManipulationContext,
        id: ObjectId,
        world: &Transform,
        angle_resolved: bool,
        dt: f32,
    ) {
        ctx.set_object_world_pose(id, world);
        self.finalize_local(ctx, id, angle_resolved, dt);
    }

    /// Constrains the local transform and applies resistance.
    fn finalize_local(
        &self,
        ctx: &mut ManipulationContext,
        id: ObjectId,
        angle_resolved: bool,
        dt: f32,
    ) {
        self.constrain_object(ctx, id, angle_resolved);
        self.apply_resistance(ctx, id, dt);
    }

    /// Drags the displayed transform behind the constrained one. The
    /// single-axis angle itself is never smoothed.
    fn apply_resistance(&self, ctx: &mut ManipulationContext, id: ObjectId, dt: f32) {
        let frequency = self.settings.resistance_frequency;
        let Some(item) = ctx.object_mut(id) else {
            return;
        };
        let translation = item.config.translation_resistance.clamp(0.0, 1.0);
        let rotation = item.config.rotation_resistance.clamp(0.0, 1.0);
        if translation <= 0.0 && rotation <= 0.0 {
            return;
        }

        let before = item.local_before_update;
        let angle_before = item.angle_before_update;
        let translation_frequency = frequency * (1.0 - translation);
        let rotation_frequency = frequency * (1.0 - rotation);
        let state = item.resistance.get_or_insert_with(|| ResistanceState {
            position: SecondOrderDynamics::critically_damped(
                translation_frequency,
                before.position,
            ),
            rotation: SecondOrderDynamics::critically_damped(rotation_frequency, before.rotation),
            angle: SecondOrderDynamics::critically_damped(rotation_frequency, angle_before),
        });

        if translation > 0.0 {
            item.local.position = state.position.update(item.local.position, dt);
        }
        if rotation > 0.0 {
            match item.config.single_rotation_axis() {
                Some(axis) => {
                    let (min, max) = item.config.rotation_limits(axis);
                    let shown = state.angle.update(item.single_rotation_angle, dt).clamp(min, max);
                    let turn = Quat::from_axis_angle(axis.unit(), shown.to_radians());
                    item.local.rotation = item.initial_local.rotation * turn;
                }
                None => {
                    item.local.rotation = state.rotation.update_rotation(item.local.rotation, dt);
                }
            }
        }
    }
}

/// Records the pre-tick state. Single-axis objects go back to the rotation
/// of their cumulative angle so resistance lag never feeds into the solve.
fn snapshot(ctx: &mut ManipulationContext, id: ObjectId) {
    let Some(item) = ctx.object_mut(id) else {
        return;
    };
    if let Some(axis) = item.config.single_rotation_axis() {
        item.local.rotation = (item.initial_local.rotation
            * Quat::from_axis_angle(axis.unit(), item.single_rotation_angle.to_radians()))
        .normalize();
    }
    item.local_before_update = item.local;
    item.angle_before_update = item.single_rotation_angle;
}

/// Translation that brings the average grab point onto the average grabber,
/// already constrained so the pivot the rotation turns around is final.
fn solve_pivot_position(ctx: &ManipulationContext, id: ObjectId) -> Option<Transform> {
    let item = ctx.object(id)?;
    let manipulation = ctx.manipulation(id)?;
    let before = ctx.object_world(id)?;
    let grabs = manipulation.grabs();
    if grabs.is_empty() {
        return Some(before);
    }
    let poses = grab_poses(ctx, grabs);

    let delta = grabs
        .iter()
        .zip(&poses)
        .map(|(g, p)| g.current_leverage_point(p) - before.transform_point(g.leverage_source_local))
        .sum::<Vec3>()
        / grabs.len() as f32;

    let parent = ctx.parent_world(item.parent());
    let local = parent.inverse_transform_point(before.position + delta);
    let initial = item.initial_local_transform();
    let constrained = constrain_position(&item.config, &initial, parent.scale, local);

    let mut solved = before;
    solved.position = parent.transform_point(constrained);
    Some(solved)
}

/// Centroid of the object's own grabbers in its local space.
fn own_grab_centroid(ctx: &ManipulationContext, id: ObjectId) -> Option<Vec3> {
    let grabs = ctx.manipulation(id)?.grabs();
    if grabs.is_empty() {
        return None;
    }
    let world = ctx.object_world(id)?;
    let sum = grab_poses(ctx, grabs)
        .iter()
        .map(|p| world.inverse_transform_point(p.position))
        .sum::<Vec3>();
    Some(sum / grabs.len() as f32)
}

/// Folds per-grab angle readings into the object's cumulative angle.
///
/// Each grab contributes its unwrapped change since the previous reading;
/// the object moves by the average and what the limits clamp away is taken
/// back from every grab.
fn accumulate_single_axis(
    ctx: &mut ManipulationContext,
    id: ObjectId,
    axis: Axis,
    angles: &[f32],
) -> f32 {
    let Some(item) = ctx.object(id) else {
        return 0.0;
    };
    let (min, max) = item.config.rotation_limits(axis);
    let current = item.single_rotation_angle;

    let Some(manipulation) = ctx.manipulations.get_mut(&id) else {
        return current;
    };
    let count = angles.len().min(manipulation.grab_count());
    if count == 0 {
        return current;
    }

    let mut sum = 0.0;
    for (grab, &angle) in manipulation.grabs_mut().iter_mut().zip(angles) {
        let delta = unwrap_angle_delta(angle - grab.last_accumulated_angle);
        grab.last_accumulated_angle = angle;
        grab.single_rotation_angle_contribution += delta;
        sum += delta;
    }

    let raw = current + sum / count as f32;
    let clamped = raw.clamp(min, max);
    manipulation.subtract_single_axis_excess(raw - clamped);

    if let Some(item) = ctx.object_mut(id) {
        item.single_rotation_angle = clamped;
    }
    clamped
}
