use super::ManipulationResolver;
use crate::error::ManipulationError;
use crate::math::{twist_angle, PitchYawRoll, Transform};
use crate::scene::{
    GrabbableConfig, ManipulationContext, ObjectId, RotationConstraint, TranslationConstraint,
};
use glam::{Quat, Vec3};

/// Applies the rotation limits of `config` to a local rotation.
///
/// With exactly one limited axis the rotation is rebuilt from the cumulative
/// angle in `angle`: unless `angle_resolved` is set, the twist of `rotation`
/// away from the current angle is added first, then the sum is clamped. With
/// more axes the rotation relative to `initial_rotation` is split into
/// pitch, yaw and roll around the longitudinal axis and each is clamped.
pub fn clamp_rotation(
    config: &GrabbableConfig,
    initial_rotation: Quat,
    rotation: Quat,
    angle: &mut f32,
    angle_resolved: bool,
) -> Quat {
    let axes = config.rotation_range_axes();

    match axes.as_slice() {
        [] => initial_rotation,
        [axis] => {
            let (min, max) = config.rotation_limits(*axis);
            if !angle_resolved {
                let reference =
                    initial_rotation * Quat::from_axis_angle(axis.unit(), angle.to_radians());
                *angle += twist_angle(reference.inverse() * rotation, axis.unit());
            }
            *angle = angle.clamp(min, max);
            (initial_rotation * Quat::from_axis_angle(axis.unit(), angle.to_radians())).normalize()
        }
        _ => {
            let longitudinal = config.rotation_longitudinal_axis;
            let (a1, a2) = longitudinal.perpendicular_pair();
            let relative = initial_rotation.inverse() * rotation;
            let mut angles = PitchYawRoll::decompose(relative, longitudinal);

            let clamp = |value: f32, axis| {
                let (min, max) = config.rotation_limits(axis);
                value.clamp(min, max)
            };
            angles.pitch = clamp(angles.pitch, a1);
            angles.yaw = clamp(angles.yaw, a2);
            angles.roll = clamp(angles.roll, longitudinal);

            (initial_rotation * angles.compose(longitudinal)).normalize()
        }
    }
}

/// Applies the translation and rotation constraints of `config` to a local
/// transform. `parent_scale` converts local offsets to world units for
/// `RestrictLocalOffset` limits.
pub fn constrain_local(
    config: &GrabbableConfig,
    initial: &Transform,
    parent_scale: Vec3,
    local: Transform,
    angle: &mut f32,
    angle_resolved: bool,
) -> Transform {
    let mut out = local;
    out.position = constrain_position(config, initial, parent_scale, local.position);
    out.rotation = match config.rotation_constraint {
        RotationConstraint::Free => local.rotation,
        RotationConstraint::Locked => initial.rotation,
        RotationConstraint::RestrictLocalRotation => {
            clamp_rotation(config, initial.rotation, local.rotation, angle, angle_resolved)
        }
    };

    out
}

/// Applies the translation constraint of `config` to a local position.
pub(crate) fn constrain_position(
    config: &GrabbableConfig,
    initial: &Transform,
    parent_scale: Vec3,
    position: Vec3,
) -> Vec3 {
    match config.translation_constraint {
        TranslationConstraint::Free => position,
        TranslationConstraint::RestrictToBox(volume) => volume.clamp_point(position),
        TranslationConstraint::RestrictToSphere(volume) => volume.clamp_point(position),
        TranslationConstraint::RestrictLocalOffset => {
            let frame = Transform::from_position_rotation(initial.position, initial.rotation);
            let scale = parent_scale.abs().max(Vec3::splat(1e-6));
            let min = config.translation_limits_min.min(config.translation_limits_max);
            let max = config.translation_limits_min.max(config.translation_limits_max);
            let offset = (frame.inverse_transform_point(position) * scale).clamp(min, max);
            frame.transform_point(offset / scale)
        }
        TranslationConstraint::Locked => initial.position,
    }
}

impl ManipulationResolver {
    /// Re-applies an object's constraints to its current local transform.
    pub(crate) fn constrain_object(
        &self,
        ctx: &mut ManipulationContext,
        id: ObjectId,
        angle_resolved: bool,
    ) {
        let parent_scale = ctx.object_parent_world(id).map_or(Vec3::ONE, |p| p.scale);
        let Some(item) = ctx.object_mut(id) else {
            return;
        };
        let mut angle = item.single_rotation_angle;
        item.local = constrain_local(
            &item.config,
            &item.initial_local,
            parent_scale,
            item.local,
            &mut angle,
            angle_resolved,
        );
        item.single_rotation_angle = angle;
    }

    pub fn set_position_using_constraints(
        &mut self,
        ctx: &mut ManipulationContext,
        id: ObjectId,
        position: Vec3,
    ) -> Result<(), ManipulationError> {
        let world = object_world(ctx, id)?;
        self.set_world_using_constraints(ctx, id, Transform { position, ..world })
    }

    pub fn set_rotation_using_constraints(
        &mut self,
        ctx: &mut ManipulationContext,
        id: ObjectId,
        rotation: Quat,
    ) -> Result<(), ManipulationError> {
        let world = object_world(ctx, id)?;
        self.set_world_using_constraints(ctx, id, Transform { rotation, ..world })
    }

    pub fn set_position_and_rotation_using_constraints(
        &mut self,
        ctx: &mut ManipulationContext,
        id: ObjectId,
        position: Vec3,
        rotation: Quat,
    ) -> Result<(), ManipulationError> {
        let world = object_world(ctx, id)?;
        self.set_world_using_constraints(ctx, id, Transform { position, rotation, ..world })
    }

    pub fn set_local_position_using_constraints(
        &mut self,
        ctx: &mut ManipulationContext,
        id: ObjectId,
        position: Vec3,
    ) -> Result<(), ManipulationError> {
        self.set_local_using_constraints(ctx, id, |local| local.position = position)
    }

    pub fn set_local_rotation_using_constraints(
        &mut self,
        ctx: &mut ManipulationContext,
        id: ObjectId,
        rotation: Quat,
    ) -> Result<(), ManipulationError> {
        self.set_local_using_constraints(ctx, id, |local| local.rotation = rotation)
    }

    pub fn set_local_position_and_rotation_using_constraints(
        &mut self,
        ctx: &mut ManipulationContext,
        id: ObjectId,
        position: Vec3,
        rotation: Quat,
    ) -> Result<(), ManipulationError> {
        self.set_local_using_constraints(ctx, id, |local| {
            local.position = position;
            local.rotation = rotation;
        })
    }

    fn set_world_using_constraints(
        &mut self,
        ctx: &mut ManipulationContext,
        id: ObjectId,
        world: Transform,
    ) -> Result<(), ManipulationError> {
        ctx.set_object_world_pose(id, &world);
        self.constrain_object(ctx, id, false);
        Ok(())
    }

    fn set_local_using_constraints(
        &mut self,
        ctx: &mut ManipulationContext,
        id: ObjectId,
        edit: impl FnOnce(&mut Transform),
    ) -> Result<(), ManipulationError> {
        let Some(item) = ctx.object_mut(id) else {
            log::error!("constrained move requested for unknown object {id:?}");
            return Err(ManipulationError::UnknownObject(id));
        };
        edit(&mut item.local);
        self.constrain_object(ctx, id, false);
        Ok(())
    }

    /// Cumulative single-axis angle in degrees, `None` when the object
    /// rotates around more or fewer than one axis.
    pub fn get_object_single_rotation_axis_degrees(
        &self,
        ctx: &ManipulationContext,
        id: ObjectId,
    ) -> Option<f32> {
        let item = ctx.object(id)?;
        item.config.single_rotation_axis().map(|_| item.single_rotation_angle)
    }

    pub fn set_object_single_rotation_axis_degrees(
        &mut self,
        ctx: &mut ManipulationContext,
        id: ObjectId,
        degrees: f32,
    ) -> Result<(), ManipulationError> {
        let Some(item) = ctx.object_mut(id) else {
            log::error!("angle set requested for unknown object {id:?}");
            return Err(ManipulationError::UnknownObject(id));
        };
        let Some(axis) = item.config.single_rotation_axis() else {
            log::warn!("{} does not rotate around a single axis, angle ignored", item.name);
            return Ok(());
        };

        let (min, max) = item.config.rotation_limits(axis);
        let angle = degrees.clamp(min, max);
        item.single_rotation_angle = angle;
        let turn = Quat::from_axis_angle(axis.unit(), angle.to_radians());
        item.local.rotation = (item.initial_local.rotation * turn).normalize();
        if let Some(state) = item.resistance.as_mut() {
            state.angle.reset(angle);
            state.rotation.reset(item.local.rotation);
        }
        Ok(())
    }
}

fn object_world(ctx: &ManipulationContext, id: ObjectId) -> Result<Transform, ManipulationError> {
    ctx.object_world(id).ok_or_else(|| {
        log::error!("constrained move requested for unknown object {id:?}");
        ManipulationError::UnknownObject(id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{Axis, BoxVolume};

    fn knob() -> GrabbableConfig {
        GrabbableConfig {
            rotation_constraint: RotationConstraint::RestrictLocalRotation,
            rotation_angle_limits_min: Vec3::new(0.0, 0.0, -90.0),
            rotation_angle_limits_max: Vec3::new(0.0, 0.0, 90.0),
            ..GrabbableConfig::default()
        }
    }

    #[test]
    fn single_axis_accumulates_and_clamps() {
        let config = knob();
        let mut angle = 0.0;

        let wanted = Quat::from_rotation_z(60f32.to_radians());
        let q = clamp_rotation(&config, Quat::IDENTITY, wanted, &mut angle, false);
        assert!((angle - 60.0).abs() < 1e-3);
        assert!(q.angle_between(Quat::from_rotation_z(60f32.to_radians())) < 1e-4);

        // Another 60 degrees from the current angle goes past the limit.
        let wanted = Quat::from_rotation_z(120f32.to_radians());
        let q = clamp_rotation(&config, Quat::IDENTITY, wanted, &mut angle, false);
        assert_eq!(angle, 90.0);
        assert!(q.angle_between(Quat::from_rotation_z(90f32.to_radians())) < 1e-4);
    }

    #[test]
    fn off_axis_rotation_is_dropped_for_single_axis() {
        let config = knob();
        let mut angle = 0.0;
        let wanted = Quat::from_rotation_x(0.5);
        let q = clamp_rotation(&config, Quat::IDENTITY, wanted, &mut angle, false);
        assert!(angle.abs() < 1e-3);
        assert!(q.angle_between(Quat::IDENTITY) < 1e-4);
    }

    #[test]
    fn two_axes_clamp_pitch_and_yaw() {
        let config = GrabbableConfig {
            rotation_constraint: RotationConstraint::RestrictLocalRotation,
            rotation_angle_limits_min: Vec3::new(-20.0, -30.0, 0.0),
            rotation_angle_limits_max: Vec3::new(20.0, 30.0, 0.0),
            rotation_longitudinal_axis: Axis::Z,
            ..GrabbableConfig::default()
        };
        let mut angle = 0.0;
        let wanted =
            Quat::from_rotation_y(50f32.to_radians()) * Quat::from_rotation_x(10f32.to_radians());
        let q = clamp_rotation(&config, Quat::IDENTITY, wanted, &mut angle, false);

        let angles = PitchYawRoll::decompose(q, Axis::Z);
        assert!((angles.yaw - 30.0).abs() < 1e-2, "{angles:?}");
        assert!((angles.pitch - 10.0).abs() < 1e-2, "{angles:?}");
        assert!(angles.roll.abs() < 1e-2, "{angles:?}");
    }

    #[test]
    fn local_offset_limits_follow_initial_axes() {
        let config = GrabbableConfig {
            translation_constraint: TranslationConstraint::RestrictLocalOffset,
            translation_limits_min: Vec3::new(0.0, 0.0, 0.0),
            translation_limits_max: Vec3::new(0.0, 0.0, 0.3),
            ..GrabbableConfig::default()
        };
        let initial = Transform::from_position_rotation(
            Vec3::new(1.0, 0.0, 0.0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        );
        let mut angle = 0.0;

        // Initial local +Z points to world +X.
        let moved = Transform { position: Vec3::new(2.0, 0.5, 0.0), ..initial };
        let out = constrain_local(&config, &initial, Vec3::ONE, moved, &mut angle, false);
        assert!(out.position.distance(Vec3::new(1.3, 0.0, 0.0)) < 1e-5, "{:?}", out.position);
    }

    #[test]
    fn local_offset_x_limit() {
        let config = GrabbableConfig {
            translation_constraint: TranslationConstraint::RestrictLocalOffset,
            translation_limits_min: Vec3::new(-1.0, 0.0, 0.0),
            translation_limits_max: Vec3::new(1.0, 0.0, 0.0),
            ..GrabbableConfig::default()
        };
        let mut angle = 0.0;
        let moved = Transform::from_position(Vec3::new(5.0, 0.0, 0.0));
        let initial = Transform::IDENTITY;
        let out = constrain_local(&config, &initial, Vec3::ONE, moved, &mut angle, false);
        assert!((out.position.x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn box_and_lock_constraints() {
        let mut config = GrabbableConfig {
            translation_constraint: TranslationConstraint::RestrictToBox(BoxVolume::new(
                Vec3::ZERO,
                Vec3::splat(0.5),
            )),
            rotation_constraint: RotationConstraint::Locked,
            ..GrabbableConfig::default()
        };
        let initial = Transform::IDENTITY;
        let mut angle = 0.0;
        let wanted =
            Transform::from_position_rotation(Vec3::new(2.0, 0.0, 0.0), Quat::from_rotation_x(1.0));

        let out = constrain_local(&config, &initial, Vec3::ONE, wanted, &mut angle, false);
        assert!(out.position.distance(Vec3::new(0.5, 0.0, 0.0)) < 1e-5);
        assert_eq!(out.rotation, Quat::IDENTITY);

        config.translation_constraint = TranslationConstraint::Locked;
        let out = constrain_local(&config, &initial, Vec3::ONE, wanted, &mut angle, false);
        assert_eq!(out.position, Vec3::ZERO);
    }
}
