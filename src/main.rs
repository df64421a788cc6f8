use glam::{Quat, Vec3};
use grab_manipulation::{
    apply_frame, AnchorId, Avatar, AvatarId, GrabPoint, GrabbableAnchor, GrabbableConfig,
    GrabbableObject, Grabber, GrabberId, HandSide, ManipulationContext, ManipulationEventArgs,
    ManipulationResolver, ManipulationSettings, ObjectId, RigidBodyState, RotationConstraint,
    RotationProvider, SnapDirection, SnapMode, SyncFrame, Transform, TranslationConstraint,
};
use std::process::ExitCode;

const DT: f32 = 1.0 / 72.0;

/// Scripted session: both peers track the same hands, only the first one
/// decides grabs and releases and the second replays its sync frames.
struct App {
    ctx: ManipulationContext,
    resolver: ManipulationResolver,
    remote_ctx: ManipulationContext,
    remote: ManipulationResolver,
    avatar: AvatarId,
    right: GrabberId,
    left: GrabberId,
    cup: ObjectId,
    lever: ObjectId,
    shelf: AnchorId,
    time: f32,
}

impl App {
    fn new(settings: ManipulationSettings) -> Self {
        let mut resolver = ManipulationResolver::new(settings.clone()).with_haptics(
            |grabber: GrabberId, side: HandSide, pulse: grab_manipulation::HapticPulse| {
                log::info!("haptics {grabber:?} {side:?} amplitude {:.2}", pulse.amplitude);
            },
        );
        resolver.add_listener(|args: &ManipulationEventArgs| {
            log::info!(
                "{:?} {:?} anchor {:?} grabber {:?}",
                args.event_type,
                args.object,
                args.anchor,
                args.grabber
            );
        });

        let (ctx, avatar, right, left, cup, lever, shelf) = build_scene();
        let (remote_ctx, ..) = build_scene();

        Self {
            ctx,
            resolver,
            remote_ctx,
            remote: ManipulationResolver::new(settings),
            avatar,
            right,
            left,
            cup,
            lever,
            shelf,
            time: 0.0,
        }
    }

    fn update(&mut self) -> Result<(), grab_manipulation::ManipulationError> {
        let t = self.time;

        // Right hand: reach the cup, carry it to the shelf, let go.
        let right = if t < 1.0 {
            Vec3::new(0.0, 1.0, 0.0).lerp(Vec3::new(0.3, 1.0, 0.0), t)
        } else {
            Vec3::new(0.3, 1.0, 0.0).lerp(Vec3::new(0.3, 1.4, 0.5), ((t - 1.0) / 1.5).min(1.0))
        };
        for ctx in [&mut self.ctx, &mut self.remote_ctx] {
            ctx.set_grabber_pose(self.right, Transform::from_position(right))?;
        }

        // Left hand: pull the lever down.
        let sweep = ((t - 0.5) / 2.0).clamp(0.0, 1.0) * 60f32.to_radians();
        let left =
            Vec3::new(-0.5, 1.0, 0.0) + Quat::from_rotation_x(-sweep) * Vec3::new(0.0, 0.3, 0.0);
        for ctx in [&mut self.ctx, &mut self.remote_ctx] {
            ctx.set_grabber_pose(self.left, Transform::from_position(left))?;
        }

        if (t - 0.5).abs() < DT / 2.0 {
            self.resolver.try_grab(&mut self.ctx, self.avatar, HandSide::Left);
        }
        if (t - 1.0).abs() < DT / 2.0 {
            self.resolver.try_grab(&mut self.ctx, self.avatar, HandSide::Right);
        }
        if (t - 2.6).abs() < DT / 2.0 {
            self.resolver.try_release(&mut self.ctx, self.avatar, HandSide::Right);
            self.resolver.try_release(&mut self.ctx, self.avatar, HandSide::Left);
        }

        let report = self.resolver.update_manipulation(&mut self.ctx, DT);
        if report.grips_released > 0 {
            log::warn!("{} grips released for distance", report.grips_released);
        }

        let frames: Vec<SyncFrame> = self.resolver.drain_frames();
        for frame in &frames {
            apply_frame(&mut self.remote, &mut self.remote_ctx, frame)?;
        }
        self.remote.update_manipulation(&mut self.remote_ctx, DT);

        self.time += DT;
        Ok(())
    }

    fn summary(&self) {
        let lever_angle = self
            .resolver
            .get_object_single_rotation_axis_degrees(&self.ctx, self.lever)
            .unwrap_or_default();
        log::info!("lever at {lever_angle:.1} degrees");

        let placed = self.ctx.anchor(self.shelf).and_then(|a| a.current_placed_object());
        log::info!("shelf holds {placed:?} (cup is {:?})", self.cup);
        let remote_placed = self
            .remote_ctx
            .anchor(self.shelf)
            .and_then(|a| a.current_placed_object());
        log::info!("remote shelf holds {remote_placed:?}");
    }
}

type Scene = (
    ManipulationContext,
    AvatarId,
    GrabberId,
    GrabberId,
    ObjectId,
    ObjectId,
    AnchorId,
);

fn build_scene() -> Scene {
    let mut ctx = ManipulationContext::new();
    let avatar = ctx.add_avatar(Avatar::new("player"));
    let right = ctx.add_grabber(Grabber::new(avatar, HandSide::Right));
    let left = ctx.add_grabber(Grabber::new(avatar, HandSide::Left));

    let cup = ctx.add_object(
        GrabbableObject::builder("cup")
            .config(GrabbableConfig {
                tag: Some("cup".into()),
                ..GrabbableConfig::default()
            })
            .grab_point(GrabPoint::new("handle").max_distance(0.15))
            .position(Vec3::new(0.3, 1.0, 0.05))
            .physics(RigidBodyState::dynamic())
            .build(),
    );

    let lever = ctx.add_object(
        GrabbableObject::builder("lever")
            .config(GrabbableConfig {
                translation_constraint: TranslationConstraint::Locked,
                rotation_constraint: RotationConstraint::RestrictLocalRotation,
                rotation_angle_limits_min: Vec3::new(-45.0, 0.0, 0.0),
                rotation_angle_limits_max: Vec3::new(45.0, 0.0, 0.0),
                rotation_provider: RotationProvider::HandPositionAroundPivot,
                ..GrabbableConfig::default()
            })
            .grab_point(
                GrabPoint::new("knob")
                    .snap(SnapMode::DontSnap, SnapDirection::HandToObject)
                    .snap_pose(Transform::from_position(Vec3::new(0.0, 0.3, 0.0))),
            )
            .position(Vec3::new(-0.5, 1.0, 0.0))
            .build(),
    );

    let shelf = ctx.add_anchor(
        GrabbableAnchor::new("shelf", Transform::from_position(Vec3::new(0.3, 1.4, 0.55)))
            .with_tags(["cup"])
            .with_max_placing_distance(0.15),
    );

    (ctx, avatar, right, left, cup, lever, shelf)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = match std::env::args().nth(1) {
        Some(path) => match ManipulationSettings::load(&path) {
            Ok(settings) => settings,
            Err(err) => {
                log::error!("{err}");
                return ExitCode::FAILURE;
            }
        },
        None => ManipulationSettings::default(),
    };

    let mut app = App::new(settings);
    while app.time < 3.5 {
        if let Err(err) = app.update() {
            log::error!("replay diverged: {err}");
            return ExitCode::FAILURE;
        }
    }
    app.summary();
    ExitCode::SUCCESS
}
