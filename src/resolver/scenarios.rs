//! End-to-end manipulation sessions driven through the public resolver API.

use crate::events::{apply_frame, ManipulationEventType, PlacementOptions};
use crate::math::Transform;
use crate::resolver::{ManipulationResolver, SolveReport};
use crate::scene::{
    AnchorId, Avatar, AvatarId, GrabMode, GrabPoint, GrabPointShape, GrabbableAnchor,
    GrabbableConfig, GrabbableObject, Grabber, GrabberId, HandSide, ManipulationContext, ObjectId,
    ParentLink, RigidBodyState, RotationConstraint, RotationProvider, SnapDirection, SnapMode,
    TranslationConstraint,
};
use crate::settings::{HapticPulse, ManipulationSettings};
use crate::ManipulationError;
use glam::{Quat, Vec3};
use std::cell::RefCell;
use std::rc::Rc;

const DT: f32 = 1.0 / 72.0;

struct Rig {
    ctx: ManipulationContext,
    resolver: ManipulationResolver,
    avatar: AvatarId,
    right: GrabberId,
    left: GrabberId,
}

impl Rig {
    fn new() -> Self {
        Self::with_settings(ManipulationSettings::default())
    }

    fn with_settings(settings: ManipulationSettings) -> Self {
        let mut ctx = ManipulationContext::new();
        let avatar = ctx.add_avatar(Avatar::new("player"));
        let right = ctx.add_grabber(Grabber::new(avatar, HandSide::Right));
        let left = ctx.add_grabber(Grabber::new(avatar, HandSide::Left));
        Self {
            ctx,
            resolver: ManipulationResolver::new(settings),
            avatar,
            right,
            left,
        }
    }

    fn add(&mut self, object: GrabbableObject) -> ObjectId {
        self.ctx.add_object(object)
    }

    fn move_hand(&mut self, hand: GrabberId, position: Vec3) {
        self.ctx.set_grabber_pose(hand, Transform::from_position(position)).unwrap();
    }

    fn tick(&mut self) -> SolveReport {
        self.resolver.update_manipulation(&mut self.ctx, DT)
    }

    fn world(&self, object: ObjectId) -> Vec3 {
        self.ctx.object_world(object).unwrap().position
    }

    fn kinematic(&self, object: ObjectId) -> bool {
        self.ctx.object(object).and_then(|o| o.physics()).is_some_and(|b| b.is_kinematic())
    }

    /// Drained transition events, range events left out.
    fn transitions(&mut self) -> Vec<ManipulationEventType> {
        self.resolver
            .drain_events()
            .into_iter()
            .map(|e| e.event_type)
            .filter(|t| {
                !matches!(
                    t,
                    ManipulationEventType::AnchorRangeEntered
                        | ManipulationEventType::AnchorRangeLeft
                )
            })
            .collect()
    }
}

fn cup(position: Vec3) -> GrabbableObject {
    GrabbableObject::builder("cup")
        .position(position)
        .physics(RigidBodyState::dynamic())
        .build()
}

fn shelf(position: Vec3) -> GrabbableAnchor {
    GrabbableAnchor::new("shelf", Transform::from_position(position)).with_max_placing_distance(0.1)
}

fn hand_to_object(name: &str) -> GrabPoint {
    GrabPoint::new(name).snap(SnapMode::DontSnap, SnapDirection::HandToObject)
}

fn handle_at(name: &str, offset: Vec3) -> GrabPoint {
    hand_to_object(name).snap_pose(Transform::from_position(offset))
}

#[test]
fn grabbing_from_an_anchor_reports_removal_around_the_grab() {
    use ManipulationEventType::*;

    let mut rig = Rig::new();
    let cup = rig.add(cup(Vec3::new(0.0, 1.0, 0.0)));
    let anchor = rig.ctx.add_anchor(shelf(Vec3::new(0.0, 1.5, 0.0)));

    rig.resolver.place_object(&mut rig.ctx, cup, anchor, PlacementOptions::NONE, true).unwrap();
    assert_eq!(rig.transitions(), vec![Placing, Placed]);
    assert!(rig.world(cup).distance(Vec3::new(0.0, 1.5, 0.0)) < 1e-5);
    assert!(rig.kinematic(cup));

    rig.resolver.grab_object(&mut rig.ctx, rig.right, cup, 0, true).unwrap();
    let frames = rig.resolver.drain_frames();
    assert_eq!(frames.len(), 1);
    let types: Vec<_> = frames[0].events.iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec![Removing, Grabbing, Removed, Grabbed]);
    assert_eq!(frames[0].events[0].anchor, Some(anchor));

    assert!(rig.ctx.anchor(anchor).is_some_and(|a| !a.is_occupied()));
    assert_eq!(rig.ctx.object(cup).and_then(|o| o.current_anchor()), None);
    assert!(rig.ctx.anchors_consistent());
}

#[test]
fn release_in_range_places_on_the_anchor() {
    use ManipulationEventType::*;

    let mut rig = Rig::new();
    let cup = rig.add(cup(Vec3::new(0.0, 1.0, 0.0)));
    let anchor = rig.ctx.add_anchor(shelf(Vec3::new(0.0, 1.0, 0.05)));

    rig.move_hand(rig.right, Vec3::new(0.0, 1.0, 0.0));
    rig.resolver.grab_object(&mut rig.ctx, rig.right, cup, 0, true).unwrap();
    rig.tick();
    rig.transitions();

    rig.resolver.release_object(&mut rig.ctx, Some(rig.right), cup, true).unwrap();
    assert_eq!(rig.transitions(), vec![Releasing, Released, Placing, Placed]);
    assert_eq!(rig.ctx.anchor(anchor).and_then(|a| a.current_placed_object()), Some(cup));
    assert!(rig.kinematic(cup));
    assert!(rig.ctx.object(cup).is_some_and(|o| o.is_placing_smoothly()));

    for _ in 0..30 {
        rig.tick();
    }
    assert!(rig.ctx.object(cup).is_some_and(|o| !o.is_placing_smoothly()));
    assert!(rig.world(cup).distance(Vec3::new(0.0, 1.0, 0.05)) < 1e-4);
    assert!(rig.ctx.anchors_consistent());
}

#[test]
fn thrown_object_gets_boosted_release_velocity() {
    let settings = ManipulationSettings {
        horizontal_release_multiplier: 2.0,
        anchor_range_events: false,
        ..ManipulationSettings::default()
    };
    let mut rig = Rig::with_settings(settings);
    let cup = rig.add(cup(Vec3::ZERO));

    rig.resolver.grab_object(&mut rig.ctx, rig.right, cup, 0, true).unwrap();
    // 5 m/s along x, above the end of the speed gradient.
    for i in 1..=10 {
        rig.move_hand(rig.right, Vec3::new(0.25 * i as f32, 0.0, 0.0));
        rig.resolver.update_manipulation(&mut rig.ctx, 0.05);
    }
    rig.resolver.drain_events();

    rig.resolver.release_object(&mut rig.ctx, Some(rig.right), cup, true).unwrap();

    let body = rig.ctx.object(cup).and_then(|o| o.physics()).unwrap();
    assert!(!body.is_kinematic());
    let velocity = body.linear_velocity();
    assert!(velocity.distance(Vec3::new(10.0, 0.0, 0.0)) < 1e-2, "{velocity:?}");

    let released = rig
        .resolver
        .drain_events()
        .into_iter()
        .find(|e| e.event_type == ManipulationEventType::Released)
        .unwrap();
    let velocity = released.release_velocity.unwrap();
    assert!((velocity.linear().x - 10.0).abs() < 1e-2);
}

#[test]
fn second_hand_takes_over_a_single_hand_object() {
    use ManipulationEventType::*;

    let mut rig = Rig::new();
    let cup = rig.add(
        GrabbableObject::builder("cup")
            .config(GrabbableConfig {
                allow_multi_grab: false,
                ..GrabbableConfig::default()
            })
            .physics(RigidBodyState::dynamic())
            .build(),
    );

    rig.resolver.grab_object(&mut rig.ctx, rig.right, cup, 0, true).unwrap();
    rig.transitions();
    rig.resolver.grab_object(&mut rig.ctx, rig.left, cup, 0, true).unwrap();

    let events = rig.resolver.drain_events();
    let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec![Releasing, Released, Grabbing, Grabbed]);
    assert_eq!(events[0].grabber, Some(rig.right));
    assert!(events.iter().all(|e| e.is_switch_hands));

    assert_eq!(rig.ctx.grab_count(cup), 1);
    assert!(rig.ctx.manipulation(cup).is_some_and(|m| m.is_grabbed_by(rig.left)));
    assert!(rig.ctx.grabber(rig.right).is_some_and(|g| !g.is_grabbing()));
    assert!(rig.kinematic(cup));
}

#[test]
fn axis_point_is_shared_and_plain_point_is_not() {
    let mut rig = Rig::new();
    let rail = rig.add(
        GrabbableObject::builder("rail")
            .grab_point(GrabPoint::new("bar").shape(GrabPointShape::Axis {
                direction: Vec3::X,
                length: 1.0,
            }))
            .build(),
    );
    let box_ = rig.add(GrabbableObject::builder("box").build());

    rig.resolver.grab_object(&mut rig.ctx, rig.right, rail, 0, true).unwrap();
    rig.resolver.grab_object(&mut rig.ctx, rig.left, rail, 0, true).unwrap();
    assert_eq!(rig.ctx.grab_count(rail), 2);
    let last = rig.resolver.drain_events().pop().unwrap();
    assert_eq!(last.event_type, ManipulationEventType::Grabbed);
    assert!(last.is_multi_hands);
    assert!(!last.is_switch_hands);

    rig.resolver.release_grabs(&mut rig.ctx, rail, true).unwrap();
    rig.resolver.grab_object(&mut rig.ctx, rig.right, box_, 0, true).unwrap();
    rig.resolver.grab_object(&mut rig.ctx, rig.left, box_, 0, true).unwrap();
    assert_eq!(rig.ctx.grab_count(box_), 1);
    assert!(rig.ctx.manipulation(box_).is_some_and(|m| m.is_grabbed_by(rig.left)));
}

#[test]
fn toggle_point_release_is_idempotent() {
    let mut rig = Rig::new();
    let cup = rig.add(
        GrabbableObject::builder("cup")
            .grab_point(GrabPoint::new("handle").grab_mode(GrabMode::GrabToggle))
            .position(Vec3::new(0.0, 1.0, 0.0))
            .build(),
    );
    rig.move_hand(rig.right, Vec3::new(0.0, 1.0, 0.05));

    assert!(rig.resolver.try_grab(&mut rig.ctx, rig.avatar, HandSide::Right));
    assert!(rig.ctx.is_grabbed(cup));
    assert!(rig.resolver.try_release(&mut rig.ctx, rig.avatar, HandSide::Right));
    assert!(!rig.ctx.is_grabbed(cup));
    rig.resolver.drain_events();

    assert!(!rig.resolver.try_release(&mut rig.ctx, rig.avatar, HandSide::Right));
    assert!(rig.resolver.drain_events().is_empty());

    // A second press on a held toggle point lets go.
    assert!(rig.resolver.try_grab(&mut rig.ctx, rig.avatar, HandSide::Right));
    assert!(rig.resolver.try_grab(&mut rig.ctx, rig.avatar, HandSide::Right));
    assert!(!rig.ctx.is_grabbed(cup));
}

#[test]
fn keep_always_ignores_gesture_release() {
    let mut rig = Rig::new();
    let sword = rig.add(
        GrabbableObject::builder("sword")
            .grab_point(GrabPoint::new("hilt").grab_mode(GrabMode::KeepAlways))
            .build(),
    );

    assert!(rig.resolver.try_grab(&mut rig.ctx, rig.avatar, HandSide::Left));
    assert!(!rig.resolver.try_release(&mut rig.ctx, rig.avatar, HandSide::Left));
    assert!(rig.ctx.manipulation(sword).is_some_and(|m| m.is_grabbed_by(rig.left)));

    // Still held after another press.
    assert!(!rig.resolver.try_grab(&mut rig.ctx, rig.avatar, HandSide::Left));
    assert!(rig.ctx.is_grabbed(sword));

    rig.resolver.release_grab(&mut rig.ctx, rig.left, true).unwrap();
    assert!(!rig.ctx.is_grabbed(sword));
}

#[test]
fn occupied_anchor_rejects_a_second_object() {
    use ManipulationEventType::*;

    let mut rig = Rig::new();
    let a = rig.add(cup(Vec3::ZERO));
    let b = rig.add(cup(Vec3::X));
    let first = rig.ctx.add_anchor(shelf(Vec3::Y));
    let second = rig.ctx.add_anchor(shelf(Vec3::NEG_Y));

    rig.resolver.place_object(&mut rig.ctx, a, first, PlacementOptions::SMOOTH, true).unwrap();
    rig.transitions();

    let err = rig
        .resolver
        .place_object(&mut rig.ctx, b, first, PlacementOptions::SMOOTH, true)
        .unwrap_err();
    assert_eq!(err, ManipulationError::AnchorOccupied { anchor: first, occupant: a });
    assert!(rig.transitions().is_empty());
    assert_eq!(rig.ctx.object(b).and_then(|o| o.current_anchor()), None);

    // Placing again where it already is changes nothing.
    rig.resolver.place_object(&mut rig.ctx, a, first, PlacementOptions::NONE, true).unwrap();
    assert!(rig.transitions().is_empty());

    rig.resolver.place_object(&mut rig.ctx, a, second, PlacementOptions::NONE, true).unwrap();
    assert_eq!(rig.transitions(), vec![Removing, Removed, Placing, Placed]);
    assert!(rig.ctx.anchor(first).is_some_and(|x| !x.is_occupied()));
    assert!(rig.world(a).distance(Vec3::NEG_Y) < 1e-5);
    assert!(rig.ctx.anchors_consistent());
}

#[test]
fn removing_from_an_anchor_hands_back_to_physics() {
    use ManipulationEventType::*;

    let mut rig = Rig::new();
    let cup = rig.add(cup(Vec3::ZERO));
    let anchor = rig.ctx.add_anchor(shelf(Vec3::Y));
    rig.resolver.place_object(&mut rig.ctx, cup, anchor, PlacementOptions::NONE, true).unwrap();
    rig.transitions();

    rig.resolver.remove_object_from_anchor(&mut rig.ctx, cup, true).unwrap();
    assert_eq!(rig.transitions(), vec![Removing, Removed]);
    assert!(!rig.kinematic(cup));
    assert_eq!(rig.ctx.object(cup).map(|o| o.parent()), Some(ParentLink::World));
    assert!(rig.world(cup).distance(Vec3::Y) < 1e-5);

    rig.resolver.remove_object_from_anchor(&mut rig.ctx, cup, true).unwrap();
    assert!(rig.transitions().is_empty());
    assert!(rig.ctx.anchors_consistent());
}

#[test]
fn dont_release_keeps_the_grab_while_placed() {
    let mut rig = Rig::new();
    let cup = rig.add(cup(Vec3::ZERO));
    let anchor = rig.ctx.add_anchor(shelf(Vec3::Y));

    rig.move_hand(rig.right, Vec3::Y);
    rig.resolver.grab_object(&mut rig.ctx, rig.right, cup, 0, true).unwrap();
    rig.resolver
        .place_object(&mut rig.ctx, cup, anchor, PlacementOptions::DONT_RELEASE, true)
        .unwrap();

    assert!(rig.ctx.is_grabbed(cup));
    assert_eq!(rig.ctx.object(cup).and_then(|o| o.current_anchor()), Some(anchor));

    // The solver leaves placed objects where the anchor holds them.
    rig.move_hand(rig.right, Vec3::new(0.0, 1.0, 0.1));
    rig.tick();
    assert!(rig.ctx.is_grabbed(cup));
    assert!(rig.world(cup).distance(Vec3::Y) < 1e-5);
}

#[test]
fn released_object_returns_to_its_anchor() {
    let mut rig = Rig::new();
    let cup = rig.add(
        GrabbableObject::builder("cup")
            .config(GrabbableConfig {
                place_on_release: false,
                return_to_anchor_seconds: Some(0.5),
                ..GrabbableConfig::default()
            })
            .physics(RigidBodyState::dynamic())
            .build(),
    );
    let anchor = rig.ctx.add_anchor(shelf(Vec3::new(0.0, 1.5, 0.0)));
    rig.resolver.place_object(&mut rig.ctx, cup, anchor, PlacementOptions::NONE, true).unwrap();

    rig.move_hand(rig.right, Vec3::new(0.0, 1.0, 0.0));
    rig.resolver.grab_object(&mut rig.ctx, rig.right, cup, 0, true).unwrap();
    rig.tick();
    rig.resolver.release_object(&mut rig.ctx, Some(rig.right), cup, true).unwrap();
    assert!(!rig.kinematic(cup));
    assert_eq!(rig.ctx.object(cup).and_then(|o| o.current_anchor()), None);

    let mut returned = 0;
    for _ in 0..4 {
        returned += rig.resolver.update_manipulation(&mut rig.ctx, 0.1).anchors_returned;
    }
    assert_eq!(returned, 0);
    for _ in 0..3 {
        returned += rig.resolver.update_manipulation(&mut rig.ctx, 0.1).anchors_returned;
    }
    assert_eq!(returned, 1);
    assert_eq!(rig.ctx.anchor(anchor).and_then(|a| a.current_placed_object()), Some(cup));
    assert!(rig.kinematic(cup));
    assert!(rig.ctx.anchors_consistent());
}

fn lever(rig: &mut Rig) -> ObjectId {
    rig.add(
        GrabbableObject::builder("lever")
            .config(GrabbableConfig {
                translation_constraint: TranslationConstraint::Locked,
                rotation_constraint: RotationConstraint::RestrictLocalRotation,
                rotation_angle_limits_min: Vec3::new(-45.0, 0.0, 0.0),
                rotation_angle_limits_max: Vec3::new(45.0, 0.0, 0.0),
                rotation_provider: RotationProvider::HandPositionAroundPivot,
                ..GrabbableConfig::default()
            })
            .grab_point(handle_at("knob", Vec3::new(0.0, 0.3, 0.0)))
            .build(),
    )
}

#[test]
fn lever_turns_around_its_pivot_within_limits() {
    let mut rig = Rig::new();
    let lever = lever(&mut rig);
    let knob = Vec3::new(0.0, 0.3, 0.0);
    rig.move_hand(rig.right, knob);
    rig.resolver.grab_object(&mut rig.ctx, rig.right, lever, 0, true).unwrap();

    for step in 1..=4 {
        let angle = (-5.0 * step as f32).to_radians();
        rig.move_hand(rig.right, Quat::from_rotation_x(angle) * knob);
        rig.tick();
    }
    let angle = rig.resolver.get_object_single_rotation_axis_degrees(&rig.ctx, lever).unwrap();
    assert!((angle + 20.0).abs() < 1e-2, "{angle}");

    for step in 5..=12 {
        let angle = (-5.0 * step as f32).to_radians();
        rig.move_hand(rig.right, Quat::from_rotation_x(angle) * knob);
        rig.tick();
    }
    let angle = rig.resolver.get_object_single_rotation_axis_degrees(&rig.ctx, lever).unwrap();
    assert!((angle + 45.0).abs() < 1e-2, "{angle}");

    let local = rig.ctx.object(lever).unwrap().local_transform();
    assert!(local.rotation.angle_between(Quat::from_rotation_x((-45f32).to_radians())) < 1e-3);
    assert!(local.position.length() < 1e-5);
}

#[test]
fn setting_the_single_axis_angle_clamps() {
    let mut rig = Rig::new();
    let lever = lever(&mut rig);

    rig.resolver.set_object_single_rotation_axis_degrees(&mut rig.ctx, lever, 90.0).unwrap();
    assert_eq!(rig.resolver.get_object_single_rotation_axis_degrees(&rig.ctx, lever), Some(45.0));

    let free = rig.add(GrabbableObject::builder("ball").build());
    assert_eq!(rig.resolver.get_object_single_rotation_axis_degrees(&rig.ctx, free), None);
    assert!(rig.resolver.set_object_single_rotation_axis_degrees(&mut rig.ctx, free, 10.0).is_ok());
}

#[test]
fn two_hands_aim_a_bar() {
    let settings = ManipulationSettings {
        center_between_grabs: false,
        ..ManipulationSettings::default()
    };
    let mut rig = Rig::with_settings(settings);
    let bar = rig.add(
        GrabbableObject::builder("bar")
            .grab_point(handle_at("left_end", Vec3::new(-0.5, 0.0, 0.0)))
            .grab_point(handle_at("right_end", Vec3::new(0.5, 0.0, 0.0)))
            .position(Vec3::new(0.0, 1.0, 0.0))
            .build(),
    );

    rig.move_hand(rig.left, Vec3::new(-0.5, 1.0, 0.0));
    rig.move_hand(rig.right, Vec3::new(0.5, 1.0, 0.0));
    rig.resolver.grab_object(&mut rig.ctx, rig.left, bar, 0, true).unwrap();
    rig.resolver.grab_object(&mut rig.ctx, rig.right, bar, 1, true).unwrap();

    rig.move_hand(rig.right, Vec3::new(-0.5, 1.0, -1.0));
    let report = rig.tick();
    assert_eq!(report.objects_solved, 1);
    assert_eq!(report.grips_released, 0);

    let world = rig.ctx.object_world(bar).unwrap();
    let left_end = world.transform_point(Vec3::new(-0.5, 0.0, 0.0));
    let right_end = world.transform_point(Vec3::new(0.5, 0.0, 0.0));
    assert!(left_end.distance(Vec3::new(-0.5, 1.0, 0.0)) < 1e-4, "{left_end}");
    assert!(right_end.distance(Vec3::new(-0.5, 1.0, -1.0)) < 1e-4, "{right_end}");
}

#[test]
fn handle_turns_its_door() {
    let mut rig = Rig::new();
    let door = rig.add(
        GrabbableObject::builder("door")
            .config(GrabbableConfig {
                translation_constraint: TranslationConstraint::Locked,
                rotation_constraint: RotationConstraint::RestrictLocalRotation,
                rotation_angle_limits_min: Vec3::new(0.0, -90.0, 0.0),
                rotation_angle_limits_max: Vec3::new(0.0, 90.0, 0.0),
                rotation_provider: RotationProvider::HandPositionAroundPivot,
                ..GrabbableConfig::default()
            })
            .build(),
    );
    let handle = rig.add(
        GrabbableObject::builder("handle")
            .config(GrabbableConfig {
                translation_constraint: TranslationConstraint::Locked,
                rotation_constraint: RotationConstraint::Locked,
                uses_grabbable_parent_dependency: true,
                control_parent_direction: true,
                ..GrabbableConfig::default()
            })
            .grab_point(hand_to_object("grip"))
            .grabbable_parent(door)
            .position(Vec3::X)
            .build(),
    );

    rig.move_hand(rig.right, Vec3::X);
    rig.resolver.grab_object(&mut rig.ctx, rig.right, handle, 0, true).unwrap();

    let mut parents_solved = 0;
    for step in 1..=6 {
        let angle = (5.0 * step as f32).to_radians();
        rig.move_hand(rig.right, Quat::from_rotation_y(angle) * Vec3::X);
        let report = rig.tick();
        parents_solved += report.parents_solved;
        assert_eq!(report.grips_released, 0);
    }
    assert_eq!(parents_solved, 6);

    let angle = rig.resolver.get_object_single_rotation_axis_degrees(&rig.ctx, door).unwrap();
    assert!((angle - 30.0).abs() < 1e-2, "{angle}");

    // The handle stays on the door and under the hand.
    let expected = Quat::from_rotation_y(30f32.to_radians()) * Vec3::X;
    assert!(rig.world(handle).distance(expected) < 1e-4);
    assert!(rig.ctx.object(handle).unwrap().local_transform().position.distance(Vec3::X) < 1e-5);
    assert!(!rig.ctx.is_grabbed(door));
}

#[test]
fn translation_resistance_lags_then_catches_up() {
    let settings = ManipulationSettings {
        auto_release_distance: 0.0,
        ..ManipulationSettings::default()
    };
    let mut rig = Rig::with_settings(settings);
    let crate_ = rig.add(
        GrabbableObject::builder("crate")
            .config(GrabbableConfig {
                translation_resistance: 0.5,
                ..GrabbableConfig::default()
            })
            .grab_point(hand_to_object("side"))
            .build(),
    );
    rig.resolver.grab_object(&mut rig.ctx, rig.right, crate_, 0, true).unwrap();

    rig.move_hand(rig.right, Vec3::X);
    rig.tick();
    assert!(rig.world(crate_).x < 0.5, "{}", rig.world(crate_));

    for _ in 0..216 {
        rig.tick();
    }
    assert!(rig.world(crate_).distance(Vec3::X) < 1e-2, "{}", rig.world(crate_));
}

#[test]
fn far_grip_is_released_with_a_pulse() {
    let pulses: Rc<RefCell<Vec<(GrabberId, HandSide, HapticPulse)>>> = Rc::default();
    let sink = Rc::clone(&pulses);

    let mut rig = Rig::new();
    rig.resolver = ManipulationResolver::default()
        .with_haptics(move |g: GrabberId, side: HandSide, pulse: HapticPulse| {
            sink.borrow_mut().push((g, side, pulse))
        });
    let bolt = rig.add(
        GrabbableObject::builder("bolt")
            .config(GrabbableConfig {
                translation_constraint: TranslationConstraint::Locked,
                rotation_constraint: RotationConstraint::Locked,
                ..GrabbableConfig::default()
            })
            .grab_point(hand_to_object("head"))
            .build(),
    );
    rig.resolver.grab_object(&mut rig.ctx, rig.right, bolt, 0, true).unwrap();

    rig.move_hand(rig.right, Vec3::new(0.1, 0.0, 0.0));
    assert_eq!(rig.tick().grips_released, 0);
    assert!(rig.ctx.is_grabbed(bolt));

    rig.move_hand(rig.right, Vec3::new(0.5, 0.0, 0.0));
    assert_eq!(rig.tick().grips_released, 1);
    assert!(!rig.ctx.is_grabbed(bolt));
    assert_eq!(rig.transitions().last(), Some(&ManipulationEventType::Released));

    let pulses = pulses.borrow();
    assert_eq!(pulses.len(), 1);
    assert_eq!(pulses[0].0, rig.right);
    assert_eq!(pulses[0].1, HandSide::Right);
    assert_eq!(pulses[0].2, HapticPulse::default());
}

#[test]
fn anchor_range_is_reported_while_carrying() {
    let mut rig = Rig::new();
    let cup = rig.add(cup(Vec3::new(0.0, 1.0, 0.0)));
    let anchor = rig.ctx.add_anchor(shelf(Vec3::new(0.0, 1.0, 1.0)).with_max_placing_distance(0.2));

    rig.move_hand(rig.right, Vec3::new(0.0, 1.0, 0.0));
    rig.resolver.grab_object(&mut rig.ctx, rig.right, cup, 0, true).unwrap();
    rig.tick();
    rig.resolver.drain_events();
    assert_eq!(rig.ctx.anchor_candidate(anchor), None);

    rig.move_hand(rig.right, Vec3::new(0.0, 1.0, 0.9));
    rig.tick();
    let events = rig.resolver.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, ManipulationEventType::AnchorRangeEntered);
    assert_eq!(events[0].anchor, Some(anchor));
    assert_eq!(rig.ctx.anchor_candidate(anchor), Some(cup));

    rig.tick();
    assert!(rig.resolver.drain_events().is_empty());

    rig.move_hand(rig.right, Vec3::new(0.0, 1.0, 0.0));
    rig.tick();
    let events = rig.resolver.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, ManipulationEventType::AnchorRangeLeft);
    assert_eq!(rig.ctx.anchor_candidate(anchor), None);
}

#[test]
fn releasing_every_grab_reports_only_the_first_grabber() {
    let mut rig = Rig::new();
    let rail = rig.add(
        GrabbableObject::builder("rail")
            .grab_point(GrabPoint::new("a"))
            .grab_point(GrabPoint::new("b"))
            .build(),
    );
    rig.resolver.grab_object(&mut rig.ctx, rig.right, rail, 0, true).unwrap();
    rig.resolver.grab_object(&mut rig.ctx, rig.left, rail, 1, true).unwrap();
    rig.resolver.drain_events();

    rig.resolver.release_grabs(&mut rig.ctx, rail, true).unwrap();
    let events = rig.resolver.drain_events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.grabber == Some(rig.right)));

    assert!(!rig.ctx.is_grabbed(rail));
    assert!(rig.ctx.grabber(rig.left).is_some_and(|g| !g.is_grabbing()));
}

#[test]
fn parenting_objects_ride_with_the_avatar_while_held() {
    let mut rig = Rig::new();
    let torch = rig.add(
        GrabbableObject::builder("torch")
            .config(GrabbableConfig {
                use_parenting: true,
                ..GrabbableConfig::default()
            })
            .build(),
    );

    rig.resolver.grab_object(&mut rig.ctx, rig.right, torch, 0, true).unwrap();
    assert_eq!(rig.ctx.object(torch).map(|o| o.parent()), Some(ParentLink::Avatar(rig.avatar)));

    rig.resolver.release_grab(&mut rig.ctx, rig.right, true).unwrap();
    assert_eq!(rig.ctx.object(torch).map(|o| o.parent()), Some(ParentLink::World));
}

#[test]
fn releasing_a_parented_object_placed_while_held_keeps_it_on_the_anchor() {
    let mut rig = Rig::new();
    let torch = rig.add(
        GrabbableObject::builder("torch")
            .config(GrabbableConfig {
                use_parenting: true,
                ..GrabbableConfig::default()
            })
            .build(),
    );
    let sconce = rig.ctx.add_anchor(shelf(Vec3::new(0.0, 1.5, 0.0)));

    rig.resolver.grab_object(&mut rig.ctx, rig.right, torch, 0, true).unwrap();
    let options = PlacementOptions::SMOOTH | PlacementOptions::DONT_RELEASE;
    rig.resolver.place_object(&mut rig.ctx, torch, sconce, options, true).unwrap();
    assert!(rig.ctx.is_grabbed(torch));

    rig.resolver.release_grab(&mut rig.ctx, rig.right, true).unwrap();
    for _ in 0..40 {
        rig.tick();
    }

    let item = rig.ctx.object(torch).unwrap();
    assert_eq!(item.parent(), ParentLink::Anchor(sconce));
    assert_eq!(item.current_anchor(), Some(sconce));
    assert!(rig.world(torch).distance(Vec3::new(0.0, 1.5, 0.0)) < 1e-4, "{}", rig.world(torch));
    assert!(rig.ctx.anchors_consistent());
}

#[test]
fn placing_a_held_object_names_the_hand_that_let_go() {
    use ManipulationEventType::*;

    let mut rig = Rig::new();
    let cup = rig.add(cup(Vec3::ZERO));
    let anchor = rig.ctx.add_anchor(shelf(Vec3::Y));
    rig.resolver.grab_object(&mut rig.ctx, rig.right, cup, 0, true).unwrap();
    rig.transitions();

    rig.resolver.place_object(&mut rig.ctx, cup, anchor, PlacementOptions::NONE, true).unwrap();
    let events = rig.resolver.drain_events();
    let types: Vec<_> = events.iter().map(|e| e.event_type).collect();
    assert_eq!(types, vec![Placing, Placed]);
    for args in &events {
        assert_eq!(args.grabber, Some(rig.right));
        assert_eq!(args.grab_point, Some(0));
    }
    assert!(!rig.ctx.is_grabbed(cup));
}

#[test]
fn invalid_requests_fail_without_events() {
    let mut rig = Rig::new();
    let cup = rig.add(cup(Vec3::ZERO));

    let err = rig.resolver.grab_object(&mut rig.ctx, rig.right, cup, 3, true).unwrap_err();
    assert!(matches!(err, ManipulationError::GrabPointOutOfRange { index: 3, count: 1, .. }));
    assert_eq!(
        rig.resolver.release_object(&mut rig.ctx, None, cup, true),
        Err(ManipulationError::NotGrabbed(cup))
    );
    assert_eq!(
        rig.resolver.place_object(&mut rig.ctx, cup, AnchorId(7), PlacementOptions::NONE, true),
        Err(ManipulationError::UnknownAnchor(AnchorId(7)))
    );
    assert!(rig.resolver.drain_events().is_empty());
    assert!(!rig.ctx.is_grabbed(cup));
}

#[test]
fn muted_transitions_raise_nothing() {
    let mut rig = Rig::new();
    let cup = rig.add(cup(Vec3::ZERO));
    let anchor = rig.ctx.add_anchor(shelf(Vec3::Y));

    rig.resolver.grab_object(&mut rig.ctx, rig.right, cup, 0, false).unwrap();
    rig.resolver.place_object(&mut rig.ctx, cup, anchor, PlacementOptions::NONE, false).unwrap();
    assert!(rig.resolver.drain_frames().is_empty());
    assert_eq!(rig.ctx.anchor(anchor).and_then(|a| a.current_placed_object()), Some(cup));
}

fn sync(
    local: &mut ManipulationResolver,
    remote: &mut ManipulationResolver,
    remote_ctx: &mut ManipulationContext,
) {
    for frame in local.drain_frames() {
        apply_frame(remote, remote_ctx, &frame).unwrap();
    }
}

fn replay_scene() -> (ManipulationContext, GrabberId, ObjectId, AnchorId) {
    let mut ctx = ManipulationContext::new();
    let avatar = ctx.add_avatar(Avatar::new("player"));
    let hand = ctx.add_grabber(Grabber::new(avatar, HandSide::Right));
    let cup = ctx.add_object(cup(Vec3::new(0.0, 1.0, 0.0)));
    let anchor = ctx.add_anchor(shelf(Vec3::new(0.5, 1.2, 0.0)));
    (ctx, hand, cup, anchor)
}

#[test]
fn replayed_frames_reproduce_the_session() {
    let (mut local_ctx, hand, cup, anchor) = replay_scene();
    let (mut remote_ctx, ..) = replay_scene();
    let mut local = ManipulationResolver::default();
    let mut remote = ManipulationResolver::default();

    let start = Vec3::new(0.0, 1.0, 0.0);
    let end = Vec3::new(0.5, 1.2, 0.0);
    let pose =
        |t: f32| Transform::from_position_rotation(start.lerp(end, t), Quat::from_rotation_y(t));

    for ctx in [&mut local_ctx, &mut remote_ctx] {
        ctx.set_grabber_pose(hand, pose(0.0)).unwrap();
    }
    local.grab_object(&mut local_ctx, hand, cup, 0, true).unwrap();

    sync(&mut local, &mut remote, &mut remote_ctx);
    assert!(remote_ctx.is_grabbed(cup));

    for step in 1..=60 {
        let t = step as f32 / 60.0;
        for ctx in [&mut local_ctx, &mut remote_ctx] {
            ctx.set_grabber_pose(hand, pose(t)).unwrap();
        }
        local.update_manipulation(&mut local_ctx, DT);
        sync(&mut local, &mut remote, &mut remote_ctx);
        remote.update_manipulation(&mut remote_ctx, DT);

        let a = local_ctx.object_world(cup).unwrap();
        let b = remote_ctx.object_world(cup).unwrap();
        assert!(a.position.distance(b.position) < 1e-4, "step {step}");
        assert!(a.rotation.angle_between(b.rotation) < 1e-4, "step {step}");
    }

    local.release_object(&mut local_ctx, Some(hand), cup, true).unwrap();
    sync(&mut local, &mut remote, &mut remote_ctx);
    for _ in 0..30 {
        local.update_manipulation(&mut local_ctx, DT);
        remote.update_manipulation(&mut remote_ctx, DT);
    }

    for ctx in [&local_ctx, &remote_ctx] {
        assert_eq!(ctx.anchor(anchor).and_then(|a| a.current_placed_object()), Some(cup));
        assert!(!ctx.is_grabbed(cup));
        assert!(ctx.anchors_consistent());
    }
    let a = local_ctx.object_world(cup).unwrap();
    let b = remote_ctx.object_world(cup).unwrap();
    assert!(a.position.distance(b.position) < 1e-4);
}
