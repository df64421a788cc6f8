//! # grab-manipulation
//!
//! Hand manipulation resolution for VR grabbing: turns tracked hand poses into
//! object poses under constraints, with multi-hand averaging, leverage chains
//! between grabbable parents and children, anchors to place objects on, and
//! events a remote peer can replay.
//!
//! ## Features
//! - Grab, release and place transitions with pre/post mutation events
//! - Translation and rotation constraints, cumulative single-axis angles
//! - Look-at averaging for objects held by several hands
//! - Levers and wheels turning around a pivot, children driving parents
//! - Resistance through critically damped followers
//! - Sync frames and replay for networked sessions
//!
//! ## Example
//! ```rust,ignore
//! use grab_manipulation::{
//!     Avatar, GrabbableObject, Grabber, HandSide, ManipulationContext, ManipulationResolver,
//!     Transform,
//! };
//! use glam::Vec3;
//!
//! let mut ctx = ManipulationContext::new();
//! let avatar = ctx.add_avatar(Avatar::new("player"));
//! let hand = ctx.add_grabber(Grabber::new(avatar, HandSide::Right));
//! let cup = ctx.add_object(
//!     GrabbableObject::builder("cup")
//!         .position(Vec3::new(0.0, 1.0, 0.1))
//!         .build(),
//! );
//!
//! let mut resolver = ManipulationResolver::default();
//! ctx.set_grabber_pose(hand, Transform::from_position(Vec3::new(0.0, 1.0, 0.0)))?;
//! resolver.try_grab(&mut ctx, avatar, HandSide::Right);
//! let report = resolver.update_manipulation(&mut ctx, 1.0 / 72.0);
//! println!("solved {} objects", report.objects_solved);
//! ```

pub mod dynamics;
pub mod error;
pub mod events;
pub mod haptics;
pub mod math;
pub mod resolver;
pub mod runtime;
pub mod scene;
pub mod settings;

pub use dynamics::{Interpolatable, SecondOrderDynamics};
pub use error::{ConfigError, ManipulationError};
pub use events::{
    apply_event, apply_frame, EventDispatcher, ManipulationEventArgs, ManipulationEventType,
    ManipulationListener, PlacementOptions, ReleaseVelocity, ReplayPose, SyncFrame,
};
pub use haptics::{HapticsSink, NoHaptics};
pub use math::{Axis, BoxVolume, SphereVolume, Transform};
pub use resolver::{ManipulationResolver, SolveReport};
pub use runtime::{RuntimeGrabInfo, RuntimeManipulationInfo};
pub use scene::{
    AnchorId, Avatar, AvatarId, CompatibleHands, GrabCandidate, GrabMode, GrabPoint,
    GrabPointShape, GrabbableAnchor, GrabbableConfig, GrabbableObject, GrabbableObjectBuilder,
    Grabber, GrabberId, HandSide, ManipulationContext, ObjectId, ParentLink, PhysicsBody,
    ProximityMode, RigidBodyState, RotationConstraint, RotationProvider, SnapDirection, SnapMode,
    TranslationConstraint,
};
pub use settings::{HapticPulse, ManipulationSettings};
