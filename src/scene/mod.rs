//! Scene records the resolver operates on
//!
//! Avatars, grabbers, grabbable objects and anchors are plain data owned by
//! arenas inside [`ManipulationContext`] and addressed through stable handles.

mod anchor;
mod arena;
mod context;
mod grab_point;
mod grabbable;
mod grabber;
mod physics;

pub use anchor::GrabbableAnchor;
pub use arena::{AnchorId, Arena, ArenaKey, AvatarId, GrabberId, ObjectId};
pub use context::{GrabCandidate, ManipulationContext};
pub use grab_point::{
    CompatibleHands, GrabMode, GrabPoint, GrabPointShape, HandSide, ProximityMode, SnapDirection,
    SnapMode,
};
pub use grabbable::{
    GrabbableConfig, GrabbableObject, GrabbableObjectBuilder, ParentLink, RotationConstraint,
    RotationProvider, TranslationConstraint,
};
pub(crate) use grabbable::{PlacementTransition, ResistanceState, ReturnTimer};
pub use grabber::{Avatar, Grabber, PhysicsSample};
pub use physics::{PhysicsBody, RigidBodyState};
