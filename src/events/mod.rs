//! Manipulation events, sync frames and replay
//!
//! Every transition raises a pre-mutation event (`Grabbing`, `Releasing`,
//! `Placing`, `Removing`) before state changes and the matching
//! post-mutation event after. Events raised by one top-level call are grouped
//! into a [`SyncFrame`] that a remote peer replays with [`apply_frame`].

mod args;
mod dispatcher;
mod replay;

pub use args::{
    ManipulationEventArgs, ManipulationEventType, PlacementOptions, ReleaseVelocity, ReplayPose,
};
pub use dispatcher::{EventDispatcher, ManipulationListener, SyncFrame};
pub use replay::{apply_event, apply_frame};
