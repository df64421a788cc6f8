//! The manipulation resolver
//!
//! Owns the engine settings, the event dispatcher and the haptics output, and
//! runs every transition against a [`crate::ManipulationContext`] passed in by the
//! caller. All calls happen on one thread; a frame is
//! pose provider -> [`ManipulationResolver::update_manipulation`] -> render.

mod anchors;
mod constraints;
mod grab;
mod grips;
mod look_at;
mod placement;
mod release;
mod solve;

#[cfg(test)]
mod scenarios;

pub use constraints::{clamp_rotation, constrain_local};
pub use release::release_speed_factor;
pub(crate) use release::ReleaseMode;
pub use solve::SolveReport;

use crate::events::{EventDispatcher, ManipulationEventArgs, ManipulationListener, SyncFrame};
use crate::haptics::{HapticsSink, NoHaptics};
use crate::settings::ManipulationSettings;

pub struct ManipulationResolver {
    pub settings: ManipulationSettings,
    events: EventDispatcher,
    haptics: Box<dyn HapticsSink>,
}

impl std::fmt::Debug for ManipulationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManipulationResolver")
            .field("settings", &self.settings)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

impl Default for ManipulationResolver {
    fn default() -> Self {
        Self::new(ManipulationSettings::default())
    }
}

impl ManipulationResolver {
    pub fn new(settings: ManipulationSettings) -> Self {
        Self {
            settings,
            events: EventDispatcher::new(),
            haptics: Box::new(NoHaptics),
        }
    }

    pub fn with_haptics<H: HapticsSink + 'static>(mut self, haptics: H) -> Self {
        self.haptics = Box::new(haptics);
        self
    }

    pub fn add_listener<L: ManipulationListener + 'static>(&mut self, listener: L) {
        self.events.add_listener(listener);
    }

    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }

    /// Sync frames closed since the last call, oldest first.
    pub fn drain_frames(&mut self) -> Vec<SyncFrame> {
        self.events.drain_frames()
    }

    pub fn drain_events(&mut self) -> Vec<ManipulationEventArgs> {
        self.events.drain_events()
    }

    fn raise(&mut self, propagate: bool, args: ManipulationEventArgs) {
        if propagate {
            self.events.raise(args);
        }
    }

    /// Runs `f` inside one sync frame.
    fn synced<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.events.begin_sync();
        let result = f(self);
        self.events.end_sync();
        result
    }
}
