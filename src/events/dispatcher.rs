use super::args::ManipulationEventArgs;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Receives every event raised by the resolver, in raise order.
pub trait ManipulationListener {
    fn on_event(&mut self, args: &ManipulationEventArgs);
}

impl<F> ManipulationListener for F
where
    F: FnMut(&ManipulationEventArgs),
{
    fn on_event(&mut self, args: &ManipulationEventArgs) {
        self(args)
    }
}

/// Events produced by one top-level resolver call. A receiver applies a frame
/// as a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncFrame {
    pub events: Vec<ManipulationEventArgs>,
}

impl SyncFrame {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Fans events out to listeners and groups them into [`SyncFrame`]s.
#[derive(Default)]
pub struct EventDispatcher {
    listeners: Vec<Box<dyn ManipulationListener>>,
    depth: u32,
    open: Vec<ManipulationEventArgs>,
    frames: VecDeque<SyncFrame>,
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listeners.len())
            .field("depth", &self.depth)
            .field("open", &self.open.len())
            .field("frames", &self.frames.len())
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener<L: ManipulationListener + 'static>(&mut self, listener: L) {
        self.listeners.push(Box::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn raise(&mut self, args: ManipulationEventArgs) {
        log::trace!("{:?} {:?}", args.event_type, args.object);
        for listener in self.listeners.iter_mut() {
            listener.on_event(&args);
        }
        if self.depth > 0 {
            self.open.push(args);
        } else {
            self.frames.push_back(SyncFrame { events: vec![args] });
        }
    }

    /// Opens a frame. Frames nest; only the outermost one is recorded.
    pub fn begin_sync(&mut self) {
        self.depth += 1;
    }

    pub fn end_sync(&mut self) {
        if self.depth == 0 {
            log::warn!("end_sync without matching begin_sync");
            return;
        }
        self.depth -= 1;
        if self.depth == 0 && !self.open.is_empty() {
            let events = std::mem::take(&mut self.open);
            self.frames.push_back(SyncFrame { events });
        }
    }

    pub fn is_in_sync_frame(&self) -> bool {
        self.depth > 0
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    /// Takes every closed frame, oldest first.
    pub fn drain_frames(&mut self) -> Vec<SyncFrame> {
        self.frames.drain(..).collect()
    }

    /// Takes every closed frame flattened into one event list.
    pub fn drain_events(&mut self) -> Vec<ManipulationEventArgs> {
        self.frames.drain(..).flat_map(|f| f.events).collect()
    }
}
