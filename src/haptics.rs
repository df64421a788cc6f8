use crate::scene::{GrabberId, HandSide};
use crate::settings::HapticPulse;

/// Output for haptic feedback requests.
pub trait HapticsSink {
    fn send_pulse(&mut self, grabber: GrabberId, side: HandSide, pulse: HapticPulse);
}

/// Drops every request.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHaptics;

impl HapticsSink for NoHaptics {
    fn send_pulse(&mut self, _grabber: GrabberId, _side: HandSide, _pulse: HapticPulse) {}
}

impl<F> HapticsSink for F
where
    F: FnMut(GrabberId, HandSide, HapticPulse),
{
    fn send_pulse(&mut self, grabber: GrabberId, side: HandSide, pulse: HapticPulse) {
        self(grabber, side, pulse)
    }
}
