use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Haptic pulse description sent to the haptics sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HapticPulse {
    pub amplitude: f32,
    pub duration: f32,
}

impl Default for HapticPulse {
    fn default() -> Self {
        Self {
            amplitude: 0.5,
            duration: 0.1,
        }
    }
}

/// Engine-wide tuning of the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManipulationSettings {
    /// Seconds of grabber motion averaged for release velocities.
    pub physics_sample_window: f32,
    /// Horizontal/vertical release speed below which no multiplier applies.
    pub release_speed_gradient_start: f32,
    /// Release speed from which the full multiplier applies.
    pub release_speed_gradient_end: f32,
    pub horizontal_release_multiplier: f32,
    pub vertical_release_multiplier: f32,
    pub smooth_placement_seconds: f32,
    /// Follower frequency in Hz for an object with zero resistance. Higher
    /// resistance lowers it proportionally.
    pub resistance_frequency: f32,
    /// Keep multi-hand objects centered between all grabs.
    pub center_between_grabs: bool,
    /// Distance between the tracked hand and its grip beyond which the grip
    /// is released.
    pub auto_release_distance: f32,
    pub far_release_haptics: HapticPulse,
    pub anchor_range_events: bool,
}

impl Default for ManipulationSettings {
    fn default() -> Self {
        Self {
            physics_sample_window: 0.15,
            release_speed_gradient_start: 2.5,
            release_speed_gradient_end: 4.5,
            horizontal_release_multiplier: 1.0,
            vertical_release_multiplier: 1.0,
            smooth_placement_seconds: 0.2,
            resistance_frequency: 10.0,
            center_between_grabs: true,
            auto_release_distance: 0.3,
            far_release_haptics: HapticPulse::default(),
            anchor_range_events: true,
        }
    }
}

impl ManipulationSettings {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let settings: ManipulationSettings = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        log::debug!("loading manipulation settings from {}", path.as_ref().display());
        Self::from_toml_str(&source)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.physics_sample_window <= 0.0 {
            return Err(invalid("physics_sample_window", "must be positive"));
        }
        if self.release_speed_gradient_start < 0.0
            || self.release_speed_gradient_end < self.release_speed_gradient_start
        {
            return Err(invalid(
                "release_speed_gradient_end",
                format!(
                    "gradient [{}, {}] must be non-negative and increasing",
                    self.release_speed_gradient_start, self.release_speed_gradient_end
                ),
            ));
        }
        if self.smooth_placement_seconds < 0.0 {
            return Err(invalid("smooth_placement_seconds", "must not be negative"));
        }
        if self.resistance_frequency <= 0.0 {
            return Err(invalid("resistance_frequency", "must be positive"));
        }
        if self.auto_release_distance < 0.0 {
            return Err(invalid("auto_release_distance", "must not be negative"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}
