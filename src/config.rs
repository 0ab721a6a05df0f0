//! Performance configuration file.
//!
//! Everything is optional in the JSON: missing fields take the defaults
//! below, so a config only needs the values a venue wants to change.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::acts::ActId;
use crate::error::ConfigError;
use crate::timing::TimingConfig;

/// Audio pipeline tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Analyser FFT size; the sample has half as many bins
    pub fft_size: usize,
    pub smoothing_time_constant: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,

    // Auto-gain
    pub auto_gain: bool,
    pub target_volume: f32,
    pub adjustment_speed: f32,
    pub min_gain: f32,
    pub max_gain: f32,

    // Compression after the gain stage
    pub compressor_threshold_db: f32,
    pub compressor_ratio: f32,

    /// Moving-average window for volume, in ticks
    pub volume_history: usize,

    // Beat detection
    pub beat_threshold: f32,
    pub beat_cooldown_ms: u64,

    // Silence handling
    pub silence_threshold: f32,
    pub silence_timeout_ms: u64,
    pub fallback_beat_probability: f64,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            fft_size: 512,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            auto_gain: true,
            target_volume: 0.3,
            adjustment_speed: 0.01,
            min_gain: 0.1,
            max_gain: 50.0,
            compressor_threshold_db: -24.0,
            compressor_ratio: 12.0,
            volume_history: 10,
            beat_threshold: 0.3,
            beat_cooldown_ms: 100,
            silence_threshold: 0.01,
            silence_timeout_ms: 5000,
            fallback_beat_probability: 0.01,
        }
    }
}

impl AudioSettings {
    pub fn beat_cooldown(&self) -> Duration {
        Duration::from_millis(self.beat_cooldown_ms)
    }

    pub fn silence_timeout(&self) -> Duration {
        Duration::from_millis(self.silence_timeout_ms)
    }
}

/// Act and transition durations, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    pub act_duration_ms: u64,
    pub transition_duration_ms: u64,
    pub demo_act_duration_ms: u64,
    pub demo_transition_duration_ms: u64,
    pub demo_mode: bool,
    /// Advance acts automatically when their time is up
    pub auto_advance: bool,
    /// Wrap from act 4 back to act 1
    pub looped: bool,
    pub start_act: u8,
}

impl Default for TimingSettings {
    fn default() -> Self {
        let timing = TimingConfig::default();
        Self {
            act_duration_ms: timing.act_duration().as_millis() as u64,
            transition_duration_ms: timing.transition_duration().as_millis() as u64,
            demo_act_duration_ms: timing.demo_act_duration().as_millis() as u64,
            demo_transition_duration_ms: timing.demo_transition_duration().as_millis() as u64,
            demo_mode: false,
            auto_advance: true,
            looped: false,
            start_act: 1,
        }
    }
}

impl TimingSettings {
    pub fn timing_config(&self) -> TimingConfig {
        let mut timing = TimingConfig::new(
            Duration::from_millis(self.act_duration_ms),
            Duration::from_millis(self.transition_duration_ms),
        );
        timing.set_demo_timing(
            Duration::from_millis(self.demo_act_duration_ms),
            Duration::from_millis(self.demo_transition_duration_ms),
        );
        timing.enable_demo_mode(self.demo_mode);
        timing
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub audio: AudioSettings,
    pub timing: TimingSettings,
}

impl PerformanceConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if ActId::try_from(self.timing.start_act).is_err() {
            return Err(ConfigError::Invalid(format!(
                "start_act must be 1-4, got {}",
                self.timing.start_act
            )));
        }
        if self.timing.transition_duration_ms == 0 || self.timing.demo_transition_duration_ms == 0 {
            return Err(ConfigError::Invalid("transition durations must be non-zero".to_string()));
        }
        if self.audio.min_gain <= 0.0 || self.audio.min_gain > self.audio.max_gain {
            return Err(ConfigError::Invalid(format!(
                "gain range [{}, {}] is invalid",
                self.audio.min_gain, self.audio.max_gain
            )));
        }
        Ok(())
    }
}
