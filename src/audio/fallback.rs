//! Ambient signal used when there is no usable input.
//!
//! The levels are slow sine waves of wall-clock time, so the visuals keep
//! breathing with the microphone off, denied, or silent. Given the same clock
//! reading the levels are bit-for-bit identical; the only randomness is a
//! sparse synthetic beat drawn from a seedable RNG.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use super::features::BandLevels;

const DEFAULT_BEAT_PROBABILITY: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackData {
    pub volume: f32,
    pub low_freq: f32,
    pub mid_freq: f32,
    pub high_freq: f32,
    pub average_frequency: f32,
    pub beat: bool,
}

impl FallbackData {
    pub fn bands(&self) -> BandLevels {
        BandLevels {
            low: self.low_freq,
            mid: self.mid_freq,
            high: self.high_freq,
        }
    }
}

pub struct SilenceFallbackGenerator {
    rng: StdRng,
    beat_probability: f64,
}

impl SilenceFallbackGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            beat_probability: DEFAULT_BEAT_PROBABILITY,
        }
    }

    /// Generator with a fixed RNG seed, for reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            beat_probability: DEFAULT_BEAT_PROBABILITY,
        }
    }

    pub fn with_beat_probability(mut self, probability: f64) -> Self {
        self.beat_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Ambient levels and a possible synthetic beat for time `now` since the epoch.
    pub fn generate_fallback_data(&mut self, now: Duration) -> FallbackData {
        let bands = Self::ambient_levels(now);
        let t = now.as_secs_f64();

        FallbackData {
            volume: (0.1 + 0.05 * (t * 0.5).sin()) as f32,
            low_freq: bands.low,
            mid_freq: bands.mid,
            high_freq: bands.high,
            average_frequency: bands.average(),
            beat: self.rng.random_bool(self.beat_probability),
        }
    }

    /// The band levels alone; a pure function of `now`.
    pub fn ambient_levels(now: Duration) -> BandLevels {
        let t = now.as_secs_f64();
        BandLevels {
            low: (0.2 + 0.1 * (t * 0.3).sin()) as f32,
            mid: (0.15 + 0.08 * (t * 0.7).sin()) as f32,
            high: (0.1 + 0.06 * (t * 1.2).sin()) as f32,
        }
    }
}

impl Default for SilenceFallbackGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks how long the live input has been below the silence threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceState {
    pub last_audio_time: Duration,
    pub in_silent_mode: bool,
    silence_threshold: f32,
    silence_timeout: Duration,
}

impl SilenceState {
    pub fn new(now: Duration, silence_threshold: f32, silence_timeout: Duration) -> Self {
        Self {
            last_audio_time: now,
            in_silent_mode: false,
            silence_threshold,
            silence_timeout,
        }
    }

    /// Records one raw volume reading; returns whether the input counts as silent.
    pub fn observe(&mut self, raw_volume: f32, now: Duration) -> bool {
        if raw_volume > self.silence_threshold {
            if self.in_silent_mode {
                log::info!("🎤 Audio input resumed, leaving silent mode");
            }
            self.last_audio_time = now;
            self.in_silent_mode = false;
        } else if !self.in_silent_mode
            && now.saturating_sub(self.last_audio_time) > self.silence_timeout
        {
            log::info!(
                "🔇 No audio above {:.3} for {:?}, switching to ambient data",
                self.silence_threshold,
                self.silence_timeout
            );
            self.in_silent_mode = true;
        }
        self.in_silent_mode
    }

    /// Restarts the silence timer, e.g. when a new input is connected.
    pub fn reset(&mut self, now: Duration) {
        self.last_audio_time = now;
        self.in_silent_mode = false;
    }
}
