pub mod analyser;
pub mod auto_gain;
pub mod beat_detector;
pub mod capture;
pub mod engine;
pub mod fallback;
pub mod features;

use std::time::Duration;

pub use analyser::SpectrumAnalyser;
pub use auto_gain::{AutoGainController, GainState};
pub use beat_detector::BeatDetector;
pub use capture::{
    AudioCaptureSource, CaptureDevice, ChannelInputDevice, Compressor, Connected, CpalInputDevice,
    InputStream,
};
pub use engine::AudioEngine;
pub use fallback::{FallbackData, SilenceFallbackGenerator, SilenceState};
pub use features::{AudioFeatureExtractor, BandLevels};

/// One tick of byte amplitudes, one entry per frequency bin.
pub type AudioSample = Vec<u8>;

/// Audio readings published once per tick for the visual layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioState {
    /// Smoothed RMS volume, 0.0-1.0
    pub volume: f32,
    pub low_freq: f32,
    pub mid_freq: f32,
    pub high_freq: f32,
    /// Always the mean of the three bands
    pub average_frequency: f32,
    pub beat: bool,
    pub last_beat_time: Duration,
}

impl AudioState {
    pub(crate) fn from_levels(volume: f32, bands: BandLevels, beat: bool, last_beat_time: Duration) -> Self {
        Self {
            volume,
            low_freq: bands.low,
            mid_freq: bands.mid,
            high_freq: bands.high,
            average_frequency: bands.average(),
            beat,
            last_beat_time,
        }
    }
}

impl Default for AudioState {
    fn default() -> Self {
        Self {
            volume: 0.0,
            low_freq: 0.0,
            mid_freq: 0.0,
            high_freq: 0.0,
            average_frequency: 0.0,
            beat: false,
            last_beat_time: Duration::ZERO,
        }
    }
}
