use log::{debug, error, info, warn};
use std::time::Duration;

use super::auto_gain::AutoGainController;
use super::beat_detector::BeatDetector;
use super::capture::{AudioCaptureSource, CaptureDevice, Compressor, CpalInputDevice};
use super::fallback::{SilenceFallbackGenerator, SilenceState};
use super::features::AudioFeatureExtractor;
use super::{AudioSample, AudioState, SpectrumAnalyser};
use crate::config::AudioSettings;
use crate::error::AudioError;

const DEBUG_LOG_INTERVAL: u64 = 120;

/// Per-tick audio pipeline and the audio half of the public API.
///
/// Each `update` either analyses the live input (capture, auto-gain, feature
/// extraction, beat detection) or, when there is no usable input, publishes
/// the ambient fallback signal. Callers only ever see a valid `AudioState`.
pub struct AudioEngine {
    capture: Option<AudioCaptureSource>,
    auto_gain: AutoGainController,
    extractor: AudioFeatureExtractor,
    beat_detector: BeatDetector,
    fallback: SilenceFallbackGenerator,
    silence: SilenceState,
    state: AudioState,
    sample: AudioSample,
    using_fallback: bool,
    status_message: Option<String>,
    tick_count: u64,
}

impl AudioEngine {
    /// Engine on the default system input device.
    pub fn new(settings: &AudioSettings, now: Duration) -> Self {
        Self::with_device(
            settings,
            Box::new(CpalInputDevice::new()),
            SilenceFallbackGenerator::new().with_beat_probability(settings.fallback_beat_probability),
            now,
        )
    }

    pub fn with_device(
        settings: &AudioSettings,
        device: Box<dyn CaptureDevice>,
        fallback: SilenceFallbackGenerator,
        now: Duration,
    ) -> Self {
        let analyser = SpectrumAnalyser::with_params(
            settings.fft_size,
            settings.smoothing_time_constant,
            settings.min_decibels,
            settings.max_decibels,
        );

        let (capture, status_message) = match analyser {
            Ok(analyser) => {
                let compressor =
                    Compressor::new(settings.compressor_threshold_db, settings.compressor_ratio);
                (Some(AudioCaptureSource::new(device, analyser, compressor)), None)
            }
            Err(err) => {
                error!("Audio analysis unavailable: {}", err);
                (None, Some(format!("Audio unavailable: {}", err)))
            }
        };

        let mut auto_gain = AutoGainController::new(
            settings.target_volume,
            settings.adjustment_speed,
            settings.min_gain,
            settings.max_gain,
        );
        auto_gain.set_enabled(settings.auto_gain);

        Self {
            capture,
            auto_gain,
            extractor: AudioFeatureExtractor::with_history_size(settings.volume_history),
            beat_detector: BeatDetector::with_config(settings.beat_threshold, settings.beat_cooldown()),
            fallback,
            silence: SilenceState::new(now, settings.silence_threshold, settings.silence_timeout()),
            state: AudioState::default(),
            sample: Vec::new(),
            using_fallback: true,
            status_message,
            tick_count: 0,
        }
    }

    /// Runs one tick of the pipeline and returns the published state.
    pub fn update(&mut self, now: Duration) -> &AudioState {
        self.tick_count += 1;

        let live = match self.capture.as_mut() {
            Some(capture) if capture.is_live() && capture.is_enabled() => Some(capture),
            Some(capture) => {
                // A muted stream keeps running; don't let its input pile up
                capture.discard_pending();
                None
            }
            None => None,
        };

        let mut analysed = false;
        if let Some(capture) = live {
            capture.sample(&mut self.sample);
            let features = self.extractor.process(&self.sample);

            let gain = self.auto_gain.update(features.raw_volume);
            capture.set_gain(gain);

            if !self.silence.observe(features.raw_volume, now) {
                let beat = self
                    .beat_detector
                    .detect_beat(features.volume, features.bands.low, now);
                self.state = AudioState::from_levels(
                    features.volume,
                    features.bands,
                    beat,
                    self.last_beat_time(),
                );
                analysed = true;
            }
        }

        if !analysed {
            let data = self.fallback.generate_fallback_data(now);
            let beat = data.beat && self.beat_detector.register_external(now);
            self.state = AudioState::from_levels(data.volume, data.bands(), beat, self.last_beat_time());
        }

        if analysed == self.using_fallback {
            self.using_fallback = !analysed;
            debug!(
                "Audio source: {}",
                if self.using_fallback { "ambient fallback" } else { "live input" }
            );
        }

        if self.tick_count % DEBUG_LOG_INTERVAL == 0 {
            debug!(
                "🔬 volume={:.3} low={:.3} mid={:.3} high={:.3} gain={:.2} fallback={}",
                self.state.volume,
                self.state.low_freq,
                self.state.mid_freq,
                self.state.high_freq,
                self.auto_gain.gain(),
                self.using_fallback
            );
        }

        &self.state
    }

    /// Asks for the microphone. Denial is logged and the ambient signal stays
    /// in use; returns whether a live input is now connected.
    pub fn request_microphone(&mut self, now: Duration) -> bool {
        let Some(capture) = self.capture.as_mut() else {
            warn!("Microphone requested but audio analysis is unavailable");
            return false;
        };

        match capture.acquire() {
            Ok(_) => {
                self.silence.reset(now);
                self.extractor.reset();
                true
            }
            Err(err) => {
                self.note_failure(&err);
                false
            }
        }
    }

    /// Flips the microphone on or off; connects first if never connected.
    /// Returns whether the microphone is now enabled.
    pub fn toggle_microphone(&mut self, now: Duration) -> bool {
        let Some(capture) = self.capture.as_mut() else {
            return false;
        };

        if !capture.is_live() {
            return self.request_microphone(now);
        }

        match capture.toggle(!capture.is_enabled()) {
            Ok(enabled) => {
                if enabled {
                    self.silence.reset(now);
                }
                enabled
            }
            Err(err) => {
                self.note_failure(&err);
                false
            }
        }
    }

    pub fn dispose(&mut self) {
        if let Some(capture) = self.capture.as_mut() {
            capture.dispose();
        }
    }

    fn note_failure(&mut self, err: &AudioError) {
        if err.is_user_visible() {
            error!("Audio initialization failed: {}", err);
            self.status_message = Some(format!("Audio unavailable: {}", err));
        } else {
            info!("Continuing with ambient audio: {}", err);
        }
    }

    fn last_beat_time(&self) -> Duration {
        self.beat_detector.last_beat_time().unwrap_or(Duration::ZERO)
    }

    pub fn state(&self) -> &AudioState {
        &self.state
    }

    pub fn volume(&self) -> f32 {
        self.state.volume
    }

    pub fn low_freq(&self) -> f32 {
        self.state.low_freq
    }

    pub fn mid_freq(&self) -> f32 {
        self.state.mid_freq
    }

    pub fn high_freq(&self) -> f32 {
        self.state.high_freq
    }

    pub fn average_frequency(&self) -> f32 {
        self.state.average_frequency
    }

    pub fn beat(&self) -> bool {
        self.state.beat
    }

    pub fn estimated_bpm(&self) -> Option<f32> {
        self.beat_detector.estimated_bpm()
    }

    pub fn gain(&self) -> f32 {
        self.auto_gain.gain()
    }

    pub fn is_silent(&self) -> bool {
        self.silence.in_silent_mode
    }

    pub fn is_using_fallback(&self) -> bool {
        self.using_fallback
    }

    pub fn is_microphone_enabled(&self) -> bool {
        self.capture
            .as_ref()
            .map(|c| c.is_live() && c.is_enabled())
            .unwrap_or(false)
    }

    /// Message for the performer when audio could not be set up at all.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::capture::ChannelInputDevice;
    use crossbeam_channel::Sender;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn tone(amplitude: f32) -> Vec<f32> {
        // Low bin so the bass band carries the energy
        (0..512)
            .map(|n| amplitude * (2.0 * std::f32::consts::PI * 4.0 * n as f32 / 512.0).sin())
            .collect()
    }

    fn live_engine() -> (AudioEngine, Sender<Vec<f32>>) {
        let (device, sender) = ChannelInputDevice::new(44_100);
        let mut engine = AudioEngine::with_device(
            &AudioSettings::default(),
            Box::new(device),
            SilenceFallbackGenerator::with_seed(11),
            ms(0),
        );
        assert!(engine.request_microphone(ms(0)));
        (engine, sender)
    }

    #[test]
    fn test_starts_on_ambient_data() {
        let (device, _sender) = ChannelInputDevice::new(44_100);
        let mut engine = AudioEngine::with_device(
            &AudioSettings::default(),
            Box::new(device),
            SilenceFallbackGenerator::with_seed(1).with_beat_probability(0.0),
            ms(0),
        );

        let state = *engine.update(ms(16));
        let expected = SilenceFallbackGenerator::ambient_levels(ms(16));
        assert!(engine.is_using_fallback());
        assert_eq!(state.low_freq, expected.low);
        assert_eq!(state.average_frequency, expected.average());
    }

    #[test]
    fn test_denied_microphone_keeps_ambient_data() {
        let mut engine = AudioEngine::with_device(
            &AudioSettings::default(),
            Box::new(ChannelInputDevice::refusing(AudioError::PermissionDenied)),
            SilenceFallbackGenerator::with_seed(2),
            ms(0),
        );

        assert!(!engine.request_microphone(ms(0)));
        assert!(engine.status_message().is_none());
        engine.update(ms(16));
        assert!(engine.is_using_fallback());
        assert!(engine.volume() > 0.0);
    }

    #[test]
    fn test_bad_analyser_config_is_reported() {
        let settings = AudioSettings {
            fft_size: 300,
            ..AudioSettings::default()
        };
        let (device, _sender) = ChannelInputDevice::new(44_100);
        let mut engine = AudioEngine::with_device(
            &settings,
            Box::new(device),
            SilenceFallbackGenerator::with_seed(3),
            ms(0),
        );

        assert!(engine.status_message().unwrap().contains("Audio unavailable"));
        assert!(!engine.request_microphone(ms(0)));
        engine.update(ms(16));
        assert!(engine.is_using_fallback());
    }

    #[test]
    fn test_live_input_is_analysed() {
        let (mut engine, sender) = live_engine();

        for tick in 1..=20u64 {
            sender.send(tone(0.5)).unwrap();
            engine.update(ms(tick * 16));
        }

        assert!(!engine.is_using_fallback());
        assert!(engine.volume() > 0.0);
        assert!(engine.low_freq() > engine.high_freq());
        let state = engine.state();
        let mean = (state.low_freq + state.mid_freq + state.high_freq) / 3.0;
        assert_eq!(state.average_frequency, mean);
    }

    #[test]
    fn test_silence_switches_to_ambient_after_timeout() {
        let (mut engine, _sender) = live_engine();

        // Nothing arrives: the analyser reads zeros
        engine.update(ms(1000));
        assert!(!engine.is_silent());
        assert_eq!(engine.volume(), 0.0);

        engine.update(ms(5000));
        assert!(!engine.is_silent());

        let state = *engine.update(ms(5001));
        assert!(engine.is_silent());
        assert!(engine.is_using_fallback());
        let expected = SilenceFallbackGenerator::ambient_levels(ms(5001));
        assert_eq!(state.mid_freq, expected.mid);
        assert!(state.volume > 0.0);
    }

    #[test]
    fn test_toggle_microphone_off_uses_ambient() {
        let (mut engine, sender) = live_engine();
        sender.send(tone(0.5)).unwrap();
        engine.update(ms(16));
        assert!(!engine.is_using_fallback());

        assert!(!engine.toggle_microphone(ms(32)));
        sender.send(tone(0.5)).unwrap();
        engine.update(ms(48));
        assert!(engine.is_using_fallback());

        assert!(engine.toggle_microphone(ms(64)));
        assert!(engine.is_microphone_enabled());
    }

    #[test]
    fn test_muted_microphone_input_does_not_accumulate() {
        let (mut engine, sender) = live_engine();
        assert!(!engine.toggle_microphone(ms(0)));

        for tick in 1..=600u64 {
            sender.send(vec![0.1; 735]).unwrap();
            engine.update(ms(tick * 16));
        }

        assert_eq!(sender.len(), 0);
        assert!(engine.is_using_fallback());
    }

    #[test]
    fn test_auto_gain_boosts_quiet_input() {
        let (mut engine, sender) = live_engine();

        let mut early_volume = 0.0;
        for tick in 1..=200u64 {
            sender.send(tone(0.01)).unwrap();
            engine.update(ms(tick * 16));
            if tick == 20 {
                early_volume = engine.volume();
            }
        }

        assert!(engine.gain() > 1.0);
        assert!(early_volume > 0.0);
        assert!(engine.volume() > early_volume);
    }

    #[test]
    fn test_beats_respect_cooldown_across_sources() {
        let (device, _sender) = ChannelInputDevice::new(44_100);
        let mut engine = AudioEngine::with_device(
            &AudioSettings::default(),
            Box::new(device),
            SilenceFallbackGenerator::with_seed(5).with_beat_probability(1.0),
            ms(0),
        );

        let mut last_beat: Option<Duration> = None;
        for tick in 0..300u64 {
            let now = ms(tick * 16);
            if engine.update(now).beat {
                if let Some(prev) = last_beat {
                    assert!(now - prev >= ms(100));
                }
                last_beat = Some(now);
            }
        }
        assert!(last_beat.is_some());
    }

    #[test]
    fn test_dispose_twice_is_safe() {
        let (mut engine, _sender) = live_engine();
        engine.dispose();
        engine.dispose();
        assert!(!engine.is_microphone_enabled());
        engine.update(ms(16));
        assert!(engine.is_using_fallback());
    }
}
