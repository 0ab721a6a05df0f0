use std::collections::VecDeque;
use std::time::Duration;

/// Cooldown-gated beat detector.
///
/// A beat needs both overall loudness and bass energy above threshold, which
/// keeps broadband noise from triggering. After a beat the detector stays
/// silent for `min_beat_interval` no matter what the input does.
pub struct BeatDetector {
    beat_threshold: f32,
    low_multiplier: f32,
    min_beat_interval: Duration,
    history_window: Duration,
    last_beat_time: Option<Duration>,
    beat_history: VecDeque<Duration>,
}

impl BeatDetector {
    pub fn new() -> Self {
        Self::with_config(0.3, Duration::from_millis(100))
    }

    pub fn with_config(beat_threshold: f32, min_beat_interval: Duration) -> Self {
        Self {
            beat_threshold,
            low_multiplier: 1.2,
            min_beat_interval,
            history_window: Duration::from_millis(2000),
            last_beat_time: None,
            beat_history: VecDeque::with_capacity(32),
        }
    }

    pub fn detect_beat(&mut self, volume: f32, low_freq: f32, now: Duration) -> bool {
        if self.in_cooldown(now) {
            return false;
        }

        let beat = volume > self.beat_threshold
            && low_freq > self.beat_threshold * self.low_multiplier;
        if beat {
            self.record(now);
        }
        beat
    }

    /// Passes a beat from another source (e.g. the ambient generator) through
    /// the same cooldown gate. Returns whether it was accepted.
    pub fn register_external(&mut self, now: Duration) -> bool {
        if self.in_cooldown(now) {
            return false;
        }
        self.record(now);
        true
    }

    pub fn last_beat_time(&self) -> Option<Duration> {
        self.last_beat_time
    }

    pub fn beat_history(&self) -> &VecDeque<Duration> {
        &self.beat_history
    }

    /// Tempo implied by the retained beat history, if there are enough beats.
    pub fn estimated_bpm(&self) -> Option<f32> {
        if self.beat_history.len() < 3 {
            return None;
        }

        let first = self.beat_history.front()?;
        let last = self.beat_history.back()?;
        let span = last.saturating_sub(*first).as_secs_f32();
        if span <= 0.0 {
            return None;
        }

        let avg_interval = span / (self.beat_history.len() - 1) as f32;
        Some(60.0 / avg_interval)
    }

    pub fn reset(&mut self) {
        self.last_beat_time = None;
        self.beat_history.clear();
    }

    fn in_cooldown(&self, now: Duration) -> bool {
        match self.last_beat_time {
            Some(last) => now.saturating_sub(last) < self.min_beat_interval,
            None => false,
        }
    }

    fn record(&mut self, now: Duration) {
        self.last_beat_time = Some(now);
        self.beat_history.push_back(now);

        while let Some(&oldest) = self.beat_history.front() {
            if now.saturating_sub(oldest) > self.history_window {
                self.beat_history.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for BeatDetector {
    fn default() -> Self {
        Self::new()
    }
}
