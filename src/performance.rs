use log::{debug, info};
use std::time::Duration;

use crate::acts::{ActId, ActRegistry};
use crate::audio::AudioState;
use crate::config::TimingSettings;
use crate::timing::TimingConfig;
use crate::transition::{TransitionEvent, TransitionRequest, TransitionScheduler};

#[derive(Debug, Clone, Copy)]
struct AutoAdvance {
    enabled: bool,
    looped: bool,
    /// When the current act started counting
    baseline: Duration,
}

/// The four-act show: scheduler, timing profile and automatic act progression.
///
/// The host calls `update` once per frame with the current time and the
/// latest audio reading. Everything else is a control input.
pub struct Performance {
    scheduler: TransitionScheduler,
    timing: TimingConfig,
    auto_advance: AutoAdvance,
    disposed: bool,
}

impl Performance {
    pub fn new(registry: ActRegistry, timing: TimingConfig, initial: ActId, now: Duration) -> Self {
        Self {
            scheduler: TransitionScheduler::new(registry, initial),
            timing,
            auto_advance: AutoAdvance {
                enabled: true,
                looped: false,
                baseline: now,
            },
            disposed: false,
        }
    }

    /// Builds a performance from the timing section of the config file.
    ///
    /// An out-of-range `start_act` falls back to act 1.
    pub fn from_settings(settings: &TimingSettings, registry: ActRegistry, now: Duration) -> Self {
        let initial = ActId::try_from(settings.start_act).unwrap_or(ActId::One);
        let mut performance = Self::new(registry, settings.timing_config(), initial, now);
        performance.auto_advance.enabled = settings.auto_advance;
        performance.auto_advance.looped = settings.looped;
        performance
    }

    pub fn transition_to_act(&mut self, number: u8, now: Duration) -> TransitionRequest {
        if self.disposed {
            return TransitionRequest::Disposed;
        }
        self.scheduler.request_act(number, now)
    }

    /// Per-frame tick.
    pub fn update(&mut self, now: Duration, audio: &AudioState) -> Vec<TransitionEvent> {
        if self.disposed {
            return Vec::new();
        }

        self.check_auto_advance(now);

        let events = self.scheduler.update(now, &self.timing);
        for event in &events {
            if let TransitionEvent::Completed { at, .. } = event {
                self.auto_advance.baseline = *at;
            }
        }

        self.scheduler.registry_mut().update(now, audio);
        events
    }

    fn check_auto_advance(&mut self, now: Duration) {
        if !self.auto_advance.enabled || self.scheduler.is_in_transition() {
            return;
        }

        let elapsed = now.saturating_sub(self.auto_advance.baseline);
        if elapsed <= self.timing.active_act_duration() {
            return;
        }

        let current = self.scheduler.current_act();
        let next = if self.auto_advance.looped {
            Some(current.next_wrapping())
        } else {
            current.next()
        };

        if let Some(next) = next {
            debug!("{} ran {:.1}s, advancing", current, elapsed.as_secs_f32());
            self.scheduler.transition_to_act(next, now);
        }
    }

    pub fn current_act_number(&self) -> u8 {
        self.scheduler.current_act_number()
    }

    pub fn current_act(&self) -> ActId {
        self.scheduler.current_act()
    }

    pub fn transition_progress(&self) -> f32 {
        self.scheduler.transition_progress()
    }

    pub fn is_in_transition(&self) -> bool {
        self.scheduler.is_in_transition()
    }

    pub fn enable_demo_mode(&mut self, enabled: bool) {
        self.timing.enable_demo_mode(enabled);
        info!(
            "⏱️  {} timing: {:.1}s acts, {}ms transitions",
            if enabled { "Demo" } else { "Performance" },
            self.timing.active_act_duration().as_secs_f32(),
            self.timing.active_transition_duration().as_millis()
        );
    }

    pub fn set_demo_timing(&mut self, act_ms: u64, transition_ms: u64) {
        self.timing.set_demo_timing(
            Duration::from_millis(act_ms),
            Duration::from_millis(transition_ms),
        );
    }

    /// Demo timing, looping through all acts from act 1.
    pub fn start_quick_demo(&mut self, now: Duration) {
        self.enable_demo_mode(true);
        self.auto_advance.enabled = true;
        self.auto_advance.looped = true;
        self.auto_advance.baseline = now;

        if self.scheduler.current_act() != ActId::One {
            self.scheduler.transition_to_act(ActId::One, now);
        }
    }

    pub fn stop_demo(&mut self) {
        self.enable_demo_mode(false);
        self.auto_advance.looped = false;
    }

    pub fn set_auto_advance(&mut self, enabled: bool, now: Duration) {
        self.auto_advance.enabled = enabled;
        self.auto_advance.baseline = now;
    }

    pub fn set_looped(&mut self, looped: bool) {
        self.auto_advance.looped = looped;
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn scheduler(&self) -> &TransitionScheduler {
        &self.scheduler
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.scheduler.dispose();
        info!("Performance disposed");
    }
}
