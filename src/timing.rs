use std::time::Duration;

/// Act and transition durations for the two timing profiles.
///
/// Demo mode swaps in the compressed durations; it never changes the
/// transition phase boundaries, which are fractions of whichever duration
/// is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    act_duration: Duration,
    transition_duration: Duration,
    demo_act_duration: Duration,
    demo_transition_duration: Duration,
    demo_mode: bool,
}

impl TimingConfig {
    pub fn new(act_duration: Duration, transition_duration: Duration) -> Self {
        Self {
            act_duration,
            transition_duration: non_zero(transition_duration),
            ..Self::default()
        }
    }

    pub fn act_duration(&self) -> Duration {
        self.act_duration
    }

    pub fn transition_duration(&self) -> Duration {
        self.transition_duration
    }

    pub fn demo_act_duration(&self) -> Duration {
        self.demo_act_duration
    }

    pub fn demo_transition_duration(&self) -> Duration {
        self.demo_transition_duration
    }

    pub fn is_demo_mode(&self) -> bool {
        self.demo_mode
    }

    /// Act duration of the profile currently in force.
    pub fn active_act_duration(&self) -> Duration {
        if self.demo_mode {
            self.demo_act_duration
        } else {
            self.act_duration
        }
    }

    /// Transition duration of the profile currently in force.
    pub fn active_transition_duration(&self) -> Duration {
        if self.demo_mode {
            self.demo_transition_duration
        } else {
            self.transition_duration
        }
    }

    pub fn set_performance_timing(&mut self, act_duration: Duration, transition_duration: Duration) {
        self.act_duration = act_duration;
        self.transition_duration = non_zero(transition_duration);
    }

    pub fn set_demo_timing(&mut self, act_duration: Duration, transition_duration: Duration) {
        self.demo_act_duration = act_duration;
        self.demo_transition_duration = non_zero(transition_duration);
    }

    pub fn enable_demo_mode(&mut self, enabled: bool) {
        self.demo_mode = enabled;
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            act_duration: Duration::from_secs(180),
            transition_duration: Duration::from_millis(3000),
            demo_act_duration: Duration::from_secs(10),
            demo_transition_duration: Duration::from_millis(1000),
            demo_mode: false,
        }
    }
}

// A zero-length transition would make progress undefined
fn non_zero(duration: Duration) -> Duration {
    duration.max(Duration::from_millis(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_mode_swaps_active_durations() {
        let mut timing = TimingConfig::new(Duration::from_secs(60), Duration::from_millis(3000));
        timing.set_demo_timing(Duration::from_millis(3000), Duration::from_millis(300));

        assert_eq!(timing.active_transition_duration(), Duration::from_millis(3000));
        timing.enable_demo_mode(true);
        assert_eq!(timing.active_act_duration(), Duration::from_millis(3000));
        assert_eq!(timing.active_transition_duration(), Duration::from_millis(300));

        timing.enable_demo_mode(false);
        assert_eq!(timing.active_act_duration(), Duration::from_secs(60));
        assert_eq!(timing.active_transition_duration(), Duration::from_millis(3000));
    }

    #[test]
    fn test_zero_transition_is_clamped() {
        let mut timing = TimingConfig::default();
        timing.set_demo_timing(Duration::from_secs(1), Duration::ZERO);
        assert_eq!(timing.demo_transition_duration(), Duration::from_millis(1));
    }
}
