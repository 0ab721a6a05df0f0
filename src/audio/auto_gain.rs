/// Below this raw volume the input is treated as silence.
pub const SILENCE_FLOOR: f32 = 0.001;
/// Per-tick decay applied to an oversized gain while the input is silent.
const SILENT_DECAY: f32 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainState {
    pub current_gain: f32,
    pub target_volume: f32,
    pub adjustment_speed: f32,
}

/// Slow feedback loop pulling the input gain toward a target loudness.
///
/// Each tick computes a desired gain from the measured volume and then moves
/// only `adjustment_speed` of the way there, so the loop settles over roughly
/// a hundred ticks without audible or visible pumping.
#[derive(Debug, Clone)]
pub struct AutoGainController {
    state: GainState,
    min_gain: f32,
    max_gain: f32,
    enabled: bool,
}

impl AutoGainController {
    pub fn new(target_volume: f32, adjustment_speed: f32, min_gain: f32, max_gain: f32) -> Self {
        let (min_gain, max_gain) = if min_gain <= max_gain {
            (min_gain, max_gain)
        } else {
            (max_gain, min_gain)
        };

        Self {
            state: GainState {
                current_gain: 1.0f32.clamp(min_gain, max_gain),
                target_volume,
                adjustment_speed: adjustment_speed.clamp(0.0, 1.0),
            },
            min_gain,
            max_gain,
            enabled: true,
        }
    }

    /// Feeds one raw volume reading and returns the new gain.
    pub fn update(&mut self, raw_volume: f32) -> f32 {
        if !self.enabled {
            return self.state.current_gain;
        }

        let current = self.state.current_gain;
        let desired = if raw_volume > SILENCE_FLOOR {
            current * (self.state.target_volume / raw_volume).sqrt()
        } else if current > self.state.target_volume {
            current * SILENT_DECAY
        } else {
            current
        };
        let desired = desired.clamp(self.min_gain, self.max_gain);

        let next = current + (desired - current) * self.state.adjustment_speed;
        self.state.current_gain = next.clamp(self.min_gain, self.max_gain);
        self.state.current_gain
    }

    pub fn gain(&self) -> f32 {
        self.state.current_gain
    }

    pub fn state(&self) -> &GainState {
        &self.state
    }

    pub fn bounds(&self) -> (f32, f32) {
        (self.min_gain, self.max_gain)
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_target_volume(&mut self, target_volume: f32) {
        self.state.target_volume = target_volume.max(0.0);
    }
}

impl Default for AutoGainController {
    fn default() -> Self {
        Self::new(0.3, 0.01, 0.1, 50.0)
    }
}
