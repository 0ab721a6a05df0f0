use std::time::Duration;

use super::{Act, TransitionDirection};
use crate::audio::AudioState;

/// Where an act is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActStage {
    Uninitialized,
    Dormant,
    Preparing,
    Entering,
    Active,
    Exiting,
    Leaving,
    Disposed,
}

/// Act that keeps the render-facing state for one scene.
///
/// Tracks lifecycle stage, visibility, opacity and two audio-driven values a
/// renderer can read each frame: `intensity` (smoothed volume with a kick on
/// every beat) and `background_phase` (a slow clock that runs even while the
/// act is hidden, so scenery doesn't restart on entry).
#[derive(Debug, Clone)]
pub struct StageAct {
    title: String,
    stage: ActStage,
    visible: bool,
    opacity: f32,
    transition_progress: f32,
    transition_direction: Option<TransitionDirection>,
    intensity: f32,
    bass: f32,
    background_phase: f32,
    last_time: Option<Duration>,
    last_background_time: Option<Duration>,
}

const BEAT_KICK: f32 = 0.5;
const INTENSITY_DECAY: f32 = 0.9;
const BACKGROUND_SPEED: f32 = 0.1;

impl StageAct {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            stage: ActStage::Uninitialized,
            visible: false,
            opacity: 0.0,
            transition_progress: 0.0,
            transition_direction: None,
            intensity: 0.0,
            bass: 0.0,
            background_phase: 0.0,
            last_time: None,
            last_background_time: None,
        }
    }

    pub fn stage(&self) -> ActStage {
        self.stage
    }

    pub fn intensity(&self) -> f32 {
        self.intensity
    }

    pub fn bass(&self) -> f32 {
        self.bass
    }

    pub fn background_phase(&self) -> f32 {
        self.background_phase
    }

    pub fn transition(&self) -> Option<(f32, TransitionDirection)> {
        self.transition_direction
            .map(|direction| (self.transition_progress, direction))
    }
}

impl Act for StageAct {
    fn title(&self) -> &str {
        &self.title
    }

    fn init(&mut self) {
        if self.stage == ActStage::Uninitialized {
            self.stage = ActStage::Dormant;
        }
    }

    fn enter(&mut self) {
        self.stage = ActStage::Active;
        self.visible = true;
        self.opacity = 1.0;
        self.transition_direction = None;
        self.transition_progress = 0.0;
    }

    fn exit(&mut self) {
        self.stage = ActStage::Dormant;
        self.visible = false;
        self.opacity = 0.0;
        self.transition_direction = None;
        self.transition_progress = 0.0;
    }

    fn start_exit(&mut self) {
        self.stage = ActStage::Exiting;
    }

    fn prepare_entry(&mut self) {
        self.stage = ActStage::Preparing;
        self.opacity = 0.0;
        self.intensity = 0.0;
    }

    fn start_entry(&mut self) {
        self.stage = ActStage::Entering;
    }

    fn finish_exit(&mut self) {
        self.stage = ActStage::Leaving;
    }

    fn update_transition(&mut self, progress: f32, direction: TransitionDirection) {
        self.transition_progress = progress.clamp(0.0, 1.0);
        self.transition_direction = Some(direction);
    }

    fn update(&mut self, time: Duration, audio: &AudioState) {
        self.last_time = Some(time);
        self.bass = audio.low_freq;

        let kick = if audio.beat { BEAT_KICK } else { 0.0 };
        let target = audio.volume + kick;
        self.intensity = if target > self.intensity {
            target
        } else {
            self.intensity * INTENSITY_DECAY + target * (1.0 - INTENSITY_DECAY)
        };
        self.intensity = self.intensity.clamp(0.0, 1.5);
    }

    fn update_background(&mut self, time: Duration) {
        if let Some(last) = self.last_background_time {
            let dt = time.saturating_sub(last).as_secs_f32();
            self.background_phase = (self.background_phase + dt * BACKGROUND_SPEED).fract();
        }
        self.last_background_time = Some(time);
    }

    fn dispose(&mut self) {
        self.stage = ActStage::Disposed;
        self.visible = false;
        self.opacity = 0.0;
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }

    fn opacity(&self) -> f32 {
        self.opacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_stages() {
        let mut act = StageAct::new("Test");
        act.init();
        assert_eq!(act.stage(), ActStage::Dormant);

        act.prepare_entry();
        act.start_entry();
        assert_eq!(act.stage(), ActStage::Entering);

        act.enter();
        assert_eq!(act.stage(), ActStage::Active);
        assert!(act.is_visible());
        assert_eq!(act.opacity(), 1.0);

        act.start_exit();
        act.finish_exit();
        act.exit();
        assert_eq!(act.stage(), ActStage::Dormant);
        assert!(!act.is_visible());
    }

    #[test]
    fn test_beat_kicks_intensity_then_decays() {
        let mut act = StageAct::new("Test");
        let quiet = AudioState {
            volume: 0.2,
            ..AudioState::default()
        };
        let beat = AudioState {
            beat: true,
            ..quiet
        };

        act.update(Duration::from_millis(0), &quiet);
        assert!((act.intensity() - 0.2).abs() < 1e-6);

        act.update(Duration::from_millis(16), &beat);
        assert!((act.intensity() - 0.7).abs() < 1e-6);

        act.update(Duration::from_millis(32), &quiet);
        assert!(act.intensity() < 0.7 && act.intensity() > 0.2);
    }

    #[test]
    fn test_background_phase_wraps() {
        let mut act = StageAct::new("Test");
        act.update_background(Duration::from_secs(0));
        act.update_background(Duration::from_secs(5));
        assert!((act.background_phase() - 0.5).abs() < 1e-6);

        act.update_background(Duration::from_secs(12));
        assert!((act.background_phase() - 0.2).abs() < 1e-5);
    }
}
