use std::time::Duration;

use super::{Act, ActId, StageAct};
use crate::audio::AudioState;

const DEFAULT_TITLES: [&str; 4] = ["Awakening", "Pulse", "Storm", "Stillness"];

/// Fixed set of the four acts, indexed by `ActId`.
pub struct ActRegistry {
    acts: [Box<dyn Act>; 4],
}

impl ActRegistry {
    pub fn new(acts: [Box<dyn Act>; 4]) -> Self {
        Self { acts }
    }

    /// Registry of plain `StageAct`s with the default titles.
    pub fn with_stage_acts() -> Self {
        Self::new(DEFAULT_TITLES.map(|title| Box::new(StageAct::new(title)) as Box<dyn Act>))
    }

    pub fn get(&self, id: ActId) -> &dyn Act {
        self.acts[id.index()].as_ref()
    }

    pub fn get_mut(&mut self, id: ActId) -> &mut dyn Act {
        self.acts[id.index()].as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActId, &dyn Act)> {
        ActId::ALL
            .into_iter()
            .zip(self.acts.iter().map(|act| act.as_ref()))
    }

    pub fn init_all(&mut self) {
        for act in self.acts.iter_mut() {
            act.init();
            act.set_visible(false);
            act.set_opacity(0.0);
        }
    }

    /// Frame update: visible acts get the audio, every act advances its background.
    pub fn update(&mut self, time: Duration, audio: &AudioState) {
        for act in self.acts.iter_mut() {
            if act.is_visible() {
                act.update(time, audio);
            }
            act.update_background(time);
        }
    }

    pub fn dispose_all(&mut self) {
        for act in self.acts.iter_mut() {
            act.dispose();
        }
    }
}

impl Default for ActRegistry {
    fn default() -> Self {
        Self::with_stage_acts()
    }
}
