//! The four acts and the lifecycle contract the scheduler drives.
//!
//! What an act draws is up to the renderer. The core only calls the
//! lifecycle hooks below at fixed points of a transition and sets
//! visibility and opacity; it never looks inside an act.

pub mod registry;
pub mod stage;

use std::fmt;
use std::time::Duration;

use crate::audio::AudioState;

pub use registry::ActRegistry;
pub use stage::{ActStage, StageAct};

/// Identity of one of the four acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActId {
    One,
    Two,
    Three,
    Four,
}

impl ActId {
    pub const ALL: [ActId; 4] = [ActId::One, ActId::Two, ActId::Three, ActId::Four];

    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn index(self) -> usize {
        match self {
            ActId::One => 0,
            ActId::Two => 1,
            ActId::Three => 2,
            ActId::Four => 3,
        }
    }

    /// The following act, or `None` after the last one.
    pub fn next(self) -> Option<ActId> {
        Self::ALL.get(self.index() + 1).copied()
    }

    /// The following act, wrapping from the last back to the first.
    pub fn next_wrapping(self) -> ActId {
        self.next().unwrap_or(ActId::One)
    }
}

impl TryFrom<u8> for ActId {
    type Error = InvalidActId;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        match number {
            1 => Ok(ActId::One),
            2 => Ok(ActId::Two),
            3 => Ok(ActId::Three),
            4 => Ok(ActId::Four),
            other => Err(InvalidActId(other)),
        }
    }
}

impl fmt::Display for ActId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Act {}", self.number())
    }
}

/// A number that doesn't name one of the four acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("no act numbered {0}")]
pub struct InvalidActId(pub u8);

/// Which side of a crossfade an act is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDirection {
    Enter,
    Exit,
}

/// Lifecycle contract every act implements.
///
/// During a transition from A to B the scheduler calls, in order:
/// `A.start_exit`, `B.prepare_entry`, `B.start_entry` (a quarter of the way
/// in), `A.finish_exit` (three quarters in), then `A.exit` and `B.enter`.
pub trait Act {
    fn title(&self) -> &str;

    /// One-time setup before the act is first shown.
    fn init(&mut self);

    /// The act is now the only one on stage.
    fn enter(&mut self);

    /// The act has fully left the stage.
    fn exit(&mut self);

    fn start_exit(&mut self);

    /// Called before the crossfade starts, while the act is still invisible.
    fn prepare_entry(&mut self);

    fn start_entry(&mut self);

    fn finish_exit(&mut self);

    /// Crossfade progress for this act, 0.0-1.0 in its own direction.
    fn update_transition(&mut self, progress: f32, direction: TransitionDirection);

    /// Per-frame update while visible.
    fn update(&mut self, time: Duration, audio: &AudioState);

    /// Per-frame update for scenery that keeps moving while hidden.
    fn update_background(&mut self, time: Duration);

    fn dispose(&mut self);

    fn set_visible(&mut self, visible: bool);

    fn is_visible(&self) -> bool;

    /// Opacity of the act's drawable group.
    fn set_opacity(&mut self, opacity: f32);

    fn opacity(&self) -> f32;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_act_numbers_round_trip() {
        for id in ActId::ALL {
            assert_eq!(ActId::try_from(id.number()), Ok(id));
        }
        assert_eq!(ActId::try_from(0), Err(InvalidActId(0)));
        assert_eq!(ActId::try_from(5), Err(InvalidActId(5)));
    }

    #[test]
    fn test_next_act() {
        assert_eq!(ActId::One.next(), Some(ActId::Two));
        assert_eq!(ActId::Four.next(), None);
        assert_eq!(ActId::Four.next_wrapping(), ActId::One);
        assert_eq!(ActId::Three.to_string(), "Act 3");
    }
}
