//! Audio-reactive core of a four-act live performance.
//!
//! [`audio::AudioEngine`] turns microphone input (or an ambient fallback
//! signal when there is none) into per-tick [`audio::AudioState`] readings.
//! [`performance::Performance`] schedules the four acts and crossfades
//! between them. The host owns both and calls `update` once per frame.

pub mod acts;
pub mod audio;
pub mod clock;
pub mod config;
pub mod error;
pub mod performance;
pub mod timing;
pub mod transition;

pub use acts::{Act, ActId, ActRegistry, StageAct};
pub use audio::{AudioEngine, AudioState};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::PerformanceConfig;
pub use error::{AudioError, ConfigError};
pub use performance::Performance;
pub use timing::TimingConfig;
pub use transition::{TransitionEvent, TransitionPhase, TransitionRequest};
