//! Crossfade state machine between acts.
//!
//! A transition runs `Idle → FadeOut → Transition → FadeIn → Idle`, with the
//! phase boundaries at 25%, 75% and 100% of the active transition duration.
//! Opacity is blended separately from an eased progress so the outgoing and
//! incoming acts overlap on screen instead of cutting at the midpoint.

use log::{debug, info, trace, warn};
use std::time::Duration;

use crate::acts::{ActId, ActRegistry, TransitionDirection};
use crate::timing::TimingConfig;

const FADE_OUT_END: f64 = 0.25;
const TRANSITION_END: f64 = 0.75;

/// Eased progress at which the outgoing act is fully transparent.
const EXIT_SPAN: f32 = 0.5;
/// Eased progress at which the incoming act starts to appear.
const ENTRY_START: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionPhase {
    Idle,
    FadeOut,
    Transition,
    FadeIn,
}

/// Snapshot of the scheduler. `previous_act` and `next_act` are only set
/// while a transition is in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionState {
    pub phase: TransitionPhase,
    pub progress: f32,
    pub previous_act: Option<ActId>,
    pub next_act: Option<ActId>,
    pub start_time: Duration,
    pub current_act: ActId,
}

/// Outcome of a transition request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRequest {
    Started,
    /// The target is already the current act
    AlreadyCurrent,
    /// Another transition is in flight; requests are not queued
    Busy,
    /// No act has this number
    InvalidTarget(u8),
    /// The performance has been torn down
    Disposed,
}

/// Something that happened during an `update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    PhaseChanged {
        from: TransitionPhase,
        to: TransitionPhase,
    },
    /// The reported current act flipped (at the end of the fade-out)
    CurrentActChanged { from: ActId, to: ActId },
    Completed { from: ActId, to: ActId, at: Duration },
}

pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

/// Opacities of the outgoing and incoming act for a raw progress value.
pub fn crossfade_opacities(progress: f32) -> (f32, f32) {
    let eased = ease_in_out_cubic(progress);
    let exit = (eased / EXIT_SPAN).clamp(0.0, 1.0);
    let entry = if eased > ENTRY_START {
        ((eased - ENTRY_START) / (1.0 - ENTRY_START)).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (1.0 - exit, entry)
}

pub struct TransitionScheduler {
    registry: ActRegistry,
    state: TransitionState,
}

impl TransitionScheduler {
    /// Initializes every act and enters `initial`.
    pub fn new(mut registry: ActRegistry, initial: ActId) -> Self {
        registry.init_all();
        registry.get_mut(initial).enter();
        info!("🎭 Performance opens on {} ({})", initial, registry.get(initial).title());

        Self {
            registry,
            state: TransitionState {
                phase: TransitionPhase::Idle,
                progress: 0.0,
                previous_act: None,
                next_act: None,
                start_time: Duration::ZERO,
                current_act: initial,
            },
        }
    }

    /// Transition by act number, as received from a host or control surface.
    pub fn request_act(&mut self, number: u8, now: Duration) -> TransitionRequest {
        match ActId::try_from(number) {
            Ok(target) => self.transition_to_act(target, now),
            Err(err) => {
                warn!("Ignoring transition request: {}", err);
                TransitionRequest::InvalidTarget(number)
            }
        }
    }

    pub fn transition_to_act(&mut self, target: ActId, now: Duration) -> TransitionRequest {
        if target == self.state.current_act {
            return TransitionRequest::AlreadyCurrent;
        }
        if self.state.phase != TransitionPhase::Idle {
            trace!("Transition to {} rejected, one is already running", target);
            return TransitionRequest::Busy;
        }

        let previous = self.state.current_act;
        self.state.previous_act = Some(previous);
        self.state.next_act = Some(target);
        self.state.phase = TransitionPhase::FadeOut;
        self.state.progress = 0.0;
        self.state.start_time = now;

        self.registry.get_mut(previous).start_exit();
        let next = self.registry.get_mut(target);
        next.prepare_entry();
        next.set_opacity(0.0);
        next.set_visible(true);

        info!("🎬 Transition {} → {}", previous, target);
        TransitionRequest::Started
    }

    /// Advances an in-flight transition. Does nothing while idle.
    pub fn update(&mut self, now: Duration, timing: &TimingConfig) -> Vec<TransitionEvent> {
        let mut events = Vec::new();
        let (Some(previous), Some(next)) = (self.state.previous_act, self.state.next_act) else {
            return events;
        };
        if self.state.phase == TransitionPhase::Idle {
            return events;
        }

        let duration = timing.active_transition_duration();
        let elapsed = now.saturating_sub(self.state.start_time);
        let progress = if duration.is_zero() {
            1.0
        } else {
            (elapsed.as_nanos() as f64 / duration.as_nanos() as f64).clamp(0.0, 1.0)
        };
        self.state.progress = progress as f32;

        self.apply_crossfade(previous, next);

        if self.state.phase == TransitionPhase::FadeOut && progress >= FADE_OUT_END {
            self.registry.get_mut(next).start_entry();
            self.state.current_act = next;
            self.set_phase(TransitionPhase::Transition, &mut events);
            events.push(TransitionEvent::CurrentActChanged {
                from: previous,
                to: next,
            });
        }

        if self.state.phase == TransitionPhase::Transition && progress >= TRANSITION_END {
            self.registry.get_mut(previous).finish_exit();
            self.set_phase(TransitionPhase::FadeIn, &mut events);
        }

        if self.state.phase == TransitionPhase::FadeIn && progress >= 1.0 {
            self.registry.get_mut(previous).exit();
            self.registry.get_mut(next).enter();

            self.state.previous_act = None;
            self.state.next_act = None;
            self.state.progress = 0.0;
            self.set_phase(TransitionPhase::Idle, &mut events);
            events.push(TransitionEvent::Completed {
                from: previous,
                to: next,
                at: now,
            });
            info!("✅ Now playing {} ({})", next, self.registry.get(next).title());
        }

        events
    }

    fn apply_crossfade(&mut self, previous: ActId, next: ActId) {
        let (previous_opacity, next_opacity) = crossfade_opacities(self.state.progress);

        let outgoing = self.registry.get_mut(previous);
        outgoing.set_opacity(previous_opacity);
        outgoing.update_transition(1.0 - previous_opacity, TransitionDirection::Exit);

        let incoming = self.registry.get_mut(next);
        incoming.set_opacity(next_opacity);
        incoming.update_transition(next_opacity, TransitionDirection::Enter);
    }

    fn set_phase(&mut self, phase: TransitionPhase, events: &mut Vec<TransitionEvent>) {
        let from = self.state.phase;
        self.state.phase = phase;
        debug!(
            "Transition phase {:?} → {:?} at {:.3}",
            from, phase, self.state.progress
        );
        events.push(TransitionEvent::PhaseChanged { from, to: phase });
    }

    /// Opacities of the outgoing and incoming acts, while a transition runs.
    pub fn opacities(&self) -> Option<(f32, f32)> {
        let (previous, next) = (self.state.previous_act?, self.state.next_act?);
        Some((
            self.registry.get(previous).opacity(),
            self.registry.get(next).opacity(),
        ))
    }

    pub fn state(&self) -> &TransitionState {
        &self.state
    }

    pub fn phase(&self) -> TransitionPhase {
        self.state.phase
    }

    pub fn current_act(&self) -> ActId {
        self.state.current_act
    }

    pub fn current_act_number(&self) -> u8 {
        self.state.current_act.number()
    }

    pub fn transition_progress(&self) -> f32 {
        self.state.progress
    }

    pub fn is_in_transition(&self) -> bool {
        self.state.phase != TransitionPhase::Idle
    }

    pub fn registry(&self) -> &ActRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ActRegistry {
        &mut self.registry
    }

    /// Disposes every act and drops any in-flight transition.
    pub fn dispose(&mut self) {
        self.registry.dispose_all();
        self.state.phase = TransitionPhase::Idle;
        self.state.previous_act = None;
        self.state.next_act = None;
        self.state.progress = 0.0;
    }
}
