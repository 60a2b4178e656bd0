use serde::{Deserialize, Serialize};
use std::fmt;

use super::settings::Settings;

/// Number of completed work sessions that earns a long break.
///
/// The counter never exceeds this value; the next work completion wraps it to 1.
pub const CYCLES_PER_LONG_BREAK: u8 = 4;

/// Current mode of the pomodoro cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Idle,
    Work,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn is_break(self) -> bool {
        matches!(self, Phase::ShortBreak | Phase::LongBreak)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Work => "work",
            Phase::ShortBreak => "short break",
            Phase::LongBreak => "long break",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A countdown the state machine wants the engine to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseRequest {
    pub phase: Phase,
    pub duration_minutes: u32,
}

/// What a single click on the tray icon resolved to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// A running countdown was stopped without counting as completed
    Stopped,
    /// The next phase was started from idle
    Started(PhaseRequest),
}

/// Pomodoro cycle state machine.
///
/// Tracks the active phase and the number of completed work sessions since the
/// last long break. All transitions are in-process mutations that cannot fail,
/// so nothing here is retried or rolled back.
///
/// The thread-safe wrapper lives in [`crate::state::StateManager`]; this type is
/// plain data so it can be tested without any synchronization.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct CycleState {
    pub phase: Phase,

    /// Completed work sessions, 0 before the first one and 1..=4 afterwards
    pub completed_work_cycles: u8,

    /// Most recently started phase, kept across stops and completions
    pub last_started: Option<Phase>,
}

impl CycleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter [`Phase::Work`] and request a countdown of `work_minutes`
    pub fn start_work(&mut self, settings: &Settings) -> PhaseRequest {
        self.begin(Phase::Work, settings.work_minutes)
    }

    /// Enter the break earned by the current counter.
    ///
    /// A long break is selected iff four work sessions have completed,
    /// otherwise a short break.
    pub fn start_break(&mut self, settings: &Settings) -> PhaseRequest {
        match self.break_phase() {
            Phase::LongBreak => self.begin(Phase::LongBreak, settings.long_break_minutes),
            _ => self.begin(Phase::ShortBreak, settings.short_break_minutes),
        }
    }

    /// Enter a long break regardless of the counter (explicit menu command)
    pub fn start_long_break(&mut self, settings: &Settings) -> PhaseRequest {
        self.begin(Phase::LongBreak, settings.long_break_minutes)
    }

    /// Break kind the current counter earns
    pub fn break_phase(&self) -> Phase {
        if self.completed_work_cycles == CYCLES_PER_LONG_BREAK {
            Phase::LongBreak
        } else {
            Phase::ShortBreak
        }
    }

    /// Phase a click would start from idle.
    ///
    /// Work when nothing has run yet or the last started phase was a break,
    /// otherwise the break following the last work session.
    pub fn next_phase(&self) -> Phase {
        match self.last_started {
            Some(Phase::Work) => self.break_phase(),
            _ => Phase::Work,
        }
    }

    /// Record the natural end of `finished`.
    ///
    /// Work completions advance the counter, wrapping 4 back to 1. The phase
    /// always returns to idle. A completion for a phase that is no longer
    /// active is ignored and `false` is returned.
    pub fn on_phase_completed(&mut self, finished: Phase) -> bool {
        if finished == Phase::Idle || self.phase != finished {
            tracing::debug!(
                "Ignoring completion of {} while in {}",
                finished,
                self.phase
            );
            return false;
        }

        if finished == Phase::Work {
            self.completed_work_cycles = if self.completed_work_cycles >= CYCLES_PER_LONG_BREAK {
                1
            } else {
                self.completed_work_cycles + 1
            };
        }

        self.phase = Phase::Idle;
        true
    }

    /// Manual stop; never counts as a completion
    pub fn stop(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Single-click contract: stop when running, otherwise start the next phase.
    ///
    /// The break length is chosen from the counter as it stands at click time.
    /// After a naturally completed work session that counter already includes
    /// it; after a manually stopped one it does not.
    pub fn toggle(&mut self, settings: &Settings, running: bool) -> ToggleOutcome {
        if running {
            self.stop();
            return ToggleOutcome::Stopped;
        }

        let request = match self.next_phase() {
            Phase::Work => self.start_work(settings),
            _ => self.start_break(settings),
        };
        ToggleOutcome::Started(request)
    }

    pub fn is_active(&self) -> bool {
        self.phase != Phase::Idle
    }

    fn begin(&mut self, phase: Phase, duration_minutes: u32) -> PhaseRequest {
        self.phase = phase;
        self.last_started = Some(phase);
        PhaseRequest {
            phase,
            duration_minutes,
        }
    }
}
