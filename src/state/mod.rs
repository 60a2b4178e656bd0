// State management module
//
// This module provides the StateManager which wraps the cycle state and the live
// settings with thread-safe access using Arc<RwLock<T>> and emits change events
// for the host.

use crate::models::{CycleState, Phase, PhaseRequest, Settings, ToggleOutcome};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Everything the command thread and the worker share besides the countdown itself
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoreState {
    pub cycle: CycleState,
    pub settings: Settings,
}

/// Change events emitted when state is modified
///
/// These events let the host refresh menu state (checked items, enabled
/// entries) without polling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateChange {
    /// A phase was entered by a command
    PhaseStarted {
        phase: Phase,
        duration_minutes: u32,
    },

    /// A phase ran to zero
    PhaseCompleted {
        phase: Phase,
        completed_work_cycles: u8,
    },

    /// A running phase was stopped by the user
    Stopped { phase: Phase },

    /// The completed work counter moved
    CycleCounterChanged { completed_work_cycles: u8 },

    /// Settings have been replaced
    SettingsChanged { settings: Settings },
}

/// Thread-safe state manager with event emission
///
/// - Provides thread-safe access to [`CoreState`] via `Arc<RwLock<T>>`
/// - Detects counter and settings changes and emits [`StateChange`] events
/// - Emits phase events explicitly from the transition helpers
/// - Supports subscribing to state changes via tokio broadcast channels
///
/// The countdown worker writes here on completion; the command thread writes
/// on start, stop and toggle.
pub struct StateManager {
    state: Arc<RwLock<CoreState>>,
    state_tx: broadcast::Sender<StateChange>,
}

impl StateManager {
    /// Create a new StateManager with `{Idle, 0}` and default settings
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        let (state_tx, _) = broadcast::channel(100);
        Self {
            state: Arc::new(RwLock::new(CoreState {
                cycle: CycleState::new(),
                settings,
            })),
            state_tx,
        }
    }

    /// Clone of the current state, safe to use without holding locks
    pub fn snapshot(&self) -> CoreState {
        self.read_lock().clone()
    }

    pub fn cycle(&self) -> CycleState {
        self.read_lock().cycle.clone()
    }

    pub fn settings(&self) -> Settings {
        self.read_lock().settings
    }

    /// Execute a function with read access to the state
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&CoreState) -> R,
    {
        let state = self.read_lock();
        f(&state)
    }

    /// Update the state and emit the detected change events
    ///
    /// Returns the events that were emitted.
    pub fn update<F>(&self, update_fn: F) -> Vec<StateChange>
    where
        F: FnOnce(&mut CoreState),
    {
        let changes = {
            let mut state = self.write_lock();
            let old_state = state.clone();
            update_fn(&mut state);
            Self::detect_changes(&old_state, &state)
        };

        for change in &changes {
            self.emit(change.clone());
        }

        changes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    fn detect_changes(old: &CoreState, new: &CoreState) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if old.cycle.completed_work_cycles != new.cycle.completed_work_cycles {
            changes.push(StateChange::CycleCounterChanged {
                completed_work_cycles: new.cycle.completed_work_cycles,
            });
        }

        if old.settings != new.settings {
            changes.push(StateChange::SettingsChanged {
                settings: new.settings,
            });
        }

        changes
    }

    fn emit(&self, change: StateChange) {
        tracing::trace!("State change: {:?}", change);
        // Ignore send errors - it's OK if no one is listening
        let _ = self.state_tx.send(change);
    }

    // Transition helpers

    /// Apply a start transition and announce the entered phase
    pub fn begin<F>(&self, transition: F) -> PhaseRequest
    where
        F: FnOnce(&mut CycleState, &Settings) -> PhaseRequest,
    {
        let request = {
            let mut state = self.write_lock();
            let settings = state.settings;
            transition(&mut state.cycle, &settings)
        };

        tracing::info!(
            "Phase started: {} ({} min)",
            request.phase,
            request.duration_minutes
        );
        self.emit(StateChange::PhaseStarted {
            phase: request.phase,
            duration_minutes: request.duration_minutes,
        });
        request
    }

    pub fn start_work(&self) -> PhaseRequest {
        self.begin(|cycle, settings| cycle.start_work(settings))
    }

    pub fn start_break(&self) -> PhaseRequest {
        self.begin(|cycle, settings| cycle.start_break(settings))
    }

    pub fn start_long_break(&self) -> PhaseRequest {
        self.begin(|cycle, settings| cycle.start_long_break(settings))
    }

    /// Resolve a tray click; `running` is whether a countdown was live
    pub fn toggle(&self, running: bool) -> ToggleOutcome {
        let (outcome, stopped_phase) = {
            let mut state = self.write_lock();
            let settings = state.settings;
            let phase = state.cycle.phase;
            (state.cycle.toggle(&settings, running), phase)
        };

        match outcome {
            ToggleOutcome::Stopped => {
                tracing::info!("Phase stopped by click: {}", stopped_phase);
                self.emit(StateChange::Stopped {
                    phase: stopped_phase,
                });
            }
            ToggleOutcome::Started(request) => {
                tracing::info!(
                    "Phase started by click: {} ({} min)",
                    request.phase,
                    request.duration_minutes
                );
                self.emit(StateChange::PhaseStarted {
                    phase: request.phase,
                    duration_minutes: request.duration_minutes,
                });
            }
        }

        outcome
    }

    /// Record a natural completion.
    ///
    /// Returns `false` if `phase` was no longer active (stale completion).
    pub fn complete(&self, phase: Phase) -> bool {
        let mut completed_work_cycles = 0;
        let changes = self.update_cycle(|cycle| {
            let applied = cycle.on_phase_completed(phase);
            completed_work_cycles = cycle.completed_work_cycles;
            applied
        });

        let Some(changes) = changes else {
            return false;
        };

        tracing::info!(
            "Phase completed: {} (completed work sessions: {})",
            phase,
            completed_work_cycles
        );
        self.emit(StateChange::PhaseCompleted {
            phase,
            completed_work_cycles,
        });
        for change in changes {
            self.emit(change);
        }
        true
    }

    /// Manual stop. Returns the phase that was active, if any
    pub fn stop(&self) -> Option<Phase> {
        let phase = {
            let mut state = self.write_lock();
            let phase = state.cycle.phase;
            state.cycle.stop();
            phase
        };

        if phase == Phase::Idle {
            return None;
        }

        self.emit(StateChange::Stopped { phase });
        Some(phase)
    }

    /// Put back a cycle captured before a start that could not run.
    ///
    /// The restored cycle is always idle since the previous countdown was
    /// already halted.
    pub fn restore_idle(&self, previous: CycleState) {
        self.update(|state| {
            state.cycle = CycleState {
                phase: Phase::Idle,
                ..previous
            };
        });
    }

    pub fn set_settings(&self, settings: Settings) -> Vec<StateChange> {
        self.update(|state| state.settings = settings)
    }

    /// Flip the sound flag and return the new value
    pub fn toggle_sound(&self) -> bool {
        let mut enabled = false;
        self.update(|state| {
            state.settings.sound_enabled = !state.settings.sound_enabled;
            enabled = state.settings.sound_enabled;
        });
        enabled
    }

    /// Run a cycle mutation, emitting detected changes only if it applied
    fn update_cycle<F>(&self, f: F) -> Option<Vec<StateChange>>
    where
        F: FnOnce(&mut CycleState) -> bool,
    {
        let mut state = self.write_lock();
        let old_state = state.clone();
        if !f(&mut state.cycle) {
            return None;
        }
        Some(Self::detect_changes(&old_state, &state))
    }

    fn read_lock(&self) -> RwLockReadGuard<'_, CoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_lock(&self) -> RwLockWriteGuard<'_, CoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

// Cloning shares the same state and channel
impl Clone for StateManager {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            state_tx: self.state_tx.clone(),
        }
    }
}
