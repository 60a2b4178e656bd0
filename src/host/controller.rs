// PomodoroController - command and query surface for tray hosts
//
// Wires the cycle state machine, the countdown engine and the presentation
// mapper together. Hosts call the commands from their UI thread and receive
// timer updates through a TimerObserver on the countdown worker thread.

use crate::config::SettingsRepository;
use crate::metrics::Metrics;
use crate::models::{CycleState, Phase, PhaseRequest, Settings, SettingsError, ToggleOutcome};
use crate::services::{
    Clock, CountdownEngine, CountdownError, CountdownEvent, CountdownListener, Rendered, SoundCue,
    render,
};
use crate::state::{StateChange, StateManager};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Receives timer output. Called on the countdown worker thread, except for
/// the idle view pushed by a manual stop which arrives on the caller's thread.
///
/// # Re-entrancy
///
/// Callbacks may issue controller commands. A command that restarts or stops
/// the countdown from inside a callback cannot join the worker it runs on, so
/// that worker is detached instead: it delivers nothing more for the old
/// session and exits once the callback returns. Callbacks must not block
/// waiting for the new session's ticks, which arrive on a different thread.
pub trait TimerObserver: Send + Sync {
    /// A new view to draw: each second while running and once when going idle
    fn on_tick(&self, view: &Rendered);

    /// A phase ran to zero; the idle view has already been delivered
    fn on_phase_completed(&self, phase: Phase);
}

/// Errors returned by controller commands
#[derive(Error, Debug)]
pub enum PomodoroError {
    #[error("Invalid settings: {0}")]
    InvalidSettings(#[from] SettingsError),

    #[error(transparent)]
    Countdown(#[from] CountdownError),

    #[error("Failed to persist settings")]
    Persistence(#[source] anyhow::Error),
}

/// Bridges engine events into cycle state and rendered views
struct EngineListener {
    state: StateManager,
    observer: Arc<dyn TimerObserver>,
}

impl CountdownListener for EngineListener {
    fn on_event(&self, event: CountdownEvent) {
        match event {
            CountdownEvent::Tick {
                phase,
                remaining_seconds,
            } => {
                let cycle = self.state.cycle();
                let view = render(
                    remaining_seconds,
                    cycle.completed_work_cycles,
                    phase,
                    cycle.next_phase(),
                );
                self.observer.on_tick(&view);
            }
            CountdownEvent::Completed { phase } => {
                if !self.state.complete(phase) {
                    return;
                }
                self.observer.on_tick(&idle_view(&self.state.cycle()));
                self.observer.on_phase_completed(phase);
            }
        }
    }
}

fn idle_view(cycle: &CycleState) -> Rendered {
    render(
        0,
        cycle.completed_work_cycles,
        Phase::Idle,
        cycle.next_phase(),
    )
}

/// Command/query surface of the timer core.
///
/// Every start command halts the previous worker before the cycle state is
/// touched, so a late completion from an old session cannot overwrite a newer
/// command.
///
/// # Example
/// ```ignore
/// let controller = PomodoroController::new(
///     settings,
///     Arc::new(SystemClock::new()),
///     Arc::new(LogCue),
///     Arc::new(bridge),
///     Arc::new(store),
///     metrics,
/// );
/// controller.toggle_running()?;
/// ```
pub struct PomodoroController {
    engine: CountdownEngine,
    state: StateManager,
    observer: Arc<dyn TimerObserver>,
    repository: Arc<dyn SettingsRepository>,
}

impl PomodoroController {
    pub fn new(
        settings: Settings,
        clock: Arc<dyn Clock>,
        sound: Arc<dyn SoundCue>,
        observer: Arc<dyn TimerObserver>,
        repository: Arc<dyn SettingsRepository>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let state = StateManager::with_settings(settings);
        let listener = Arc::new(EngineListener {
            state: state.clone(),
            observer: Arc::clone(&observer),
        });

        let engine = CountdownEngine::new(clock, sound, listener, metrics);
        engine.set_sound_enabled(settings.sound_enabled);

        tracing::info!(
            "Pomodoro controller initialized: work={} short={} long={} sound={}",
            settings.work_minutes,
            settings.short_break_minutes,
            settings.long_break_minutes,
            settings.sound_enabled
        );

        Self {
            engine,
            state,
            observer,
            repository,
        }
    }

    // Commands
    //
    // Starting a phase halts the running one first. If the new countdown then
    // fails to start, the halted session is lost and the cycle is left idle.

    pub fn start_work(&self) -> Result<(), PomodoroError> {
        self.begin(StateManager::start_work)
    }

    /// Start the break earned by the counter (long iff four work sessions completed)
    pub fn start_break(&self) -> Result<(), PomodoroError> {
        self.begin(StateManager::start_break)
    }

    pub fn start_long_break(&self) -> Result<(), PomodoroError> {
        self.begin(StateManager::start_long_break)
    }

    /// Single click on the tray icon: stop when running, otherwise start the next phase
    pub fn toggle_running(&self) -> Result<(), PomodoroError> {
        let was_running = self.engine.halt();
        let previous = self.state.cycle();

        match self.state.toggle(was_running) {
            ToggleOutcome::Stopped => {
                self.observer.on_tick(&idle_view(&self.state.cycle()));
                Ok(())
            }
            ToggleOutcome::Started(request) => self.launch(request, previous),
        }
    }

    /// Stop without completing. Returns `true` if a countdown was running
    pub fn stop(&self) -> bool {
        let was_running = self.engine.halt();
        let stopped = self.state.stop();

        if was_running || stopped.is_some() {
            self.observer.on_tick(&idle_view(&self.state.cycle()));
        }
        was_running
    }

    /// Validate, apply and persist a settings snapshot.
    ///
    /// A running countdown keeps its duration; new durations apply to the next
    /// phase. The sound flag takes effect on the next tick.
    pub fn update_settings(&self, settings: Settings) -> Result<(), PomodoroError> {
        settings.validate()?;

        self.state.set_settings(settings);
        self.engine.set_sound_enabled(settings.sound_enabled);

        self.repository
            .save(&settings)
            .map_err(PomodoroError::Persistence)?;

        tracing::info!("Settings updated: {:?}", settings);
        Ok(())
    }

    /// Flip the clock sound flag and persist it. Returns the new value
    pub fn toggle_sound(&self) -> Result<bool, PomodoroError> {
        let enabled = self.state.toggle_sound();
        self.engine.set_sound_enabled(enabled);

        self.repository
            .save(&self.state.settings())
            .map_err(PomodoroError::Persistence)?;

        tracing::info!("Clock sound {}", if enabled { "enabled" } else { "disabled" });
        Ok(enabled)
    }

    /// Halt the worker and log metrics. Commands still work afterwards
    pub fn shutdown(&self) {
        tracing::info!("Shutting down pomodoro controller");
        if self.engine.halt() {
            self.state.stop();
        }
        self.engine.metrics().log_summary();
    }

    // Queries

    pub fn cycle_state(&self) -> CycleState {
        self.state.cycle()
    }

    pub fn settings(&self) -> Settings {
        self.state.settings()
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.engine.remaining_seconds()
    }

    /// The view a host should show right now
    pub fn current_view(&self) -> Rendered {
        let cycle = self.state.cycle();
        if !self.engine.is_running() {
            return idle_view(&cycle);
        }

        render(
            self.engine.remaining_seconds(),
            cycle.completed_work_cycles,
            cycle.phase,
            cycle.next_phase(),
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state.subscribe()
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        self.engine.metrics()
    }

    fn begin(&self, transition: fn(&StateManager) -> PhaseRequest) -> Result<(), PomodoroError> {
        self.engine.halt();
        let previous = self.state.cycle();
        let request = transition(&self.state);
        self.launch(request, previous)
    }

    fn launch(&self, request: PhaseRequest, previous: CycleState) -> Result<(), PomodoroError> {
        if let Err(e) = self.engine.start(request.duration_minutes, request.phase) {
            tracing::error!("Could not start {}: {}", request.phase, e);
            self.state.restore_idle(previous);
            return Err(e.into());
        }
        Ok(())
    }
}

impl Drop for PomodoroController {
    fn drop(&mut self) {
        self.engine.halt();
    }
}
