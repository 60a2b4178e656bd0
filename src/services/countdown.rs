use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

use super::clock::{CancelToken, Clock};
use super::sound::{SoundCue, SoundError};
use crate::metrics::Metrics;
use crate::models::Phase;

/// Cadence of the countdown
pub const TICK: Duration = Duration::from_secs(1);

/// Seconds at the end of a phase that get an individual beep
pub const COUNTDOWN_BEEP_SECONDS: u32 = 10;

/// Event emitted by the countdown worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEvent {
    /// One second elapsed; `remaining_seconds` is never zero here
    Tick { phase: Phase, remaining_seconds: u32 },

    /// The phase ran to zero. Never emitted after a manual stop
    Completed { phase: Phase },
}

/// Receives countdown events on the worker thread.
///
/// Implementations must not call back into [`CountdownEngine::start`] or
/// [`CountdownEngine::halt`]; the worker would be asked to join itself.
pub trait CountdownListener: Send + Sync {
    fn on_event(&self, event: CountdownEvent);
}

impl<F> CountdownListener for F
where
    F: Fn(CountdownEvent) + Send + Sync,
{
    fn on_event(&self, event: CountdownEvent) {
        self(event)
    }
}

/// Errors that can occur when starting a countdown
#[derive(Error, Debug)]
pub enum CountdownError {
    #[error("Countdown duration must be at least one minute")]
    ZeroDuration,

    #[error("Failed to spawn countdown worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

/// The single active countdown, guarded by one mutex.
///
/// `running` and `remaining_seconds` are read by the worker every tick and
/// written by the command thread on stop, so both live under the same lock.
/// `generation` identifies the worker that owns the session; 0 means none.
#[derive(Debug, Clone, Copy, Default)]
struct Session {
    remaining_seconds: u32,
    running: bool,
    phase: Phase,
    generation: u64,
}

struct Worker {
    handle: JoinHandle<()>,
    cancel: CancelToken,
    detached: Arc<AtomicBool>,
}

/// Owns the countdown session and its one background worker.
///
/// # Guarantees
///
/// - At most one worker exists at a time: [`start`](Self::start) stops and joins
///   the previous worker before spawning the next one
/// - A stopped session never emits [`CountdownEvent::Completed`]
/// - Ticks target absolute one-second deadlines; an overrun resynchronizes the
///   deadline instead of firing catch-up ticks
///
/// Sound hooks are fire-and-forget. Their errors are logged and counted, never
/// returned.
pub struct CountdownEngine {
    session: Arc<Mutex<Session>>,
    worker: Mutex<Option<Worker>>,
    next_generation: AtomicU64,
    sound_enabled: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
    sound: Arc<dyn SoundCue>,
    listener: Arc<dyn CountdownListener>,
    metrics: Arc<Metrics>,

    #[cfg(test)]
    pub(crate) fail_next_spawn: AtomicBool,
}

impl CountdownEngine {
    pub fn new(
        clock: Arc<dyn Clock>,
        sound: Arc<dyn SoundCue>,
        listener: Arc<dyn CountdownListener>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(Session::default())),
            worker: Mutex::new(None),
            next_generation: AtomicU64::new(1),
            sound_enabled: Arc::new(AtomicBool::new(true)),
            clock,
            sound,
            listener,
            metrics,
            #[cfg(test)]
            fail_next_spawn: AtomicBool::new(false),
        }
    }

    /// Start a countdown of `duration_minutes` for `phase`.
    ///
    /// Any running session is cancelled and its worker joined first.
    ///
    /// # Errors
    ///
    /// [`CountdownError::WorkerSpawn`] if the new worker thread cannot be
    /// spawned. The previously running session is lost in that case: the
    /// engine is left idle and the old countdown is not resumed or retried.
    ///
    /// May be called from a listener on the worker thread. The calling worker
    /// is then detached instead of joined and exits as soon as the listener
    /// returns, without touching the new session.
    pub fn start(&self, duration_minutes: u32, phase: Phase) -> Result<(), CountdownError> {
        if duration_minutes == 0 {
            return Err(CountdownError::ZeroDuration);
        }

        let mut slot = self.lock_worker();
        self.halt_locked(&mut slot);

        let total_seconds = duration_minutes.saturating_mul(60);
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        *self.lock_session() = Session {
            remaining_seconds: total_seconds,
            running: true,
            phase,
            generation,
        };

        let cancel = CancelToken::new();
        let detached = Arc::new(AtomicBool::new(false));
        let context = WorkerContext {
            session: Arc::clone(&self.session),
            generation,
            cancel: cancel.clone(),
            detached: Arc::clone(&detached),
            sound_enabled: Arc::clone(&self.sound_enabled),
            clock: Arc::clone(&self.clock),
            sound: Arc::clone(&self.sound),
            listener: Arc::clone(&self.listener),
            metrics: Arc::clone(&self.metrics),
        };

        match self.spawn_worker(context) {
            Ok(handle) => {
                tracing::info!(
                    "Countdown started: {} for {} min ({}s)",
                    phase,
                    duration_minutes,
                    total_seconds
                );
                *slot = Some(Worker {
                    handle,
                    cancel,
                    detached,
                });
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to spawn countdown worker: {}", e);
                *self.lock_session() = Session::default();
                Err(CountdownError::WorkerSpawn(e))
            }
        }
    }

    /// Request the running session to stop.
    ///
    /// The worker wakes and exits without a completion event. Does not wait for
    /// it; the next [`start`](Self::start) or [`halt`](Self::halt) joins it.
    /// Returns `true` if a running session was stopped.
    pub fn stop(&self) -> bool {
        let was_running = self.mark_stopped();
        if let Some(worker) = self.lock_worker().as_ref() {
            worker.cancel.cancel();
        }
        was_running
    }

    /// Stop the running session and wait for its worker to exit.
    ///
    /// Returns `true` if a running session was stopped. After this returns no
    /// further events from the previous session can arrive.
    pub fn halt(&self) -> bool {
        let mut slot = self.lock_worker();
        self.halt_locked(&mut slot)
    }

    pub fn is_running(&self) -> bool {
        self.lock_session().running
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.lock_session().remaining_seconds
    }

    /// Phase of the current or most recent session
    pub fn phase(&self) -> Phase {
        self.lock_session().phase
    }

    /// Toggle the ticking ambience and final-seconds beeps; takes effect on the next tick
    pub fn set_sound_enabled(&self, enabled: bool) {
        self.sound_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    fn halt_locked(&self, slot: &mut Option<Worker>) -> bool {
        let was_running = self.mark_stopped();

        if let Some(worker) = slot.take() {
            worker.cancel.cancel();

            if worker.handle.thread().id() == thread::current().id() {
                // Restarted from a listener: this thread leaves its loop once
                // the listener returns and never ticks again
                tracing::debug!("Countdown worker restarted from its own listener; detaching");
                worker.detached.store(true, Ordering::SeqCst);
                self.metrics.record_worker_exited();
            } else if worker.handle.join().is_err() {
                tracing::error!("Countdown worker panicked");
            }
        }

        was_running
    }

    fn mark_stopped(&self) -> bool {
        let mut session = self.lock_session();
        let was_running = session.running;
        session.running = false;

        if was_running {
            self.metrics.record_manual_stop();
            tracing::info!(
                "Countdown stopped: {} with {}s remaining",
                session.phase,
                session.remaining_seconds
            );
        }

        was_running
    }

    fn spawn_worker(&self, context: WorkerContext) -> std::io::Result<JoinHandle<()>> {
        #[cfg(test)]
        if self.fail_next_spawn.swap(false, Ordering::SeqCst) {
            return Err(std::io::Error::other("simulated thread exhaustion"));
        }

        thread::Builder::new()
            .name("pomotray-countdown".to_string())
            .spawn(move || context.run())
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for CountdownEngine {
    fn drop(&mut self) {
        self.halt();
    }
}

enum Step {
    Stopped,
    Tick(Phase, u32),
    Completed(Phase),
}

/// Everything a worker needs, moved onto its thread
struct WorkerContext {
    session: Arc<Mutex<Session>>,
    generation: u64,
    cancel: CancelToken,
    detached: Arc<AtomicBool>,
    sound_enabled: Arc<AtomicBool>,
    clock: Arc<dyn Clock>,
    sound: Arc<dyn SoundCue>,
    listener: Arc<dyn CountdownListener>,
    metrics: Arc<Metrics>,
}

impl WorkerContext {
    fn run(self) {
        self.metrics.record_worker_started();

        let mut ambience = false;
        let initial = {
            let session = self.lock_session();
            self.owns(&session)
                .then_some((session.phase, session.remaining_seconds))
        };
        let Some((phase, remaining_seconds)) = initial else {
            // Replaced before it got to run
            self.exit();
            return;
        };
        tracing::debug!("Countdown worker started for {}", phase);

        self.sync_ambience(&mut ambience);
        self.emit(CountdownEvent::Tick {
            phase,
            remaining_seconds,
        });

        let mut deadline = self.clock.now() + TICK;

        loop {
            let now = self.clock.now();
            if deadline > now {
                self.clock.sleep(deadline - now, &self.cancel);
            }

            match self.advance() {
                Step::Stopped => break,
                Step::Completed(phase) => {
                    if ambience {
                        self.cue("stop_ambience", self.sound.stop_ambience());
                        ambience = false;
                    }
                    self.cue("done", self.sound.done());
                    self.metrics.record_phase_completed();
                    tracing::info!("Countdown completed: {}", phase);
                    self.listener.on_event(CountdownEvent::Completed { phase });
                    break;
                }
                Step::Tick(phase, remaining_seconds) => {
                    self.sync_ambience(&mut ambience);
                    if remaining_seconds <= COUNTDOWN_BEEP_SECONDS && self.sound_on() {
                        self.cue(
                            "countdown_beep",
                            self.sound.countdown_beep(remaining_seconds),
                        );
                    }
                    self.emit(CountdownEvent::Tick {
                        phase,
                        remaining_seconds,
                    });
                }
            }

            if self.cancel.is_cancelled() {
                break;
            }

            let now = self.clock.now();
            if now >= deadline + TICK {
                tracing::warn!(
                    "Countdown overran its tick by {:?}; resynchronizing",
                    now - deadline
                );
                self.metrics.record_drift_resync();
                deadline = now + TICK;
            } else {
                deadline += TICK;
            }
        }

        if ambience && !self.handed_over() {
            self.cue("stop_ambience", self.sound.stop_ambience());
        }

        self.exit();
    }

    /// A detached worker leaves the ambience to the worker that replaced it
    fn handed_over(&self) -> bool {
        if !self.detached.load(Ordering::SeqCst) || !self.sound_on() {
            return false;
        }
        let session = self.lock_session();
        session.running && session.generation != self.generation
    }

    fn exit(&self) {
        // A detached worker was already counted out by the engine
        if !self.detached.load(Ordering::SeqCst) {
            self.metrics.record_worker_exited();
        }
        tracing::debug!("Countdown worker exited");
    }

    /// Whether the session still belongs to this worker
    fn owns(&self, session: &Session) -> bool {
        session.generation == self.generation && !self.cancel.is_cancelled()
    }

    /// Decrement under the session lock so a concurrent stop either wins
    /// outright or lands on an already finished session.
    fn advance(&self) -> Step {
        let mut session = self.lock_session();
        if !session.running || !self.owns(&session) {
            return Step::Stopped;
        }

        session.remaining_seconds = session.remaining_seconds.saturating_sub(1);
        if session.remaining_seconds == 0 {
            session.running = false;
            Step::Completed(session.phase)
        } else {
            Step::Tick(session.phase, session.remaining_seconds)
        }
    }

    fn emit(&self, event: CountdownEvent) {
        self.metrics.record_tick();
        tracing::trace!("{:?}", event);
        self.listener.on_event(event);
    }

    fn sound_on(&self) -> bool {
        self.sound_enabled.load(Ordering::Relaxed)
    }

    /// Keep the ambience in line with the live sound flag
    fn sync_ambience(&self, playing: &mut bool) {
        let enabled = self.sound_on();
        if enabled && !*playing {
            self.cue("start_ambience", self.sound.start_ambience());
            *playing = true;
        } else if !enabled && *playing {
            self.cue("stop_ambience", self.sound.stop_ambience());
            *playing = false;
        }
    }

    fn cue(&self, name: &str, result: Result<(), SoundError>) {
        if let Err(e) = result {
            self.metrics.record_sound_error();
            tracing::debug!("Sound cue {} failed: {}", name, e);
        }
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
