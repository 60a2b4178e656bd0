// Time sources for the countdown worker
//
// The worker never reads the wall clock directly. It asks a `Clock` for a
// monotonic timestamp and sleeps through it, which lets tests replace real
// seconds with virtual ones and inject stalls.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Cooperative cancellation signal shared between the engine and one worker.
///
/// Cancelling wakes any sleeper immediately; the worker still observes the stop
/// through the session lock, so the token only shortens the wait.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let (lock, cvar) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        let (lock, _) = &*self.inner;
        *lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Block for up to `timeout` or until cancelled.
    ///
    /// Returns `true` if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.inner;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = cvar
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

/// Monotonic time source used by the countdown worker
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's own origin
    fn now(&self) -> Duration;

    /// Sleep for `duration`, returning early if `cancel` fires
    fn sleep(&self, duration: Duration, cancel: &CancelToken);
}

/// Real monotonic clock backed by [`Instant`]
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) {
        cancel.wait_timeout(duration);
    }
}

#[derive(Debug, Default)]
struct ManualState {
    now: Duration,
    sleeps: u64,
    delays: HashMap<u64, Duration>,
}

/// Virtual clock for tests.
///
/// Every `sleep` returns immediately after advancing virtual time by the
/// requested duration, so a 25 minute session runs in milliseconds. A stall can
/// be injected on a specific sleep to simulate suspend or scheduler contention.
#[derive(Debug, Default)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move virtual time forward without sleeping
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.now += by;
    }

    /// Make the sleep with zero-based index `sleep_index` overrun by `extra`
    pub fn inject_delay(&self, sleep_index: u64, extra: Duration) {
        let mut state = self.lock();
        state.delays.insert(sleep_index, extra);
    }

    /// Number of sleeps served so far
    pub fn sleep_count(&self) -> u64 {
        self.lock().sleeps
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.lock().now
    }

    fn sleep(&self, duration: Duration, cancel: &CancelToken) {
        if cancel.is_cancelled() {
            return;
        }

        let mut state = self.lock();
        let index = state.sleeps;
        state.sleeps += 1;
        let extra = state.delays.remove(&index).unwrap_or_default();
        state.now += duration + extra;
    }
}
