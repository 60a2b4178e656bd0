// Timer metrics module
//
// Lightweight counters for the countdown engine and the host bridge

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Runtime counters shared by the engine, the presentation cache and the bridge
///
/// Uses atomic operations for thread-safe tracking without locks. The worker
/// thread and the command thread both write here.
#[derive(Debug)]
pub struct Metrics {
    /// Tick events delivered to the listener
    pub ticks_emitted: AtomicU64,

    /// Phases that ran to zero
    pub phases_completed: AtomicU64,

    /// Sessions cancelled by `stop()` or a restart
    pub manual_stops: AtomicU64,

    /// Times the drift origin was resynchronized after an overrun
    pub drift_resyncs: AtomicU64,

    /// Worker threads spawned since startup
    pub workers_spawned: AtomicU64,

    /// Worker threads currently inside their loop
    pub live_workers: AtomicUsize,

    /// Highest value `live_workers` ever reached
    pub peak_live_workers: AtomicUsize,

    /// Icon regenerations performed by the presentation cache
    pub icon_regenerations: AtomicU64,

    /// Sound hook calls that returned an error
    pub sound_errors: AtomicU64,

    /// Host events dropped because the bridge channel was full or closed
    pub host_events_dropped: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            ticks_emitted: AtomicU64::new(0),
            phases_completed: AtomicU64::new(0),
            manual_stops: AtomicU64::new(0),
            drift_resyncs: AtomicU64::new(0),
            workers_spawned: AtomicU64::new(0),
            live_workers: AtomicUsize::new(0),
            peak_live_workers: AtomicUsize::new(0),
            icon_regenerations: AtomicU64::new(0),
            sound_errors: AtomicU64::new(0),
            host_events_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_tick(&self) {
        self.ticks_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_phase_completed(&self) {
        self.phases_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_manual_stop(&self) {
        self.manual_stops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drift_resync(&self) {
        self.drift_resyncs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_icon_regeneration(&self) {
        self.icon_regenerations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sound_error(&self) {
        self.sound_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_host_event_dropped(&self) {
        self.host_events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a worker entering its loop and update the peak
    pub fn record_worker_started(&self) {
        self.workers_spawned.fetch_add(1, Ordering::Relaxed);
        let live = self.live_workers.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_live_workers.fetch_max(live, Ordering::SeqCst);
    }

    pub fn record_worker_exited(&self) {
        self.live_workers.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        tracing::info!("=== Timer Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Phases: {} completed, {} stopped",
            self.phases_completed.load(Ordering::Relaxed),
            self.manual_stops.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Ticks: {}, drift resyncs: {}",
            self.ticks_emitted.load(Ordering::Relaxed),
            self.drift_resyncs.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Workers: {} spawned, peak live {}",
            self.workers_spawned.load(Ordering::Relaxed),
            self.peak_live_workers.load(Ordering::SeqCst)
        );
        tracing::info!(
            "Icon regenerations: {}, sound errors: {}, dropped host events: {}",
            self.icon_regenerations.load(Ordering::Relaxed),
            self.sound_errors.load(Ordering::Relaxed),
            self.host_events_dropped.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
