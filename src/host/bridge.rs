// HostBridge - Marshals timer events from the countdown worker to the host's thread
//
// The countdown worker is a plain OS thread and must never block on the host.
// The bridge forwards each event into a bounded tokio channel that the host
// drains on its own event loop (a tokio task, a GUI loop, or a blocking thread).

use super::controller::TimerObserver;
use crate::metrics::Metrics;
use crate::models::Phase;
use crate::services::Rendered;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Bounded to 100 events so a stalled host cannot grow memory without limit
pub const DEFAULT_CAPACITY: usize = 100;

/// Timer output as delivered to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Redraw the icon and tooltip
    Tick(Rendered),

    /// A phase ran to zero (show a notification, flash the icon, ...)
    PhaseCompleted(Phase),
}

/// [`TimerObserver`] that forwards events into a bounded channel.
///
/// Sending never blocks the worker: when the channel is full or the receiver
/// is gone the event is dropped with a warning and counted in metrics.
///
/// # Example
/// ```ignore
/// let (bridge, mut events) = HostBridge::new();
/// let controller = PomodoroController::new(settings, clock, sound, Arc::new(bridge), store, metrics);
///
/// while let Some(event) = events.recv().await {
///     match event {
///         HostEvent::Tick(view) => tray.set_tooltip(&view.tooltip),
///         HostEvent::PhaseCompleted(phase) => tray.notify(phase),
///     }
/// }
/// ```
#[derive(Clone)]
pub struct HostBridge {
    event_tx: mpsc::Sender<HostEvent>,
    metrics: Option<Arc<Metrics>>,
}

impl HostBridge {
    /// Create a bridge with [`DEFAULT_CAPACITY`] and the receiver the host drains
    pub fn new() -> (Self, mpsc::Receiver<HostEvent>) {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<HostEvent>) {
        let (event_tx, event_rx) = mpsc::channel(capacity);
        (
            Self {
                event_tx,
                metrics: None,
            },
            event_rx,
        )
    }

    /// Count dropped events in `metrics`
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Forward an event without blocking
    pub fn send(&self, event: HostEvent) {
        match self.event_tx.try_send(event) {
            Ok(_) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!("Host event channel full - dropping {:?}", event);
                self.record_drop();
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("Failed to send host event - receiver has been dropped");
                self.record_drop();
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.event_tx.is_closed()
    }

    fn record_drop(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_host_event_dropped();
        }
    }
}

impl TimerObserver for HostBridge {
    fn on_tick(&self, view: &Rendered) {
        self.send(HostEvent::Tick(view.clone()));
    }

    fn on_phase_completed(&self, phase: Phase) {
        self.send(HostEvent::PhaseCompleted(phase));
    }
}
