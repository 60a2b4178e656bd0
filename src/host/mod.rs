// Host module - the surface a tray shell talks to
//
// This module contains:
// - PomodoroController: Commands (start/stop/toggle/settings) and queries
// - TimerObserver: Outbound tick and completion callbacks
// - HostBridge: TimerObserver that hands events to the host's own thread

pub mod bridge;
pub mod controller;

pub use bridge::{DEFAULT_CAPACITY, HostBridge, HostEvent};
pub use controller::{PomodoroController, PomodoroError, TimerObserver};
