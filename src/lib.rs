// Pomotray - Pomodoro timer core for status-area tray hosts
//
// This is the library crate containing the countdown engine, the cycle state
// machine and the presentation mapper. The binary crate (main.rs) provides a
// console host for driving the core interactively.

pub mod config;
pub mod host;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::{MemorySettingsStore, SettingsRepository, SettingsStore};
pub use host::{HostBridge, HostEvent, PomodoroController, PomodoroError, TimerObserver};
pub use metrics::Metrics;
pub use models::{CycleState, Phase, Settings, SettingsError};
pub use services::{Rendered, render};
pub use state::{StateChange, StateManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
