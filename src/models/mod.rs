//! Data models for the Pomotray core.
//!
//! - [`Settings`]: The validated snapshot of durations and the sound flag, persisted by
//!   [`SettingsStore`](crate::config::SettingsStore)
//! - [`CycleState`]: The pomodoro cycle state machine (phase + completed work sessions)
//! - [`Phase`]: Idle, work, short break or long break
//!
//! # Architecture Note
//!
//! The models are plain data with no locking. [`StateManager`](crate::state::StateManager)
//! wraps them in `Arc<RwLock<>>` and emits change events; the countdown itself lives in
//! [`CountdownEngine`](crate::services::CountdownEngine).

pub mod cycle;
pub mod settings;

pub use cycle::{CYCLES_PER_LONG_BREAK, CycleState, Phase, PhaseRequest, ToggleOutcome};
pub use settings::{Settings, SettingsError};
