//! Services module - the timing core behind the tray icon.
//!
//! These services have no dependency on any windowing system. The host drives them through
//! [`PomodoroController`](crate::host::PomodoroController) and renders what they produce.
//!
//! # Components
//!
//! - [`CountdownEngine`]: Owns the single countdown session and its one background worker:
//!   - Cancel-then-join restart, so two workers never run at once
//!   - Absolute one-second deadlines with resync after an overrun (drift correction)
//!   - Tick and completion events via [`CountdownListener`]
//!   - Fire-and-forget [`SoundCue`] hooks
//!
//! - [`render`]: Pure mapping from remaining seconds, cycle counter and phase to the
//!   [`Rendered`] text/tooltip/dots triple, plus an [`IconCache`] for the host's bitmap
//!
//! - [`Clock`]: Monotonic time source. [`SystemClock`] for real use, [`ManualClock`] to run
//!   sessions in virtual time
//!
//! # Threading
//!
//! Only the countdown worker blocks. Everything else runs on whichever thread the host
//! issues commands from.

pub mod clock;
pub mod countdown;
pub mod presentation;
pub mod sound;

pub use clock::{CancelToken, Clock, ManualClock, SystemClock};
pub use countdown::{
    COUNTDOWN_BEEP_SECONDS, CountdownEngine, CountdownError, CountdownEvent, CountdownListener,
    TICK,
};
pub use presentation::{
    HINT_START_BREAK, HINT_START_WORK, IconCache, PLAY_GLYPH, Rendered, render,
};
pub use sound::{LogCue, SilentCue, SoundCue, SoundError};
