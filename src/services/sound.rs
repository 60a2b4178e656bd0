// Sound cue collaborator
//
// The engine calls these hooks at fixed instants of a session. Playback is the
// host's concern; any error is swallowed by the engine and never touches timer
// state.

use thiserror::Error;

/// Errors a sound backend may report
#[derive(Error, Debug)]
pub enum SoundError {
    #[error("Sound device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Sound resource missing: {0}")]
    ResourceMissing(String),

    #[error("Playback failed: {0}")]
    Playback(#[from] std::io::Error),
}

/// External sound collaborator invoked by the countdown worker
#[cfg_attr(test, mockall::automock)]
pub trait SoundCue: Send + Sync {
    /// Begin the looping clock-ticking ambience
    fn start_ambience(&self) -> Result<(), SoundError>;

    /// Stop the ticking ambience if it is playing
    fn stop_ambience(&self) -> Result<(), SoundError>;

    /// Short cue for one of the final ten seconds
    fn countdown_beep(&self, remaining_seconds: u32) -> Result<(), SoundError>;

    /// Distinct cue played once when a phase runs to completion
    fn done(&self) -> Result<(), SoundError>;
}

/// Sound backend that never makes a sound
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentCue;

impl SoundCue for SilentCue {
    fn start_ambience(&self) -> Result<(), SoundError> {
        Ok(())
    }

    fn stop_ambience(&self) -> Result<(), SoundError> {
        Ok(())
    }

    fn countdown_beep(&self, _remaining_seconds: u32) -> Result<(), SoundError> {
        Ok(())
    }

    fn done(&self) -> Result<(), SoundError> {
        Ok(())
    }
}

/// Sound backend that records each cue as a tracing event.
///
/// Used by the console host, which has no audio output of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCue;

impl SoundCue for LogCue {
    fn start_ambience(&self) -> Result<(), SoundError> {
        tracing::debug!(target: "pomotray::sound", "ambience started");
        Ok(())
    }

    fn stop_ambience(&self) -> Result<(), SoundError> {
        tracing::debug!(target: "pomotray::sound", "ambience stopped");
        Ok(())
    }

    fn countdown_beep(&self, remaining_seconds: u32) -> Result<(), SoundError> {
        tracing::info!(target: "pomotray::sound", remaining_seconds, "beep");
        Ok(())
    }

    fn done(&self) -> Result<(), SoundError> {
        tracing::info!(target: "pomotray::sound", "ding");
        Ok(())
    }
}
