use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use thiserror::Error;

use super::cycle::Phase;

/// Accepted work session length in minutes
pub const WORK_MINUTES_RANGE: RangeInclusive<u32> = 1..=120;

/// Accepted short break length in minutes
pub const SHORT_BREAK_MINUTES_RANGE: RangeInclusive<u32> = 1..=60;

/// Accepted long break length in minutes
pub const LONG_BREAK_MINUTES_RANGE: RangeInclusive<u32> = 1..=120;

pub const DEFAULT_WORK_MINUTES: u32 = 25;
pub const DEFAULT_SHORT_BREAK_MINUTES: u32 = 5;
pub const DEFAULT_LONG_BREAK_MINUTES: u32 = 15;

/// Timer settings snapshot handed to the core by the host.
///
/// The core trusts a snapshot once it has passed [`Settings::validate`]; the
/// store and the controller both validate before a snapshot reaches the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_work_minutes")]
    pub work_minutes: u32,

    #[serde(default = "default_short_break_minutes")]
    pub short_break_minutes: u32,

    #[serde(default = "default_long_break_minutes")]
    pub long_break_minutes: u32,

    /// Enables the ticking ambience and the final-seconds beeps
    #[serde(default = "default_sound_enabled")]
    pub sound_enabled: bool,
}

/// Errors raised when a settings snapshot falls outside the accepted ranges
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{field} must be between {min} and {max} minutes, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

impl Settings {
    /// Check every duration against its accepted range.
    ///
    /// Returns the first offending field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_range("work_minutes", self.work_minutes, &WORK_MINUTES_RANGE)?;
        check_range(
            "short_break_minutes",
            self.short_break_minutes,
            &SHORT_BREAK_MINUTES_RANGE,
        )?;
        check_range(
            "long_break_minutes",
            self.long_break_minutes,
            &LONG_BREAK_MINUTES_RANGE,
        )?;
        Ok(())
    }

    /// Replace every out-of-range field with its default.
    ///
    /// Used when loading files edited by hand; returns the names of the fields
    /// that were reset so the caller can log them.
    pub fn sanitized(mut self) -> (Self, Vec<&'static str>) {
        let mut reset = Vec::new();

        if !WORK_MINUTES_RANGE.contains(&self.work_minutes) {
            self.work_minutes = DEFAULT_WORK_MINUTES;
            reset.push("work_minutes");
        }
        if !SHORT_BREAK_MINUTES_RANGE.contains(&self.short_break_minutes) {
            self.short_break_minutes = DEFAULT_SHORT_BREAK_MINUTES;
            reset.push("short_break_minutes");
        }
        if !LONG_BREAK_MINUTES_RANGE.contains(&self.long_break_minutes) {
            self.long_break_minutes = DEFAULT_LONG_BREAK_MINUTES;
            reset.push("long_break_minutes");
        }

        (self, reset)
    }

    /// Configured length of a phase in minutes, `None` for [`Phase::Idle`]
    pub fn duration_for(&self, phase: Phase) -> Option<u32> {
        match phase {
            Phase::Idle => None,
            Phase::Work => Some(self.work_minutes),
            Phase::ShortBreak => Some(self.short_break_minutes),
            Phase::LongBreak => Some(self.long_break_minutes),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_minutes: DEFAULT_WORK_MINUTES,
            short_break_minutes: DEFAULT_SHORT_BREAK_MINUTES,
            long_break_minutes: DEFAULT_LONG_BREAK_MINUTES,
            sound_enabled: true,
        }
    }
}

fn check_range(
    field: &'static str,
    value: u32,
    range: &RangeInclusive<u32>,
) -> Result<(), SettingsError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::OutOfRange {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        })
    }
}

fn default_work_minutes() -> u32 {
    DEFAULT_WORK_MINUTES
}

fn default_short_break_minutes() -> u32 {
    DEFAULT_SHORT_BREAK_MINUTES
}

fn default_long_break_minutes() -> u32 {
    DEFAULT_LONG_BREAK_MINUTES
}

fn default_sound_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.work_minutes, 25);
        assert_eq!(settings.short_break_minutes, 5);
        assert_eq!(settings.long_break_minutes, 15);
        assert!(settings.sound_enabled);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_bounds() {
        let mut settings = Settings::default();

        settings.work_minutes = 120;
        settings.short_break_minutes = 60;
        settings.long_break_minutes = 1;
        assert!(settings.validate().is_ok());

        settings.short_break_minutes = 61;
        assert_eq!(
            settings.validate(),
            Err(SettingsError::OutOfRange {
                field: "short_break_minutes",
                value: 61,
                min: 1,
                max: 60,
            })
        );
    }

    #[test]
    fn test_validate_rejects_zero_work() {
        let settings = Settings {
            work_minutes: 0,
            ..Settings::default()
        };

        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("work_minutes"));
    }

    #[test]
    fn test_sanitized_resets_only_bad_fields() {
        let settings = Settings {
            work_minutes: 500,
            short_break_minutes: 7,
            long_break_minutes: 0,
            sound_enabled: false,
        };

        let (fixed, reset) = settings.sanitized();
        assert_eq!(fixed.work_minutes, DEFAULT_WORK_MINUTES);
        assert_eq!(fixed.short_break_minutes, 7);
        assert_eq!(fixed.long_break_minutes, DEFAULT_LONG_BREAK_MINUTES);
        assert!(!fixed.sound_enabled);
        assert_eq!(reset, vec!["work_minutes", "long_break_minutes"]);
    }

    #[test]
    fn test_duration_for_phase() {
        let settings = Settings::default();
        assert_eq!(settings.duration_for(Phase::Work), Some(25));
        assert_eq!(settings.duration_for(Phase::ShortBreak), Some(5));
        assert_eq!(settings.duration_for(Phase::LongBreak), Some(15));
        assert_eq!(settings.duration_for(Phase::Idle), None);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let settings: Settings = serde_yaml_ng::from_str("work_minutes: 50\n").unwrap();
        assert_eq!(settings.work_minutes, 50);
        assert_eq!(settings.short_break_minutes, 5);
        assert!(settings.sound_enabled);
    }
}
