// Presentation mapper
//
// Turns the countdown into the compact triple a tray icon can show: a short
// text (play glyph, minutes or seconds), up to four progress dots and a tooltip.

use std::sync::Arc;

use crate::metrics::Metrics;
use crate::models::{CYCLES_PER_LONG_BREAK, Phase};

/// Shown on the icon whenever no countdown is running
pub const PLAY_GLYPH: &str = "\u{25BA}";

pub const HINT_START_WORK: &str = "Click to start a pomodoro";
pub const HINT_START_BREAK: &str = "Click to start a break";

/// What the host draws for one state of the timer
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rendered {
    pub text: String,
    pub tooltip: String,
    /// Completed work sessions, 0..=4
    pub dots: u8,
}

impl Rendered {
    /// Icon identity; the tooltip does not affect the bitmap
    pub fn icon_key(&self) -> (&str, u8) {
        (&self.text, self.dots)
    }

    pub fn is_idle(&self) -> bool {
        self.text == PLAY_GLYPH
    }
}

/// Map the countdown to its visual representation.
///
/// Pure and idempotent. `next_phase` only selects the idle tooltip hint.
///
/// - text: [`PLAY_GLYPH`] when idle or at zero, whole minutes while at least a
///   minute remains, whole seconds otherwise
/// - dots: `dot_count` clamped to 0..=4
/// - tooltip: `MM:SS` while running, otherwise a click hint for the next phase
pub fn render(remaining_seconds: u32, dot_count: u8, phase: Phase, next_phase: Phase) -> Rendered {
    let running = phase != Phase::Idle && remaining_seconds > 0;

    let text = if !running {
        PLAY_GLYPH.to_string()
    } else if remaining_seconds >= 60 {
        (remaining_seconds / 60).to_string()
    } else {
        remaining_seconds.to_string()
    };

    let tooltip = if running {
        format!("{:02}:{:02}", remaining_seconds / 60, remaining_seconds % 60)
    } else if next_phase.is_break() {
        HINT_START_BREAK.to_string()
    } else {
        HINT_START_WORK.to_string()
    };

    Rendered {
        text,
        tooltip,
        dots: dot_count.min(CYCLES_PER_LONG_BREAK),
    }
}

/// Caches the host's expensive icon for the last `(text, dots)` key.
///
/// The icon is regenerated only when the key differs from the previous call,
/// and a changed key always regenerates.
pub struct IconCache<I> {
    entry: Option<((String, u8), I)>,
    metrics: Option<Arc<Metrics>>,
}

impl<I> IconCache<I> {
    pub fn new() -> Self {
        Self {
            entry: None,
            metrics: None,
        }
    }

    /// Count regenerations in `metrics`
    pub fn with_metrics(metrics: Arc<Metrics>) -> Self {
        Self {
            entry: None,
            metrics: Some(metrics),
        }
    }

    /// Return the icon for `rendered`, calling `make` only if the key changed
    pub fn get_or_render<F>(&mut self, rendered: &Rendered, make: F) -> &I
    where
        F: FnOnce(&str, u8) -> I,
    {
        if !self.is_cached(&rendered.text, rendered.dots) {
            self.entry = None;
        }

        let metrics = &self.metrics;
        let (_, icon) = self.entry.get_or_insert_with(|| {
            if let Some(metrics) = metrics {
                metrics.record_icon_regeneration();
            }
            (
                (rendered.text.clone(), rendered.dots),
                make(&rendered.text, rendered.dots),
            )
        });
        icon
    }

    /// Whether the next call with this key would be served from cache
    pub fn is_cached(&self, text: &str, dots: u8) -> bool {
        matches!(&self.entry, Some(((t, d), _)) if t == text && *d == dots)
    }

    pub fn invalidate(&mut self) {
        self.entry = None;
    }
}

impl<I> Default for IconCache<I> {
    fn default() -> Self {
        Self::new()
    }
}
