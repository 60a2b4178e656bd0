//! Pomotray - Pomodoro timer for the status area
//!
//! Console host for the timer core.
//!
//! # Overview
//!
//! This binary drives the library the same way a tray shell would, but from a
//! terminal. It initializes:
//! - Logging infrastructure (file rotation + console output)
//! - Tokio runtime (stdin reader and host event loop)
//! - Settings loading ([`SettingsStore`])
//! - The [`PomodoroController`] with a [`HostBridge`] observer
//!
//! Threading model:
//! - **Countdown worker**: std::thread owned by the engine, one at a time
//! - **Tokio runtime**: reads commands and drains host events
//! - **Blocking pool**: runs controller commands, which may join the worker
//!
//! # Commands
//!
//! `work`, `break`, `long`, `toggle` (tray click), `stop`, `sound`,
//! `set <work> <short> <long>`, `status`, `help`, `quit`
//!
//! # Configuration Files
//!
//! Expected in `Pomotray Data/`:
//! - `pomotray.yaml`: Durations and sound flag
//! - `pomodoro_settings.json`: Legacy record, read when no YAML exists
//! - `pomotray.lock`: Held while a host runs; a second host exits

use anyhow::{Context, Result, anyhow};
use pomotray::config::InstanceLock;
use pomotray::host::{HostBridge, HostEvent, PomodoroController};
use pomotray::services::{IconCache, LogCue, Rendered, SystemClock};
use pomotray::{APP_NAME, Metrics, Settings, SettingsRepository, SettingsStore, VERSION};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Commands accepted on stdin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Work,
    Break,
    LongBreak,
    Toggle,
    Stop,
    Sound,
    Set {
        work: u32,
        short_break: u32,
        long_break: u32,
    },
    Status,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(anyhow!("empty command"));
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "work" | "w" => Command::Work,
            "break" | "b" => Command::Break,
            "long" | "l" => Command::LongBreak,
            "toggle" | "t" | "click" => Command::Toggle,
            "stop" | "s" => Command::Stop,
            "sound" => Command::Sound,
            "status" => Command::Status,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            "set" => {
                let mut minutes = || -> Result<u32> {
                    let word = words
                        .next()
                        .ok_or_else(|| anyhow!("usage: set <work> <short> <long>"))?;
                    word.parse()
                        .with_context(|| format!("'{}' is not a number of minutes", word))
                };
                Command::Set {
                    work: minutes()?,
                    short_break: minutes()?,
                    long_break: minutes()?,
                }
            }
            other => return Err(anyhow!("unknown command '{}', try 'help'", other)),
        };

        Ok(command)
    }
}

/// Main entry point for the console host
///
/// # Errors
///
/// This function can fail if:
/// - Logging initialization fails (disk space, permissions)
/// - Tokio runtime creation fails (system resources)
/// - The settings directory cannot be created or the YAML file is invalid
/// - The instance lock file cannot be created
fn main() -> Result<()> {
    let _log_guard =
        pomotray::logging::setup_logging_with_console("logs", "pomotray", false, true)?;

    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(2)
        .thread_name("pomotray-host")
        .build()?;

    let store = SettingsStore::new("Pomotray Data")?;
    let Some(_instance_lock) = InstanceLock::acquire(store.settings_dir())? else {
        println!(
            "{} is already running (lock file in {})",
            APP_NAME,
            store.settings_dir()
        );
        return Ok(());
    };
    let settings = store.load()?;

    let metrics = Arc::new(Metrics::new());
    let (bridge, events) = HostBridge::new();
    let controller = Arc::new(PomodoroController::new(
        settings,
        Arc::new(SystemClock::new()),
        Arc::new(LogCue),
        Arc::new(bridge.with_metrics(Arc::clone(&metrics))),
        Arc::new(store),
        metrics,
    ));

    let result = runtime.block_on(run_console(Arc::clone(&controller), events));

    controller.shutdown();
    runtime.shutdown_timeout(Duration::from_secs(5));

    tracing::info!("Application shutdown complete");
    result
}

async fn run_console(
    controller: Arc<PomodoroController>,
    mut events: mpsc::Receiver<HostEvent>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut badges: IconCache<String> = IconCache::with_metrics(Arc::clone(controller.metrics()));

    print_help();
    show_view(&mut badges, &controller.current_view());

    loop {
        tokio::select! {
            Some(event) = events.recv() => match event {
                HostEvent::Tick(view) => show_view(&mut badges, &view),
                HostEvent::PhaseCompleted(phase) => println!("*** {} finished ***", phase),
            },
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    tracing::info!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let command = match Command::parse(&line) {
                    Ok(Command::Quit) => break,
                    Ok(command) => command,
                    Err(e) => {
                        println!("{:#}", e);
                        continue;
                    }
                };

                // Commands may join the countdown worker; keep them off the async threads
                let worker_controller = Arc::clone(&controller);
                let outcome = tokio::task::spawn_blocking(move || execute(&worker_controller, command))
                    .await
                    .context("Command task failed")?;

                match outcome {
                    Ok(Some(message)) => println!("{}", message),
                    Ok(None) => {}
                    Err(e) => println!("error: {:#}", e),
                }
            }
        }
    }

    Ok(())
}

fn execute(controller: &PomodoroController, command: Command) -> Result<Option<String>> {
    match command {
        Command::Work => controller.start_work()?,
        Command::Break => controller.start_break()?,
        Command::LongBreak => controller.start_long_break()?,
        Command::Toggle => controller.toggle_running()?,
        Command::Stop => {
            if !controller.stop() {
                return Ok(Some("nothing to stop".to_string()));
            }
        }
        Command::Sound => {
            let enabled = controller.toggle_sound()?;
            return Ok(Some(format!(
                "clock sound {}",
                if enabled { "on" } else { "off" }
            )));
        }
        Command::Set {
            work,
            short_break,
            long_break,
        } => {
            let settings = Settings {
                work_minutes: work,
                short_break_minutes: short_break,
                long_break_minutes: long_break,
                ..controller.settings()
            };
            controller.update_settings(settings)?;
            return Ok(Some(format!(
                "durations set to {}/{}/{} min",
                work, short_break, long_break
            )));
        }
        Command::Status => return Ok(Some(status_line(controller))),
        Command::Help => {
            print_help();
        }
        Command::Quit => {}
    }
    Ok(None)
}

fn status_line(controller: &PomodoroController) -> String {
    let cycle = controller.cycle_state();
    let settings = controller.settings();
    let view = controller.current_view();

    format!(
        "{} | {} | completed work sessions: {} | next: {} | {}/{}/{} min, sound {}",
        cycle.phase,
        view.tooltip,
        cycle.completed_work_cycles,
        cycle.next_phase(),
        settings.work_minutes,
        settings.short_break_minutes,
        settings.long_break_minutes,
        if settings.sound_enabled { "on" } else { "off" }
    )
}

/// Print the badge only when the icon would change
fn show_view(badges: &mut IconCache<String>, view: &Rendered) {
    if badges.is_cached(&view.text, view.dots) {
        return;
    }
    let badge = badges.get_or_render(view, |text, dots| {
        let filled = "\u{25CF}".repeat(dots as usize);
        let empty = "\u{25CB}".repeat(4 - dots.min(4) as usize);
        format!("[{:>3}] {}{}", text, filled, empty)
    });
    println!("{}  {}", badge, view.tooltip);
}

fn print_help() {
    println!(
        "commands: work | break | long | toggle | stop | sound | set <work> <short> <long> | status | quit"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse("work").unwrap(), Command::Work);
        assert_eq!(Command::parse("  Toggle ").unwrap(), Command::Toggle);
        assert_eq!(Command::parse("long").unwrap(), Command::LongBreak);
        assert_eq!(Command::parse("q").unwrap(), Command::Quit);
    }

    #[test]
    fn test_parse_set() {
        assert_eq!(
            Command::parse("set 50 10 30").unwrap(),
            Command::Set {
                work: 50,
                short_break: 10,
                long_break: 30
            }
        );
        assert!(Command::parse("set 50 10").is_err());
        assert!(Command::parse("set fifty 10 30").is_err());
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!(Command::parse("").is_err());
        assert!(Command::parse("pause").is_err());
    }
}
