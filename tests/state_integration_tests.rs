//! Integration tests for StateManager with state change events
//!
//! These tests verify that the StateManager correctly:
//! - Emits phase events on start, stop and completion
//! - Supports multiple subscribers
//! - Handles concurrent access from multiple threads
//! - Keeps the cycle counter consistent across a full long-break cycle

use pomotray::{Phase, Settings, StateChange, StateManager};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{Duration, timeout};

async fn next_event(rx: &mut broadcast::Receiver<StateChange>) -> StateChange {
    timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed")
}

#[tokio::test]
async fn test_phase_started_event() {
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    state.start_work();

    let event = next_event(&mut rx).await;
    assert_eq!(
        event,
        StateChange::PhaseStarted {
            phase: Phase::Work,
            duration_minutes: 25
        }
    );
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let state = Arc::new(StateManager::new());
    let mut rx1 = state.subscribe();
    let mut rx2 = state.subscribe();
    let mut rx3 = state.subscribe();

    state.start_long_break();

    for rx in [&mut rx1, &mut rx2, &mut rx3] {
        let event = next_event(rx).await;
        assert!(matches!(
            event,
            StateChange::PhaseStarted {
                phase: Phase::LongBreak,
                ..
            }
        ));
    }
}

#[tokio::test]
async fn test_full_cycle_reaches_long_break() {
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    for expected in 1..=4u8 {
        state.start_work();
        assert!(state.complete(Phase::Work));

        assert!(matches!(
            next_event(&mut rx).await,
            StateChange::PhaseStarted {
                phase: Phase::Work,
                ..
            }
        ));
        assert_eq!(
            next_event(&mut rx).await,
            StateChange::PhaseCompleted {
                phase: Phase::Work,
                completed_work_cycles: expected
            }
        );
        assert_eq!(
            next_event(&mut rx).await,
            StateChange::CycleCounterChanged {
                completed_work_cycles: expected
            }
        );

        let request = state.start_break();
        let expected_phase = if expected == 4 {
            Phase::LongBreak
        } else {
            Phase::ShortBreak
        };
        assert_eq!(request.phase, expected_phase);
        assert!(state.complete(request.phase));

        // Break started and completed; no counter change
        assert!(matches!(
            next_event(&mut rx).await,
            StateChange::PhaseStarted { .. }
        ));
        assert!(matches!(
            next_event(&mut rx).await,
            StateChange::PhaseCompleted { .. }
        ));
    }

    // Fifth work session wraps the counter
    state.start_work();
    state.complete(Phase::Work);
    assert_eq!(state.cycle().completed_work_cycles, 1);
}

#[tokio::test]
async fn test_settings_changed_event() {
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    let settings = Settings {
        short_break_minutes: 10,
        ..Settings::default()
    };
    state.set_settings(settings);

    assert_eq!(
        next_event(&mut rx).await,
        StateChange::SettingsChanged { settings }
    );

    // Durations apply to the next start
    assert_eq!(state.start_break().duration_minutes, 10);
}

#[tokio::test]
async fn test_stop_event_only_when_active() {
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    assert_eq!(state.stop(), None);
    state.start_work();
    assert_eq!(state.stop(), Some(Phase::Work));

    assert!(matches!(
        next_event(&mut rx).await,
        StateChange::PhaseStarted { .. }
    ));
    assert_eq!(
        next_event(&mut rx).await,
        StateChange::Stopped { phase: Phase::Work }
    );
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_concurrent_access() {
    let state = Arc::new(StateManager::new());
    let mut handles = Vec::new();

    for i in 0..8 {
        let state = Arc::clone(&state);
        handles.push(std::thread::spawn(move || {
            for _ in 0..100 {
                if i % 2 == 0 {
                    let request = state.start_work();
                    state.complete(request.phase);
                } else {
                    let _ = state.snapshot();
                    state.stop();
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    state.start_work();
    assert!(state.complete(Phase::Work));

    let cycle = state.cycle();
    assert_eq!(cycle.phase, Phase::Idle);
    assert!((1..=4).contains(&cycle.completed_work_cycles));
}
