mod common;

use common::{at, host_result};
use netwatch::alert::{AlertGate, AlertKind, DEFAULT_COOLDOWN};
use netwatch::network::Protocol;
use netwatch::scanner::TransitionEvent;
use netwatch::{Status, Target};
use std::time::Duration;

fn event(name: &str, up: bool, secs: i64) -> TransitionEvent {
    TransitionEvent {
        target: host_result(name, up).target,
        previous_status: Status::from_success(!up),
        new_status: Status::from_success(up),
        observed_at: at(secs),
    }
}

#[test]
fn test_default_cooldown_is_five_minutes() {
    assert_eq!(AlertGate::default().cooldown(), Duration::from_secs(300));
    assert_eq!(DEFAULT_COOLDOWN, Duration::from_secs(300));
}

#[test]
fn test_first_event_is_admitted_and_recorded() {
    let mut gate = AlertGate::default();
    assert!(gate.admit(&event("a", false, 0)));
    assert_eq!(gate.last_emitted(AlertKind::HostDown, "a"), Some(at(0)));
}

#[test]
fn test_repeat_within_window_is_suppressed() {
    let mut gate = AlertGate::default();
    assert!(gate.admit(&event("a", false, 0)));
    assert!(!gate.admit(&event("a", false, 10)));
    assert!(!gate.admit(&event("a", false, 299)));
    // Suppression does not move the window
    assert_eq!(gate.last_emitted(AlertKind::HostDown, "a"), Some(at(0)));
}

#[test]
fn test_window_boundary_is_admitted() {
    let mut gate = AlertGate::default();
    assert!(gate.admit(&event("a", false, 0)));
    assert!(gate.admit(&event("a", false, 300)));
    assert!(!gate.admit(&event("a", false, 400)));
    assert!(gate.admit(&event("a", false, 601)));
}

#[test]
fn test_flapping_is_held_back_in_both_directions() {
    let mut gate = AlertGate::default();
    assert!(gate.admit(&event("a", true, 0)));
    assert!(!gate.admit(&event("a", false, 10)));
    assert!(!gate.admit(&event("a", true, 20)));
    assert!(gate.admit(&event("a", false, 301)));
    assert!(!gate.admit(&event("a", true, 400)));
    assert_eq!(gate.last_emitted(AlertKind::HostUp, "a"), Some(at(0)));
    assert_eq!(gate.last_emitted(AlertKind::HostDown, "a"), Some(at(301)));
}

#[test]
fn test_recovery_admitted_after_window() {
    let mut gate = AlertGate::default();
    assert!(gate.admit(&event("a", false, 0)));
    assert!(gate.admit(&event("a", true, 300)));
    assert_eq!(gate.last_emitted(AlertKind::HostUp, "a"), Some(at(300)));
}

#[test]
fn test_keys_are_independent() {
    let mut gate = AlertGate::default();
    assert!(gate.admit(&event("a", false, 0)));
    assert!(gate.admit(&event("b", false, 1)));

    let service = TransitionEvent {
        target: Target::service("a", "10.0.0.1", 22, Protocol::Tcp),
        previous_status: Status::Up,
        new_status: Status::Down,
        observed_at: at(2),
    };
    assert!(gate.admit(&service));
    assert_eq!(gate.last_emitted(AlertKind::ServiceDown, "a"), Some(at(2)));
}

#[test]
fn test_clock_going_backwards_is_suppressed() {
    let mut gate = AlertGate::new(Duration::from_secs(60));
    assert!(gate.admit(&event("a", false, 1000)));
    assert!(!gate.admit(&event("a", false, 10)));
}

#[test]
fn test_zero_cooldown_admits_everything() {
    let mut gate = AlertGate::new(Duration::ZERO);
    assert!(gate.admit(&event("a", false, 0)));
    assert!(gate.admit(&event("a", false, 0)));
}

#[test]
fn test_clear_forgets_history() {
    let mut gate = AlertGate::default();
    assert!(gate.admit(&event("a", false, 0)));
    gate.clear();
    assert!(gate.admit(&event("a", false, 1)));
}
