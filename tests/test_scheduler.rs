use std::cell::Cell;
use std::rc::Rc;

use shmup_script::scheduler::{Firing, PeriodicAction};

/// A scheduler with a fixed period that counts its firings in a shared cell.
fn counting(period: f32, initial: Option<f32>) -> (PeriodicAction, Rc<Cell<u32>>) {
    let fired = Rc::new(Cell::new(0));
    let seen = Rc::clone(&fired);
    let action = PeriodicAction::new(
        move |_, _| period,
        initial,
        move |_: &mut (), _| {
            seen.set(seen.get() + 1);
            true
        },
    );
    (action, fired)
}

// ── Initial delay ─────────────────────────────────────────────────────────────

#[test]
fn waits_for_initial_delay() {
    let (mut action, fired) = counting(1.0, Some(0.5));
    action.tick(0.4);
    assert_eq!(fired.get(), 0);
    action.tick(0.1); // 0.5 reached
    assert_eq!(fired.get(), 1);
}

#[test]
fn zero_initial_delay_fires_on_first_positive_tick() {
    let (mut action, fired) = counting(1.0, Some(0.0));
    action.tick(0.01);
    assert_eq!(fired.get(), 1);
}

#[test]
fn missing_initial_delay_asks_the_generator() {
    // Generator is asked for firing 1 with count 0.
    let mut action = PeriodicAction::new(
        |count, _| if count == 0 { 2.0 } else { 0.5 },
        None,
        |_: &mut (), _| true,
    );
    assert_eq!(action.pending_delay(), 2.0);
    action.tick(2.0);
    assert_eq!(action.count(), 1);
    assert_eq!(action.pending_delay(), 0.5);
}

// ── Catch-up ──────────────────────────────────────────────────────────────────

#[test]
fn large_step_fires_every_elapsed_period() {
    let (mut action, fired) = counting(0.1, None);
    action.tick(1.0);
    // 1.0 / 0.1 = 10 firings despite float rounding
    assert_eq!(fired.get(), 10);
}

#[test]
fn many_small_steps_match_one_large_step() {
    let (mut small, small_fired) = counting(0.25, Some(0.0));
    let (mut large, large_fired) = counting(0.25, Some(0.0));
    for _ in 0..16 {
        small.tick(0.125);
    }
    large.tick(2.0);
    assert_eq!(small_fired.get(), large_fired.get());
    assert_eq!(large_fired.get(), 9); // t = 0, 0.25, ..., 2.0
}

#[test]
fn variable_delays_are_honoured() {
    // Delay after the n-th firing is n seconds: fires at t = 0, 1, 3.
    let times = Rc::new(std::cell::RefCell::new(Vec::new()));
    let log = Rc::clone(&times);
    let mut action = PeriodicAction::new(
        |count, _| count as f32,
        Some(0.0),
        move |_: &mut (), firing: Firing| {
            log.borrow_mut().push(firing.count);
            true
        },
    );
    action.tick(0.5); // t=0
    action.tick(1.0); // t=1.5 → fires at 1
    action.tick(2.0); // t=3.5 → fires at 3
    assert_eq!(*times.borrow(), vec![1, 2, 3]);
}

// ── Termination ───────────────────────────────────────────────────────────────

#[test]
fn stops_when_action_returns_false() {
    let mut action = PeriodicAction::new(
        |_, _| 1.0,
        Some(0.0),
        |_: &mut (), firing: Firing| firing.count < 3,
    );
    assert!(action.tick(1.5)); // fires at 0 and 1
    assert!(!action.tick(5.0)); // third firing returns false
    assert_eq!(action.count(), 3);
    assert!(!action.tick(5.0));
    assert_eq!(action.count(), 3); // never fires again
    assert!(!action.is_running());
}

#[test]
fn infinite_delay_never_fires() {
    let (mut action, fired) = counting(f32::INFINITY, Some(f32::INFINITY));
    action.tick(1e6);
    assert_eq!(fired.get(), 0);
    assert!(action.is_running());
}

#[test]
fn zero_period_is_bounded_per_update() {
    let (mut action, fired) = counting(0.0, Some(0.0));
    action.tick(0.1);
    assert!(fired.get() > 1);
    assert!(fired.get() <= 1024);
}

// ── Paused frames ─────────────────────────────────────────────────────────────

#[test]
fn zero_dt_is_a_no_op() {
    let (mut action, fired) = counting(0.5, Some(0.0));
    for _ in 0..10 {
        assert!(action.tick(0.0));
    }
    assert_eq!(fired.get(), 0);
    assert_eq!(action.elapsed(), 0.0);
}

// ── Context & firing snapshot ─────────────────────────────────────────────────

#[test]
fn action_writes_into_supplied_context() {
    let mut action: PeriodicAction<Vec<u32>> = PeriodicAction::new(
        |_, _| 1.0,
        Some(0.0),
        |out: &mut Vec<u32>, firing: Firing| {
            out.push(firing.count);
            true
        },
    );
    let mut out = Vec::new();
    action.update(&mut out, 2.5);
    assert_eq!(out, vec![1, 2, 3]);
}

#[test]
fn firing_reports_elapsed_time() {
    let snapshots = Rc::new(std::cell::RefCell::new(Vec::new()));
    let log = Rc::clone(&snapshots);
    let mut action = PeriodicAction::new(
        |_, _| 1.0,
        Some(1.0),
        move |_: &mut (), firing: Firing| {
            log.borrow_mut().push(firing);
            true
        },
    );
    action.tick(0.6);
    action.tick(0.6);
    let snapshots = snapshots.borrow();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].count, 1);
    assert!((snapshots[0].elapsed_total - 1.2).abs() < 1e-5);
    assert!((snapshots[0].elapsed_in_window - 1.2).abs() < 1e-5);
}
