use std::cell::RefCell;
use std::rc::Rc;

use shmup_script::pattern::PackedPattern;
use shmup_script::PatternChannel;

/// Listener that records every pattern it receives.
fn recorder() -> (Rc<RefCell<Vec<u64>>>, impl FnMut(PackedPattern) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    (seen, move |p: PackedPattern| log.borrow_mut().push(p.0))
}

#[test]
fn fresh_channel_has_no_pattern() {
    let mut channel = PatternChannel::new();
    assert_eq!(channel.last_pattern(), None);

    // Nothing to replay
    let (seen, listener) = recorder();
    channel.subscribe(1, listener);
    assert!(seen.borrow().is_empty());

    assert!(channel.publish(PackedPattern(5)));
    assert_eq!(*seen.borrow(), vec![5]);
}

#[test]
fn late_subscriber_gets_the_current_pattern() {
    let mut channel = PatternChannel::with_pattern(PackedPattern(11));
    channel.publish(PackedPattern(22));

    let (seen, listener) = recorder();
    channel.subscribe(1, listener);
    assert_eq!(*seen.borrow(), vec![22]);
}

#[test]
fn repeated_pattern_is_not_broadcast() {
    let mut channel = PatternChannel::with_pattern(PackedPattern(1));
    let (seen, listener) = recorder();
    channel.subscribe(1, listener);

    assert!(!channel.publish(PackedPattern(1)));
    assert!(channel.publish(PackedPattern(2)));
    assert!(!channel.publish(PackedPattern(2)));
    assert!(channel.publish(PackedPattern(1)));
    // Replay, then two real changes
    assert_eq!(*seen.borrow(), vec![1, 2, 1]);
}

#[test]
fn every_subscriber_hears_a_change() {
    let mut channel = PatternChannel::with_pattern(PackedPattern(0));
    let (a, la) = recorder();
    let (b, lb) = recorder();
    channel.subscribe(1, la);
    channel.subscribe(2, lb);
    assert_eq!(channel.subscriber_count(), 2);

    channel.publish(PackedPattern(9));
    assert_eq!(*a.borrow(), vec![0, 9]);
    assert_eq!(*b.borrow(), vec![0, 9]);
}

#[test]
fn unsubscribed_listener_stops_hearing() {
    let mut channel = PatternChannel::with_pattern(PackedPattern(0));
    let (seen, listener) = recorder();
    channel.subscribe(7, listener);

    assert!(channel.unsubscribe(7));
    assert!(!channel.unsubscribe(7));
    assert_eq!(channel.subscriber_count(), 0);

    channel.publish(PackedPattern(3));
    assert_eq!(*seen.borrow(), vec![0]);
}

#[test]
fn resubscribing_replaces_the_listener() {
    let mut channel = PatternChannel::with_pattern(PackedPattern(4));
    let (old, lo) = recorder();
    let (new, ln) = recorder();
    channel.subscribe(1, lo);
    channel.subscribe(1, ln);
    assert_eq!(channel.subscriber_count(), 1);

    channel.publish(PackedPattern(8));
    assert_eq!(*old.borrow(), vec![4]);
    assert_eq!(*new.borrow(), vec![4, 8]);
}

#[test]
fn shared_channel_starts_with_its_pattern() {
    let shared = PatternChannel::shared(PackedPattern(42));
    assert_eq!(shared.borrow().last_pattern(), Some(PackedPattern(42)));
}
