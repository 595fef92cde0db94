//! Voting-window behavior against a hand-driven clock.

use std::sync::Arc;
use std::time::Duration;

use kartlobby_tick::{Clock, ManualClock, VotingTimer};

fn timer() -> (Arc<ManualClock>, VotingTimer) {
    let clock = Arc::new(ManualClock::new());
    let timer = VotingTimer::new(clock.clone() as Arc<dyn Clock>);
    (clock, timer)
}

#[test]
fn test_voting_is_over_before_any_period() {
    let (_clock, timer) = timer();
    assert!(timer.is_over());
    assert_eq!(timer.remaining(), 0.0);
    assert_eq!(timer.max_time(), 0.0);
}

#[test]
fn test_two_second_window() {
    let (clock, timer) = timer();
    timer.start(2.0);
    assert_eq!(timer.max_time(), 2.0);
    assert!(!timer.is_over());

    clock.advance(Duration::from_millis(1000));
    assert!(!timer.is_over());
    assert!((timer.remaining() - 1.0).abs() < 1e-3);

    clock.advance(Duration::from_millis(1001));
    assert!(timer.is_over());
    assert_eq!(timer.remaining(), 0.0);
}

#[test]
fn test_closes_exactly_at_deadline() {
    let (clock, timer) = timer();
    timer.start(0.5);
    clock.advance(Duration::from_millis(499));
    assert!(!timer.is_over());
    clock.advance(Duration::from_millis(1));
    assert!(timer.is_over());
}

#[test]
fn test_restart_overwrites_the_window() {
    let (clock, timer) = timer();
    timer.start(1.0);
    clock.advance(Duration::from_millis(900));
    timer.start(3.0);

    assert_eq!(timer.max_time(), 3.0);
    assert_eq!(timer.deadline_ms(), 3900);
    clock.advance(Duration::from_millis(200));
    assert!(!timer.is_over());
}

#[test]
fn test_window_is_rounded_to_milliseconds() {
    let (_clock, timer) = timer();
    timer.start(1.2346);
    assert_eq!(timer.deadline_ms(), 1235);
}

#[test]
fn test_remaining_never_exceeds_window() {
    let (clock, timer) = timer();
    for secs in [0.0f32, 0.25, 1.0, 7.5, 30.0] {
        timer.start(secs);
        assert!(timer.remaining() <= secs);
        clock.advance(Duration::from_millis(10));
        assert!(timer.remaining() <= secs);
    }
}

#[test]
fn test_negative_or_nan_window_is_already_closed() {
    let (_clock, timer) = timer();
    timer.start(-3.0);
    assert!(timer.is_over());
    timer.start(f32::NAN);
    assert!(timer.is_over());
    assert_eq!(timer.max_time(), 0.0);
}

#[test]
fn test_deadline_readable_from_other_threads() {
    let (clock, timer) = timer();
    let timer = Arc::new(timer);
    timer.start(5.0);

    let reader = {
        let timer = Arc::clone(&timer);
        std::thread::spawn(move || timer.remaining())
    };
    let remaining = reader.join().unwrap();
    assert!(remaining <= 5.0 && remaining > 4.0);
    drop(clock);
}
