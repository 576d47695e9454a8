use std::time::Duration;

use backup_supervisor::retry::{Backoff, BackoffPolicy, ProportionalJitter};

#[test]
fn exponential_intervals_double_until_capped() {
    let policy = BackoffPolicy::exponential(Duration::from_millis(100), Duration::from_millis(500));

    let intervals: Vec<u64> = (1..=5)
        .map(|attempt| policy.next_interval(attempt).as_millis() as u64)
        .collect();

    assert_eq!(intervals, vec![100, 200, 400, 500, 500]);
}

#[test]
fn exponential_interval_saturates_for_large_attempts() {
    let policy = BackoffPolicy::exponential(Duration::from_secs(1), Duration::from_secs(30))
        .with_factor(3);

    assert_eq!(policy.next_interval(200), Duration::from_secs(30));
    assert_eq!(policy.next_interval(u32::MAX), Duration::from_secs(30));
}

#[test]
fn constant_interval_never_changes() {
    let policy = BackoffPolicy::constant(Duration::from_millis(750));

    assert_eq!(policy.backoff(), Backoff::Constant(Duration::from_millis(750)));
    for attempt in [1, 2, 10, 1000] {
        assert_eq!(policy.next_interval(attempt), Duration::from_millis(750));
    }
}

#[test]
fn stop_predicate_honours_attempts_and_duration() {
    let by_attempts = BackoffPolicy::constant(Duration::from_secs(1)).with_max_attempts(3);
    assert!(!by_attempts.should_stop(2, Duration::from_secs(100)));
    assert!(by_attempts.should_stop(3, Duration::ZERO));

    let by_time = BackoffPolicy::constant(Duration::from_secs(1))
        .with_max_duration(Duration::from_secs(10));
    assert!(!by_time.should_stop(1000, Duration::from_secs(9)));
    assert!(by_time.should_stop(1, Duration::from_secs(10)));
}

#[test]
fn proportional_jitter_stays_within_bounds() {
    let policy = BackoffPolicy::constant(Duration::from_millis(1000))
        .with_jitter(ProportionalJitter::new(0.2));

    for attempt in 1..=200 {
        let interval = policy.next_interval(attempt);
        assert!(
            interval >= Duration::from_millis(800) && interval <= Duration::from_millis(1200),
            "interval {interval:?} outside ±20%"
        );
    }
}
