// Property-based tests for schedule normalization

use board::errors::BoardError;
use board::schedule::ScheduleDescriptor;
use proptest::prelude::*;

/// *For any* duration D >= 0 and creation time T, a Duration schedule with
/// no explicit start stores the window [T, T + D].
#[test]
fn property_duration_window_from_creation_time() {
    proptest!(|(now in 0i64..=4_000_000_000i64, duration in 0i64..=10_000_000i64)| {
        let spec = ScheduleDescriptor::Duration { start: None, duration }
            .normalize(now)
            .unwrap();
        prop_assert_eq!(spec.start, now);
        prop_assert_eq!(spec.stop, Some(now + duration));
        prop_assert_eq!(spec.interval, None);
    });
}

/// *For any* explicit start, the Duration window is anchored at that start,
/// not at the creation time.
#[test]
fn property_duration_window_from_explicit_start() {
    proptest!(|(
        now in 0i64..=4_000_000_000i64,
        start in 0i64..=4_000_000_000i64,
        duration in 0i64..=10_000_000i64
    )| {
        let spec = ScheduleDescriptor::Duration { start: Some(start), duration }
            .normalize(now)
            .unwrap();
        prop_assert_eq!(spec.start, start);
        prop_assert_eq!(spec.stop, Some(start + duration));
    });
}

/// *For any* normalized schedule: stop, if present, is >= start, and
/// interval, if present, is > 0.
#[test]
fn property_normalized_spec_invariants() {
    let descriptor = prop_oneof![
        (0i64..=4_000_000_000i64).prop_map(|start| ScheduleDescriptor::Once { start }),
        (proptest::option::of(0i64..=4_000_000_000i64), 0i64..=10_000_000i64)
            .prop_map(|(start, duration)| ScheduleDescriptor::Duration { start, duration }),
        (
            1i64..=10_000_000i64,
            proptest::option::of(0i64..=4_000_000_000i64),
            proptest::option::of(0i64..=10_000_000i64),
        )
            .prop_map(|(interval, start, extra)| ScheduleDescriptor::Interval {
                interval,
                start,
                // Keep stop at or after the effective start.
                stop: extra.map(|e| start.unwrap_or(1_000_000) + e),
                step: None,
                lambda: None,
            }),
    ];

    proptest!(|(descriptor in descriptor, now in 0i64..=2_000_000_000i64)| {
        // A random stop can still precede a defaulted start; rejection is
        // the correct outcome there.
        if let Ok(spec) = descriptor.normalize(now) {
            if let Some(stop) = spec.stop {
                prop_assert!(stop >= spec.start);
            }
            if let Some(interval) = spec.interval {
                prop_assert!(interval > 0);
            }
        }
    });
}

/// *For any* non-positive interval, normalization rejects the descriptor.
#[test]
fn property_non_positive_interval_rejected() {
    proptest!(|(interval in -10_000i64..=0i64, now in 0i64..=4_000_000_000i64)| {
        let result = ScheduleDescriptor::Interval {
            interval,
            start: None,
            stop: None,
            step: None,
            lambda: None,
        }
        .normalize(now);
        prop_assert!(matches!(result, Err(BoardError::InvalidSchedule(_))));
    });
}

/// *For any* creation time, a Repeat schedule is rejected as Unsupported.
#[test]
fn property_repeat_always_unsupported() {
    proptest!(|(now in 0i64..=4_000_000_000i64)| {
        let result = ScheduleDescriptor::Repeat.normalize(now);
        prop_assert!(matches!(result, Err(BoardError::Unsupported(_))));
    });
}
