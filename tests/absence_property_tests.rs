//! Property-based tests for the absence window calculator.
//!
//! These pin down the invariants the scheduler relies on: the calculator is
//! a pure function, wider margins only ever widen the window, and the
//! current and next windows never overlap.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use offpeak::absence::{AbsenceRule, Margins, current_absence_range, next_absence_range};
use proptest::prelude::*;

fn datetime(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

fn window(start_hour: u32, start_minute: u32, length_minutes: i64) -> AbsenceRule {
    let daily_start = NaiveTime::from_hms_opt(start_hour, start_minute, 0).unwrap();
    AbsenceRule {
        daily_start,
        daily_end: daily_start + Duration::minutes(length_minutes),
    }
}

proptest! {
    #[test]
    fn next_is_a_pure_function(
        start_hour in 6u32..20,
        start_minute in 0u32..60,
        length_minutes in 30i64..240,
        now_hour in 0u32..24,
        now_minute in 0u32..60,
        start_margin in 0i64..60,
        end_margin in 0i64..60,
        prog_margin in 0i64..30,
    ) {
        let rules = [window(start_hour, start_minute, length_minutes)];
        let margins = Margins::from_minutes(start_margin, end_margin, prog_margin);
        let now = datetime(10, now_hour, now_minute);

        prop_assert_eq!(
            next_absence_range(&rules, &margins, now),
            next_absence_range(&rules, &margins, now)
        );
        prop_assert_eq!(
            current_absence_range(&rules, &margins, now),
            current_absence_range(&rules, &margins, now)
        );
    }

    #[test]
    fn next_range_is_well_formed_and_ahead(
        start_hour in 6u32..20,
        start_minute in 0u32..60,
        length_minutes in 30i64..240,
        now_hour in 0u32..24,
        now_minute in 0u32..60,
        start_margin in 0i64..60,
        end_margin in 0i64..60,
    ) {
        let rules = [window(start_hour, start_minute, length_minutes)];
        let margins = Margins::from_minutes(start_margin, end_margin, 0);
        let now = datetime(10, now_hour, now_minute);

        let next = next_absence_range(&rules, &margins, now).unwrap();
        prop_assert!(next.start < next.end);
        prop_assert!(next.start.time() >= now.time() || next.start.date() > now.date());
    }

    #[test]
    fn growing_start_margin_never_delays_the_window(
        start_hour in 6u32..20,
        start_minute in 0u32..60,
        length_minutes in 30i64..240,
        start_margin in 0i64..60,
        extra in 0i64..60,
    ) {
        let rules = [window(start_hour, start_minute, length_minutes)];
        // Observe from 02:00, well before any adjusted start can land, so
        // both computations pick today's occurrence
        let now = datetime(10, 2, 0);

        let narrow = Margins::from_minutes(start_margin, 0, 0);
        let wide = Margins::from_minutes(start_margin + extra, 0, 0);

        let narrow_start = next_absence_range(&rules, &narrow, now).unwrap().start;
        let wide_start = next_absence_range(&rules, &wide, now).unwrap().start;
        prop_assert!(wide_start <= narrow_start);
    }

    #[test]
    fn growing_end_margin_never_shortens_the_window(
        start_hour in 6u32..20,
        start_minute in 0u32..60,
        length_minutes in 30i64..120,
        end_margin in 0i64..60,
        extra in 0i64..60,
    ) {
        let rules = [window(start_hour, start_minute, length_minutes)];
        let now = datetime(10, 2, 0);

        let narrow = Margins::from_minutes(0, end_margin, 0);
        let wide = Margins::from_minutes(0, end_margin + extra, 0);

        let narrow_end = next_absence_range(&rules, &narrow, now).unwrap().end;
        let wide_end = next_absence_range(&rules, &wide, now).unwrap().end;
        prop_assert!(wide_end >= narrow_end);
    }

    #[test]
    fn current_and_next_never_overlap(
        morning_shift in 0u32..2,
        margin in 0i64..15,
        now_hour in 0u32..24,
        now_minute in 0u32..60,
    ) {
        // Two disjoint daily windows, morning and evening
        let rules = [
            window(6 + morning_shift, 0, 180),
            window(17, 0, 240),
        ];
        let margins = Margins::from_minutes(margin, margin, 0);
        let now = datetime(10, now_hour, now_minute);

        if let Some(current) = current_absence_range(&rules, &margins, now) {
            prop_assert!(current.start < now && now < current.end);
            let next = next_absence_range(&rules, &margins, now).unwrap();
            prop_assert!(
                next.start >= current.end,
                "next {:?} overlaps current {:?}", next, current
            );
        }
    }

    #[test]
    fn an_instant_is_never_inside_two_rules(
        margin in 0i64..15,
        now_hour in 0u32..24,
        now_minute in 0u32..60,
    ) {
        let morning = window(6, 0, 180);
        let evening = window(17, 0, 240);
        let margins = Margins::from_minutes(margin, margin, 0);
        let now = datetime(10, now_hour, now_minute);

        let in_morning = current_absence_range(&[morning], &margins, now).is_some();
        let in_evening = current_absence_range(&[evening], &margins, now).is_some();
        prop_assert!(!(in_morning && in_evening));
    }
}
