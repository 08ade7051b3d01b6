//! Absence window calculation for peak-hour scheduling.
//!
//! This module turns the configured daily peak windows plus margins into the
//! concrete "current" and "next" absence ranges relative to a reference
//! instant. It is pure chrono arithmetic with no I/O, which keeps the
//! scheduler's timing decisions fully testable.
//!
//! ## Key Functionality
//! - **Margin application**: start/end margins widen the window, the prog
//!   margin moves the start earlier so commands are pre-staged ahead of the
//!   nominal boundary
//! - **Occurrence selection**: today/tomorrow for the next window,
//!   today/yesterday for the current one, with overnight windows rolling the
//!   end over midnight
//! - **Multi-rule selection**: the earliest candidate wins; ties break in
//!   rule order, first rule wins
//!
//! All arithmetic is timezone-naive local time. Time-of-day adjustments wrap
//! around midnight, matching the wall-clock intent of a domestic schedule.

use chrono::{Days, Duration, NaiveDateTime, NaiveTime};

/// One configured daily peak window. The heater is kept in absence mode
/// between `daily_start` and `daily_end` (plus margins) every day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsenceRule {
    pub daily_start: NaiveTime,
    pub daily_end: NaiveTime,
}

/// Global margins applied to every rule, in signed minutes.
///
/// `start` widens the window earlier, `end` widens it later, and `prog`
/// additionally moves the computed start earlier so the device is programmed
/// ahead of the boundary it must honor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Margins {
    pub start: Duration,
    pub end: Duration,
    pub prog: Duration,
}

impl Margins {
    pub fn from_minutes(start: i64, end: i64, prog: i64) -> Self {
        Self {
            start: Duration::minutes(start),
            end: Duration::minutes(end),
            prog: Duration::minutes(prog),
        }
    }

    pub fn zero() -> Self {
        Self::from_minutes(0, 0, 0)
    }
}

/// A concrete absence interval. Invariant: `start < end`.
///
/// Ranges are ephemeral: recomputed every scheduler iteration and never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsenceRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

/// Margin-adjusted start time-of-day for a rule (wraps around midnight).
fn adjusted_start_tod(rule: &AbsenceRule, margins: &Margins) -> NaiveTime {
    rule.daily_start - margins.start - margins.prog
}

/// Margin-adjusted end time-of-day for a rule (wraps around midnight).
fn adjusted_end_tod(rule: &AbsenceRule, margins: &Margins) -> NaiveTime {
    rule.daily_end + margins.end
}

/// Derive the end instant from a chosen start. The end lands on the start's
/// date, rolling to the next day for overnight windows.
fn end_for_start(start: NaiveDateTime, end_tod: NaiveTime) -> NaiveDateTime {
    let start_tod = start.time();
    let end_date = if end_tod < start_tod {
        start.date() + Days::new(1)
    } else {
        start.date()
    };
    end_date.and_time(end_tod)
}

/// Next occurrence of a single rule's window at or after `now`.
fn next_for_rule(rule: &AbsenceRule, margins: &Margins, now: NaiveDateTime) -> AbsenceRange {
    let start_tod = adjusted_start_tod(rule, margins);
    let end_tod = adjusted_end_tod(rule, margins);

    // Still ahead of us today, otherwise tomorrow at the same time-of-day.
    let start_date = if start_tod >= now.time() {
        now.date()
    } else {
        now.date() + Days::new(1)
    };
    let start = start_date.and_time(start_tod);

    AbsenceRange {
        start,
        end: end_for_start(start, end_tod),
    }
}

/// Most recent occurrence of a single rule's window, if `now` falls strictly
/// inside it.
fn current_for_rule(
    rule: &AbsenceRule,
    margins: &Margins,
    now: NaiveDateTime,
) -> Option<AbsenceRange> {
    let start_tod = adjusted_start_tod(rule, margins);
    let end_tod = adjusted_end_tod(rule, margins);

    // Today's occurrence if it has already begun, otherwise yesterday's.
    let start_date = if start_tod > now.time() {
        now.date() - Days::new(1)
    } else {
        now.date()
    };
    let start = start_date.and_time(start_tod);
    let end = end_for_start(start, end_tod);

    if start < now && now < end {
        Some(AbsenceRange { start, end })
    } else {
        None
    }
}

/// Compute the next absence range across all rules.
///
/// The earliest candidate start wins; when two rules produce the same start
/// instant the first rule in configuration order wins. Returns `None` only
/// for an empty rule list, which configuration validation rules out.
pub fn next_absence_range(
    rules: &[AbsenceRule],
    margins: &Margins,
    now: NaiveDateTime,
) -> Option<AbsenceRange> {
    let mut best: Option<AbsenceRange> = None;
    for rule in rules {
        let candidate = next_for_rule(rule, margins, now);
        match best {
            Some(current_best) if candidate.start >= current_best.start => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// Compute the absence range containing `now`, if any.
///
/// Rules are assumed non-overlapping by configuration; the first match in
/// rule order is returned.
pub fn current_absence_range(
    rules: &[AbsenceRule],
    margins: &Margins,
    now: NaiveDateTime,
) -> Option<AbsenceRange> {
    rules
        .iter()
        .find_map(|rule| current_for_rule(rule, margins, now))
}
