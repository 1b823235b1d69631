//! Recurrence date arithmetic.
//! Works on calendar fields, not elapsed durations: the time of day is always kept.
//!
//! Month and year steps keep the day-of-month and let excess days spill into
//! the following month, so Jan 31 + 1 month lands on Mar 2 (Mar 3 outside leap
//! years) and Feb 29 + 1 year lands on Mar 1. No clamping is applied.

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Weekday};

use crate::reminder::RecurrenceRule;

/// Compute the next due time for `current` under `rule`.
/// Returns `None` for `RecurrenceRule::None` or if the result leaves chrono's range.
pub fn next_occurrence(current: NaiveDateTime, rule: RecurrenceRule) -> Option<NaiveDateTime> {
    match rule {
        RecurrenceRule::None => None,
        RecurrenceRule::Daily => current.checked_add_days(Days::new(1)),
        RecurrenceRule::Weekdays => advance_until(current, |wd| !is_weekend(wd)),
        RecurrenceRule::Weekends => advance_until(current, is_weekend),
        RecurrenceRule::Weekly => current.checked_add_days(Days::new(7)),
        RecurrenceRule::Biweekly => current.checked_add_days(Days::new(14)),
        RecurrenceRule::Monthly => add_months_overflowing(current, 1),
        RecurrenceRule::Yearly => add_months_overflowing(current, 12),
    }
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

/// Step one day at a time until `accept` matches. Terminates within a week.
fn advance_until(current: NaiveDateTime, accept: fn(Weekday) -> bool) -> Option<NaiveDateTime> {
    let mut next = current;
    loop {
        next = next.checked_add_days(Days::new(1))?;
        if accept(next.weekday()) {
            return Some(next);
        }
    }
}

/// Add to the month field and normalize an out-of-range day forward.
fn add_months_overflowing(current: NaiveDateTime, months: u32) -> Option<NaiveDateTime> {
    let total = current.year() * 12 + current.month0() as i32 + months as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let date = first.checked_add_days(Days::new(u64::from(current.day() - 1)))?;
    Some(date.and_time(current.time()))
}
