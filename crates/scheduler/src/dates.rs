//! Leap-year-safe calendar helpers used by the scheduling engine.

use chrono::{Datelike, Days, NaiveDate};

/// Standard Gregorian leap-year rule.
#[must_use]
pub fn is_leap_year(year: i32) -> bool {
    if year % 400 == 0 {
        return true;
    }
    if year % 100 == 0 {
        return false;
    }
    year % 4 == 0
}

/// Build a date, substituting Feb 28 for Feb 29 in non-leap years.
///
/// Any other invalid combination yields `None`.
#[must_use]
pub fn safe_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day).or_else(|| {
        if month == 2 && day == 29 {
            NaiveDate::from_ymd_opt(year, 2, 28)
        } else {
            None
        }
    })
}

/// Yearly occurrences of `anchor`'s month/day between `from` and `to`
/// inclusive, with the Feb-29 fallback applied per year.
#[must_use]
pub fn yearly_occurrences(anchor: NaiveDate, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    for year in from.year()..=to.year() {
        if let Some(date) = safe_date(year, anchor.month(), anchor.day())
            && date >= from
            && date <= to
        {
            dates.push(date);
        }
    }
    dates
}

/// True iff the following day is the first of the next month.
#[must_use]
pub fn is_month_end(date: NaiveDate) -> bool {
    match date.checked_add_days(Days::new(1)) {
        Some(next) => next.day() == 1,
        None => false,
    }
}

/// First day of the month containing `date`. Used for Nevada's shifted
/// birthday anchor.
#[must_use]
pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1).expect("day 1 always valid")
}

/// Last day of the month containing `date`.
#[must_use]
pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    let (next_year, next_month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).expect("day 1 always valid")
        - Days::new(1)
}
