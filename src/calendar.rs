//! Calendar month windows
//!
//! Uptime is accounted per calendar month, so everything downstream works in
//! terms of a [`MonthWindow`]: the first instant of a month, its day count
//! (variable, leap-year aware) and its total minutes.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};

/// Minutes in a day.
const MINUTES_PER_DAY: u32 = 24 * 60;

/// One calendar month as an accounting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindow {
    /// First instant of the month (UTC midnight on the 1st)
    pub start: DateTime<Utc>,

    /// Number of days in the month
    pub days: u32,

    /// days * 1440
    pub total_minutes: u32,
}

impl MonthWindow {
    /// Window for the calendar month containing `instant`.
    pub fn containing(instant: DateTime<Utc>) -> Self {
        // (year, month) of a valid DateTime always form a valid first-of-month
        Self::for_month(instant.year(), instant.month()).unwrap_or(Self {
            start: instant,
            days: 30,
            total_minutes: 30 * MINUTES_PER_DAY,
        })
    }

    /// Window for a specific (year, month). `None` for an out-of-range month.
    pub fn for_month(year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let (next_year, next_month) = next_month(year, month);
        let next_first = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;

        let days = (next_first - first).num_days() as u32;
        let start = first.and_hms_opt(0, 0, 0)?.and_utc();

        Some(Self {
            start,
            days,
            total_minutes: days * MINUTES_PER_DAY,
        })
    }

    /// Exclusive upper bound of the window (first instant of the next month).
    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::days(self.days as i64)
    }

    /// Whether `instant` falls within this window.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end()
    }

    /// (year, month) of this window.
    pub fn year_month(&self) -> (i32, u32) {
        (self.start.year(), self.start.month())
    }
}

/// Do two instants fall in the same calendar year and month?
pub fn same_month(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

/// The (year, month) immediately after the given one.
pub fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// The (year, month) immediately before the given one.
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month <= 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}
