//! Calendar-day windows evaluated in a single fixed UTC offset.
//!
//! Every window boundary is a whole day in one configured offset, so two
//! clients asking for "the last 30 days" from different local timezones get
//! the same window (and the same cache entry).

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// An inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DayWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A half-open instant range `[start, end)` used to query collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        *instant >= self.start && *instant < self.end
    }
}

impl DayWindow {
    /// Create a window, swapping the bounds if they are reversed.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// A window covering a single day.
    pub fn single(day: NaiveDate) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    /// The `days`-day window ending on (and including) `end`.
    ///
    /// A zero-day request is treated as a single day.
    pub fn ending(end: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self {
            start: end - Duration::days(span),
            end,
        }
    }

    /// Normalize two arbitrary instants to the calendar days they fall on in
    /// `offset`.
    pub fn from_instants(start: DateTime<Utc>, end: DateTime<Utc>, offset: &FixedOffset) -> Self {
        Self::new(day_of(&start, offset), day_of(&end, offset))
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        day >= self.start && day <= self.end
    }

    /// Number of days covered, inclusive of both ends.
    pub fn days(&self) -> u32 {
        ((self.end - self.start).num_days() + 1) as u32
    }

    /// The last `days` days of this window, never extending before `start`.
    pub fn recent(&self, days: u32) -> Self {
        let recent = Self::ending(self.end, days);
        Self {
            start: recent.start.max(self.start),
            end: self.end,
        }
    }

    /// Instant bounds of the window in `offset`, as a half-open range.
    pub fn utc_bounds(&self, offset: &FixedOffset) -> TimeRange {
        TimeRange {
            start: start_of_day(self.start, offset),
            end: start_of_day(self.end, offset) + Duration::days(1),
        }
    }

    /// Iterate over every day in the window, oldest first.
    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

/// The calendar day an instant falls on in `offset`.
pub fn day_of(instant: &DateTime<Utc>, offset: &FixedOffset) -> NaiveDate {
    instant.with_timezone(offset).date_naive()
}

/// Midnight of `day` in `offset`, expressed in UTC.
fn start_of_day(day: NaiveDate, offset: &FixedOffset) -> DateTime<Utc> {
    let local_midnight = day.and_time(NaiveTime::MIN);
    let utc = local_midnight - Duration::seconds(i64::from(offset.local_minus_utc()));
    Utc.from_utc_datetime(&utc)
}
