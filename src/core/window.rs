//! Daily off-peak tariff window.
//!
//! The window is a pair of naive times of day. A window whose start is later than its end
//! crosses midnight, for example `23:30..04:15`.

use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use chrono::{DateTime, Days, Local, NaiveDate, NaiveTime, TimeDelta, TimeZone, Timelike};

use crate::{core::interval::Interval, error::ConfigurationInvalid};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[must_use]
pub struct EcoWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl EcoWindow {
    /// Build the window, rejecting the zero-length `start == end`.
    pub fn try_new(start: NaiveTime, end: NaiveTime) -> Result<Self, ConfigurationInvalid> {
        let start = truncate_to_minute(start);
        let end = truncate_to_minute(end);
        if start == end {
            return Err(ConfigurationInvalid::EmptyWindow(start));
        }
        Ok(Self { start, end })
    }

    #[must_use]
    pub const fn start(self) -> NaiveTime {
        self.start
    }

    #[must_use]
    pub const fn end(self) -> NaiveTime {
        self.end
    }

    #[must_use]
    pub fn crosses_midnight(self) -> bool {
        self.start > self.end
    }

    /// Check whether the time of day falls inside the window.
    ///
    /// The start is exclusive and the end is inclusive.
    #[must_use]
    pub fn contains(self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            self.start < time && time <= self.end
        } else {
            time > self.start || time <= self.end
        }
    }

    /// Today's window start if it has not passed yet, otherwise tomorrow's.
    pub fn next_start(self, now: DateTime<Local>) -> DateTime<Local> {
        let start = at(now.date_naive(), self.start);
        if now > start { at(next_day(now.date_naive()), self.start) } else { start }
    }

    /// Today's window start if it is not in the future, otherwise yesterday's.
    pub fn last_start(self, before: DateTime<Local>) -> DateTime<Local> {
        let start = at(before.date_naive(), self.start);
        if start > before { at(previous_day(before.date_naive()), self.start) } else { start }
    }

    /// The first window end at or after the instant.
    pub fn next_end(self, after: DateTime<Local>) -> DateTime<Local> {
        let end = at(after.date_naive(), self.end);
        if after > end { at(next_day(after.date_naive()), self.end) } else { end }
    }

    /// Nominal window length, ignoring daylight saving transitions.
    #[must_use]
    pub fn duration(self) -> TimeDelta {
        let duration = self.end - self.start;
        if self.crosses_midnight() { duration + TimeDelta::days(1) } else { duration }
    }

    /// The window occurrence that starts at the given instant.
    pub fn occurrence(self, start: DateTime<Local>) -> Interval {
        Interval::new(start, self.next_end(start))
    }

    /// The non-off-peak part of the day that follows the occurrence starting at `start`:
    /// from the occurrence end until the next occurrence start.
    pub fn following_day(self, start: DateTime<Local>) -> Interval {
        Interval::new(self.next_end(start), at(next_day(start.date_naive()), self.start))
    }
}

impl Display for EcoWindow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}–{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Parse `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ConfigurationInvalid> {
    NaiveTime::from_str(value)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .map_err(|_| ConfigurationInvalid::TimeOfDay(value.to_string()))
}

/// Combine the local date and time of day, resolving daylight saving transitions
/// to the earliest valid instant.
pub fn at(date: NaiveDate, time: NaiveTime) -> DateTime<Local> {
    let naive = date.and_time(time);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| Local.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest())
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}

fn next_day(date: NaiveDate) -> NaiveDate {
    date.checked_add_days(Days::new(1)).unwrap_or(date)
}

fn previous_day(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(1)).unwrap_or(date)
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    time.with_second(0).and_then(|time| time.with_nanosecond(0)).unwrap_or(time)
}
