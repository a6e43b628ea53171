use std::fmt::{Debug, Formatter};

use chrono::{DateTime, Local, TimeDelta};

#[derive(Copy, Clone, Eq, PartialEq)]
#[must_use]
pub struct Interval {
    /// Inclusive.
    pub start: DateTime<Local>,

    /// Exclusive.
    pub end: DateTime<Local>,
}

impl Debug for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}..{:?}", self.start, self.end)
    }
}

impl Interval {
    pub const fn new(start: DateTime<Local>, end: DateTime<Local>) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn duration(self) -> TimeDelta {
        self.end - self.start
    }

    #[must_use]
    pub fn contains(self, other: DateTime<Local>) -> bool {
        (self.start <= other) && (other < self.end)
    }

    /// Check whether the timestamp lies strictly between the bounds.
    #[must_use]
    pub fn surrounds(self, other: DateTime<Local>) -> bool {
        (self.start < other) && (other < self.end)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_contains_and_surrounds() {
        let start = Local.with_ymd_and_hms(2025, 10, 11, 4, 30, 0).unwrap();
        let end = Local.with_ymd_and_hms(2025, 10, 12, 0, 30, 0).unwrap();
        let interval = Interval::new(start, end);
        assert!(interval.contains(start));
        assert!(!interval.surrounds(start));
        assert!(!interval.contains(end));
        assert!(interval.surrounds(start + TimeDelta::minutes(1)));
        assert_eq!(interval.duration(), TimeDelta::hours(20));
    }
}
