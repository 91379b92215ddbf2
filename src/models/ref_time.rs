use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::errors::SchedulerError;

/// A forecast cycle reference time, rendered as a 10-character `YYYYMMDDHH`
/// stamp. Arithmetic is calendar arithmetic at hour granularity (proleptic
/// Gregorian, so leap days and month rollover come for free from chrono).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RefTime(NaiveDateTime);

impl RefTime {
    /// Hour-of-day of this cycle, 0..=23.
    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn increment(&self, hours: i64) -> RefTime {
        RefTime(self.0 + Duration::hours(hours))
    }

    pub fn decrement(&self, hours: i64) -> RefTime {
        RefTime(self.0 - Duration::hours(hours))
    }

    /// The earliest cycle `>= self` whose hour is in `valid_hours`, rolling
    /// into the next day if the stamp hour is past the last valid hour.
    /// A stamp whose hour is already valid is returned unchanged.
    ///
    /// `valid_hours` must be sorted ascending and non-empty.
    pub fn nearest(&self, valid_hours: &[u32]) -> RefTime {
        debug_assert!(!valid_hours.is_empty());
        let h = self.hour();
        for &v in valid_hours {
            if v >= h {
                return self.increment(i64::from(v - h));
            }
        }
        self.increment(i64::from(valid_hours[0] + 24 - h))
    }

    /// The next cycle strictly after `self` at which a task with the given
    /// valid hours runs, wrapping to the first valid hour of the next day
    /// past the last. The stamp's own hour is assumed valid.
    pub fn next(&self, valid_hours: &[u32]) -> RefTime {
        debug_assert!(!valid_hours.is_empty());
        let h = self.hour();
        for &v in valid_hours {
            if v > h {
                return self.increment(i64::from(v - h));
            }
        }
        self.increment(i64::from(valid_hours[0] + 24 - h))
    }
}

impl FromStr for RefTime {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 10 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(SchedulerError::BadStamp(s.to_string()));
        }
        let date = NaiveDate::parse_from_str(&s[..8], "%Y%m%d")
            .map_err(|_| SchedulerError::BadStamp(s.to_string()))?;
        let hour: u32 = s[8..]
            .parse()
            .map_err(|_| SchedulerError::BadStamp(s.to_string()))?;
        let stamp = date
            .and_hms_opt(hour, 0, 0)
            .ok_or_else(|| SchedulerError::BadStamp(s.to_string()))?;
        Ok(RefTime(stamp))
    }
}

impl fmt::Display for RefTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d%H"))
    }
}
