//! Shared primitive types used across the engine.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Stable employee identifier (the roster's employee code).
pub type EmployeeId = String;

/// Department code as used by the time-tracking system.
pub type DepartmentCode = String;

/// A chat identity a report can be delivered to (Slack user email or id).
pub type RecipientId = String;

/// Identifier of one runner invocation.
pub type RunId = String;

/// Fresh identifier for a runner invocation.
pub fn new_run_id() -> RunId {
    format!("run-{}", uuid::Uuid::new_v4())
}

/// A calendar month. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year:  i32,
    pub month: u32,
}

impl YearMonth {
    /// `month` must be 1..=12 (checked in debug builds). Use `parse` for untrusted input.
    pub fn new(year: i32, month: u32) -> Self {
        debug_assert!((1..=12).contains(&month), "month out of range: {month}");
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self { year: date.year(), month: date.month() }
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    /// `YYYYMM`, used in cache file names.
    pub fn compact(self) -> String {
        format!("{:04}{:02}", self.year, self.month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (y, m) = s
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got {s:?}"))?;
        let year: i32 = y.parse().map_err(|_| format!("bad year in {s:?}"))?;
        let month: u32 = m.parse().map_err(|_| format!("bad month in {s:?}"))?;
        if !(1..=12).contains(&month) {
            return Err(format!("month out of range in {s:?}"));
        }
        Ok(Self { year, month })
    }
}

impl Serialize for YearMonth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
