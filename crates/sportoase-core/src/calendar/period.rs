//! School periods and their wall-clock bounds.

use std::fmt;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Number of periods in a school day.
pub const PERIODS_PER_DAY: u8 = 6;

/// One of the six daily time blocks, numbered 1 to 6.
///
/// A `Period` can only be built from a number in range, so every lookup keyed
/// by it is infallible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Period(u8);

impl Period {
    pub fn new(number: u8) -> Option<Self> {
        (1..=PERIODS_PER_DAY).contains(&number).then_some(Self(number))
    }

    /// Accepts any integer, e.g. straight from a request or a SQLite column.
    pub fn from_i64(number: i64) -> Option<Self> {
        u8::try_from(number).ok().and_then(Self::new)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        usize::from(self.0 - 1)
    }

    /// All periods of a day in order.
    pub fn all() -> impl Iterator<Item = Period> {
        (1..=PERIODS_PER_DAY).map(Period)
    }
}

impl TryFrom<u8> for Period {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Period::new(value).ok_or_else(|| format!("period must be between 1 and {PERIODS_PER_DAY}, got {value}"))
    }
}

impl From<Period> for u8 {
    fn from(period: Period) -> Self {
        period.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Start and end of a period, local wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodTime {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl fmt::Display for PeriodTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Three-letter weekday code stored alongside reservations ("Mon" .. "Sun").
pub fn weekday_code(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

/// Parse a weekday code; accepts the same spellings as chrono.
pub fn parse_weekday(code: &str) -> Option<Weekday> {
    code.trim().parse::<Weekday>().ok()
}

pub fn is_weekend(weekday: Weekday) -> bool {
    matches!(weekday, Weekday::Sat | Weekday::Sun)
}
