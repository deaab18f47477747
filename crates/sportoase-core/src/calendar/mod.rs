//! Static weekly calendar: which activity runs in which period.
//!
//! Each (weekday, period) pair is either a fixed offer with a preset label or
//! free choice, where the requester picks a module from the catalog. An
//! administrator can override the fixed label per (weekday, period); those
//! overrides live in the database and are passed in at lookup time.

mod period;

pub use period::{is_weekend, parse_weekday, weekday_code, Period, PeriodTime, PERIODS_PER_DAY};

use std::collections::HashMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::storage::config::CalendarConfig;

/// Whether a slot has a preset activity or lets the requester choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferKind {
    Fixed,
    Free,
}

impl OfferKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OfferKind::Fixed => "fixed",
            OfferKind::Free => "free",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fixed" => Some(OfferKind::Fixed),
            "free" => Some(OfferKind::Free),
            _ => None,
        }
    }
}

impl fmt::Display for OfferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The activity offered in a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub kind: OfferKind,
    pub label: String,
}

/// Period times, fixed offers and the free-module catalog.
#[derive(Debug, Clone)]
pub struct Calendar {
    periods: [PeriodTime; PERIODS_PER_DAY as usize],
    fixed: HashMap<(Weekday, Period), String>,
    free_modules: Vec<String>,
    free_choice_label: String,
}

fn parse_clock_time(key: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("'{value}' is not HH:MM ({e})"),
    })
}

impl Calendar {
    /// Build the calendar from configuration.
    ///
    /// # Errors
    /// Returns an error if a period is missing, duplicated, out of range or
    /// ends before it starts, or if a fixed offer names an unknown weekday or
    /// period.
    pub fn from_config(config: &CalendarConfig) -> Result<Self, ConfigError> {
        let mut periods: [Option<PeriodTime>; PERIODS_PER_DAY as usize] = [None; PERIODS_PER_DAY as usize];
        for entry in &config.periods {
            let key = format!("calendar.periods[{}]", entry.period);
            let period = Period::new(entry.period).ok_or_else(|| ConfigError::InvalidValue {
                key: key.clone(),
                message: format!("period must be between 1 and {PERIODS_PER_DAY}"),
            })?;
            let start = parse_clock_time(&key, &entry.start)?;
            let end = parse_clock_time(&key, &entry.end)?;
            if end <= start {
                return Err(ConfigError::InvalidValue {
                    key,
                    message: "end must be after start".to_string(),
                });
            }
            let slot = &mut periods[period.index()];
            if slot.is_some() {
                return Err(ConfigError::InvalidValue {
                    key,
                    message: "period configured twice".to_string(),
                });
            }
            *slot = Some(PeriodTime { start, end });
        }

        let mut resolved = [PeriodTime {
            start: NaiveTime::MIN,
            end: NaiveTime::MIN,
        }; PERIODS_PER_DAY as usize];
        for (index, slot) in periods.into_iter().enumerate() {
            resolved[index] = slot.ok_or_else(|| ConfigError::InvalidValue {
                key: "calendar.periods".to_string(),
                message: format!("period {} has no times", index + 1),
            })?;
        }

        let mut fixed = HashMap::new();
        for entry in &config.fixed_offers {
            let key = format!("calendar.fixed_offers[{} {}]", entry.weekday, entry.period);
            let weekday = parse_weekday(&entry.weekday).ok_or_else(|| ConfigError::InvalidValue {
                key: key.clone(),
                message: format!("unknown weekday '{}'", entry.weekday),
            })?;
            let period = Period::new(entry.period).ok_or_else(|| ConfigError::InvalidValue {
                key,
                message: format!("period must be between 1 and {PERIODS_PER_DAY}"),
            })?;
            fixed.insert((weekday, period), entry.label.clone());
        }

        if config.free_modules.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "calendar.free_modules".to_string(),
                message: "at least one module is required".to_string(),
            });
        }

        Ok(Self {
            periods: resolved,
            fixed,
            free_modules: config.free_modules.clone(),
            free_choice_label: config.free_choice_label.clone(),
        })
    }

    /// Resolve the offer of a slot.
    ///
    /// An admin override wins over the static table; slots without either are
    /// free choice.
    pub fn offer_for(&self, weekday: Weekday, period: Period, override_label: Option<&str>) -> Offer {
        if let Some(label) = override_label {
            return Offer {
                kind: OfferKind::Fixed,
                label: label.to_string(),
            };
        }
        match self.fixed.get(&(weekday, period)) {
            Some(label) => Offer {
                kind: OfferKind::Fixed,
                label: label.clone(),
            },
            None => Offer {
                kind: OfferKind::Free,
                label: self.free_choice_label.clone(),
            },
        }
    }

    pub fn period_time(&self, period: Period) -> PeriodTime {
        self.periods[period.index()]
    }

    pub fn period_bounds(&self, period: Period) -> (NaiveTime, NaiveTime) {
        let time = self.period_time(period);
        (time.start, time.end)
    }

    /// Local start instant of a period on a date.
    pub fn period_start_at(&self, date: NaiveDate, period: Period) -> NaiveDateTime {
        date.and_time(self.period_time(period).start)
    }

    pub fn is_free_module(&self, module: &str) -> bool {
        self.free_modules.iter().any(|m| m == module)
    }

    pub fn free_modules(&self) -> &[String] {
        &self.free_modules
    }
}
