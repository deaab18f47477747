//! Civil-time source for every cutoff comparison.
//!
//! All times handled by the engine are naive wall-clock times in the school's
//! zone. Production code reads the system clock through [`SystemClock`];
//! tests pin "now" with [`FixedClock`].

use chrono::{NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::error::ConfigError;

/// Default civil timezone of the school.
pub const DEFAULT_TIMEZONE: &str = "Europe/Berlin";

/// Supplies the current local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

/// Reads the system clock and converts it into a named timezone.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    tz: Tz,
}

impl SystemClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Build from an IANA zone name such as `Europe/Berlin`.
    ///
    /// # Errors
    /// Returns an error if the name is not a known timezone.
    pub fn from_name(name: &str) -> Result<Self, ConfigError> {
        let tz = name.parse::<Tz>().map_err(|e| ConfigError::InvalidValue {
            key: "timezone".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::new(tz))
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(chrono_tz::Europe::Berlin)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.tz).naive_local()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
