//! Time and size limits applied to bookings and edits.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::storage::config::BookingConfig;

/// Booking limits resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingRules {
    /// Maximum students per slot, summed over all reservations.
    pub max_capacity: usize,
    /// Maximum students on a single reservation.
    pub max_roster_size: usize,
    /// Minimum lead time between booking and period start.
    pub booking_advance: Duration,
    /// Same-day edits and cancellations close this long before period start.
    pub modification_window: Duration,
    /// Let admins book past, late or blocked slots.
    pub admin_bypasses_temporal_guards: bool,
}

impl BookingRules {
    pub fn from_config(config: &BookingConfig) -> Self {
        Self {
            max_capacity: config.max_capacity as usize,
            max_roster_size: config.max_roster_size as usize,
            booking_advance: Duration::minutes(config.booking_advance_minutes),
            modification_window: Duration::minutes(config.modification_window_minutes),
            admin_bypasses_temporal_guards: config.admin_bypasses_temporal_guards,
        }
    }

    /// A slot starting at `start` is still bookable at `now` when at least
    /// the advance window remains. Exactly the window is enough.
    pub fn can_book(&self, now: NaiveDateTime, start: NaiveDateTime) -> bool {
        start - now >= self.booking_advance
    }

    /// A reservation on `date` starting at `start` may be edited or cancelled
    /// at `now` on any earlier day, and on the same day only while strictly
    /// more than the modification window remains.
    pub fn can_modify(&self, now: NaiveDateTime, date: NaiveDate, start: NaiveDateTime) -> bool {
        let today = now.date();
        if date > today {
            return true;
        }
        date == today && start - now > self.modification_window
    }
}

impl Default for BookingRules {
    fn default() -> Self {
        Self::from_config(&BookingConfig::default())
    }
}
