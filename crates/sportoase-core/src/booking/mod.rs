//! Reservation domain: entities, rejection reasons and the admission engine.

pub mod admission;
pub mod occupancy;
pub mod overview;
pub mod policy;

pub use admission::{AdmissionController, AdmissionRequest, Admitted, BookingRequest, Decision};
pub use occupancy::{SlotOccupancy, SlotStateReader};
pub use overview::{week_start, DaySchedule, ScheduleInputs, SlotBooking, SlotSummary};
pub use policy::BookingRules;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::{weekday_code, Offer, OfferKind, Period};
use crate::error::ValidationError;

/// Surrogate key of a reservation, assigned on insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReservationId(pub i64);

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ReservationId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ReservationId)
    }
}

/// A student attending with a reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub name: String,
    pub class_label: String,
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

impl Student {
    pub fn new(name: impl Into<String>, class_label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_label: class_label.into(),
        }
    }

    /// Case-insensitive, trimmed (name, class) pair used for double-booking
    /// detection.
    pub fn identity_key(&self) -> (String, String) {
        (normalize(&self.name), normalize(&self.class_label))
    }

    pub fn same_student(&self, other: &Student) -> bool {
        self.identity_key() == other.identity_key()
    }

    fn trimmed(&self) -> Student {
        Student::new(self.name.trim(), self.class_label.trim())
    }
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.class_label)
    }
}

/// A persisted booking of one slot for a roster of students.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub date: NaiveDate,
    pub weekday: String,
    pub period: Period,
    /// Identity id of the teacher who owns the booking.
    pub owner_id: String,
    pub requester_name: String,
    pub requester_class: String,
    pub students: Vec<Student>,
    pub offer_kind: OfferKind,
    pub offer_label: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    /// Id of the mirrored event in an external calendar, if one was created.
    pub calendar_event_id: Option<String>,
}

impl Reservation {
    pub fn student_count(&self) -> usize {
        self.students.len()
    }
}

/// Everything the store needs to insert or overwrite a reservation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReservation {
    pub date: NaiveDate,
    pub period: Period,
    pub owner_id: String,
    pub requester_name: String,
    pub requester_class: String,
    pub students: Vec<Student>,
    pub offer: Offer,
    pub notes: String,
}

impl NewReservation {
    pub fn weekday_code(&self) -> &'static str {
        weekday_code(self.date.weekday())
    }
}

/// An administrator-imposed closure of one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockedSlot {
    pub date: NaiveDate,
    pub weekday: String,
    pub period: Period,
    pub admin_id: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Administrator label replacing the default offer of a weekday and period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotNameOverride {
    pub weekday: String,
    pub period: Period,
    pub label: String,
    pub admin_id: String,
    pub updated_at: DateTime<Utc>,
}

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// # Errors
    /// Returns an error if `end` is before `start`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        if end < start {
            return Err(ValidationError::InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

/// Why a request was turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    InvalidDateOrPeriod,
    InvalidRoster,
    MissingRequesterDetails,
    PastOrWeekend,
    TooLateToBook,
    SlotBlocked,
    CapacityExceeded,
    DoubleBooking,
    MissingModuleChoice,
    ReservationNotFound,
    NotOwner,
    ModificationWindowClosed,
}

impl RejectReason {
    pub fn code(self) -> &'static str {
        match self {
            RejectReason::InvalidDateOrPeriod => "INVALID_DATE_OR_PERIOD",
            RejectReason::InvalidRoster => "INVALID_ROSTER",
            RejectReason::MissingRequesterDetails => "MISSING_REQUESTER_DETAILS",
            RejectReason::PastOrWeekend => "PAST_OR_WEEKEND",
            RejectReason::TooLateToBook => "TOO_LATE_TO_BOOK",
            RejectReason::SlotBlocked => "SLOT_BLOCKED",
            RejectReason::CapacityExceeded => "CAPACITY_EXCEEDED",
            RejectReason::DoubleBooking => "DOUBLE_BOOKING",
            RejectReason::MissingModuleChoice => "MISSING_MODULE_CHOICE",
            RejectReason::ReservationNotFound => "RESERVATION_NOT_FOUND",
            RejectReason::NotOwner => "NOT_OWNER",
            RejectReason::ModificationWindowClosed => "MODIFICATION_WINDOW_CLOSED",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A business-rule rejection with a message fit for the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: RejectReason,
    pub message: String,
}

impl Rejection {
    pub fn new(reason: RejectReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

/// Result of a booking operation that passed input parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Accepted(T),
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted(_))
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Accepted(_) => None,
            Outcome::Rejected(rejection) => Some(rejection),
        }
    }

    pub fn reject_reason(&self) -> Option<RejectReason> {
        self.rejection().map(|r| r.reason)
    }
}
