//! Current fill state of a slot and the read seam the admission check uses.

use chrono::{NaiveDate, Weekday};
use serde::Serialize;

use super::{BlockedSlot, Reservation, ReservationId, Student};
use crate::calendar::Period;
use crate::error::DatabaseError;

/// All reservations currently holding a (date, period) slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotOccupancy {
    pub date: NaiveDate,
    pub period: Period,
    pub reservations: Vec<Reservation>,
}

impl SlotOccupancy {
    fn others(&self, exclude: Option<ReservationId>) -> impl Iterator<Item = &Reservation> {
        self.reservations
            .iter()
            .filter(move |r| Some(r.id) != exclude)
    }

    /// Students booked into the slot.
    pub fn student_count(&self) -> usize {
        self.student_count_excluding(None)
    }

    /// Students booked into the slot, not counting reservation `exclude`.
    pub fn student_count_excluding(&self, exclude: Option<ReservationId>) -> usize {
        self.others(exclude).map(Reservation::student_count).sum()
    }

    pub fn available(&self, capacity: usize, exclude: Option<ReservationId>) -> usize {
        capacity.saturating_sub(self.student_count_excluding(exclude))
    }

    pub fn is_full(&self, capacity: usize) -> bool {
        self.available(capacity, None) == 0
    }

    /// The reservation (other than `exclude`) that already lists `student`.
    pub fn find_student(
        &self,
        student: &Student,
        exclude: Option<ReservationId>,
    ) -> Option<&Reservation> {
        self.others(exclude)
            .find(|r| r.students.iter().any(|s| s.same_student(student)))
    }
}

/// Read access to the persisted state a booking decision depends on.
///
/// Implemented by the store itself and by its transaction handle, so the
/// same check runs inside and outside a write lock.
pub trait SlotStateReader {
    fn occupancy(&self, date: NaiveDate, period: Period) -> Result<SlotOccupancy, DatabaseError>;

    fn blocked_slot(
        &self,
        date: NaiveDate,
        period: Period,
    ) -> Result<Option<BlockedSlot>, DatabaseError>;

    /// Admin label replacing the default offer, if any.
    fn offer_override(
        &self,
        weekday: Weekday,
        period: Period,
    ) -> Result<Option<String>, DatabaseError>;
}
