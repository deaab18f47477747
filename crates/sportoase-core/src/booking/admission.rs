//! Booking admission: decides whether a request may take a slot.
//!
//! Checks run in a fixed order and the first failure is reported:
//!
//! 1. date and period parse, roster and requester details are well formed
//! 2. slot is not on a weekend and has not started yet
//! 3. slot starts at least the booking advance from now
//! 4. slot is not blocked
//! 5. roster fits into the remaining capacity
//! 6. no roster student is already booked into the slot
//! 7. a free-choice slot names a module from the catalog
//!
//! Admins skip the "started", advance and blocked checks when the
//! `admin_bypasses_temporal_guards` rule is on, and always when they edit an
//! existing reservation ([`AdmissionRequest::time_rules_waived`]). Weekends
//! are never bookable.
//!
//! The controller only reads through a [`SlotStateReader`]. Callers that
//! write afterwards run it inside a store transaction so the decision and
//! the write see the same slot state.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::{
    BookingRules, NewReservation, RejectReason, Rejection, ReservationId, SlotStateReader, Student,
};
use crate::calendar::{is_weekend, Calendar, Offer, OfferKind, Period, PERIODS_PER_DAY};
use crate::clock::Clock;
use crate::error::DatabaseError;
use crate::identity::Identity;

/// Raw booking form as submitted by a requester.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    /// `YYYY-MM-DD`
    pub date: String,
    pub period: i64,
    pub requester_name: String,
    pub requester_class: String,
    pub students: Vec<Student>,
    /// Module picked for a free-choice slot.
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub notes: String,
    /// Owner to book for instead of the caller. Admin only.
    #[serde(default)]
    pub on_behalf_of: Option<String>,
}

/// A booking form together with who submits it and which reservation it
/// replaces, if any.
#[derive(Debug, Clone, Copy)]
pub struct AdmissionRequest<'a> {
    pub actor: &'a Identity,
    pub form: &'a BookingRequest,
    pub editing: Option<ReservationId>,
    /// Skip the started, advance and blocked checks regardless of the
    /// admin bypass rule. Set for admin corrections of existing bookings.
    pub time_rules_waived: bool,
}

/// A request that passed every check, with its inputs validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Admitted {
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub period: Period,
    pub offer: Offer,
    pub requester_name: String,
    pub requester_class: String,
    pub students: Vec<Student>,
    pub notes: String,
}

impl Admitted {
    pub fn into_new_reservation(self, owner_id: String) -> NewReservation {
        NewReservation {
            date: self.date,
            period: self.period,
            owner_id,
            requester_name: self.requester_name,
            requester_class: self.requester_class,
            students: self.students,
            offer: self.offer,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Accepted(Admitted),
    Rejected(Rejection),
}

fn reject(reason: RejectReason, message: impl Into<String>) -> Decision {
    Decision::Rejected(Rejection::new(reason, message))
}

pub struct AdmissionController<'a> {
    calendar: &'a Calendar,
    rules: &'a BookingRules,
    clock: &'a dyn Clock,
}

impl<'a> AdmissionController<'a> {
    pub fn new(calendar: &'a Calendar, rules: &'a BookingRules, clock: &'a dyn Clock) -> Self {
        Self {
            calendar,
            rules,
            clock,
        }
    }

    /// Evaluate `request` against the current slot state.
    ///
    /// # Errors
    /// Only storage faults are errors; every business rule outcome is a
    /// [`Decision`].
    pub fn evaluate<R: SlotStateReader + ?Sized>(
        &self,
        reader: &R,
        request: &AdmissionRequest<'_>,
    ) -> Result<Decision, DatabaseError> {
        let decision = self.evaluate_inner(reader, request)?;
        if let Decision::Rejected(rejection) = &decision {
            tracing::debug!(
                actor = %request.actor.id,
                date = %request.form.date,
                period = request.form.period,
                reason = rejection.reason.code(),
                "booking rejected"
            );
        }
        Ok(decision)
    }

    fn evaluate_inner<R: SlotStateReader + ?Sized>(
        &self,
        reader: &R,
        request: &AdmissionRequest<'_>,
    ) -> Result<Decision, DatabaseError> {
        let form = request.form;

        let Ok(date) = NaiveDate::parse_from_str(form.date.trim(), "%Y-%m-%d") else {
            return Ok(reject(
                RejectReason::InvalidDateOrPeriod,
                format!("'{}' is not a date (YYYY-MM-DD)", form.date),
            ));
        };
        let Some(period) = Period::from_i64(form.period) else {
            return Ok(reject(
                RejectReason::InvalidDateOrPeriod,
                format!("period must be between 1 and {PERIODS_PER_DAY}"),
            ));
        };

        let students = match self.check_roster(&form.students) {
            Ok(students) => students,
            Err(rejection) => return Ok(Decision::Rejected(rejection)),
        };
        let requester_name = form.requester_name.trim();
        let requester_class = form.requester_class.trim();
        if requester_name.is_empty() || requester_class.is_empty() {
            return Ok(reject(
                RejectReason::MissingRequesterDetails,
                "requester name and class are required",
            ));
        }

        let weekday = date.weekday();
        let bypass = request.time_rules_waived
            || (request.actor.is_admin() && self.rules.admin_bypasses_temporal_guards);
        let now = self.clock.now();
        let start = self.calendar.period_start_at(date, period);

        if is_weekend(weekday) {
            return Ok(reject(RejectReason::PastOrWeekend, "no periods on weekends"));
        }
        if start < now && !bypass {
            return Ok(reject(RejectReason::PastOrWeekend, "this period has already started"));
        }
        if !bypass && !self.rules.can_book(now, start) {
            return Ok(reject(
                RejectReason::TooLateToBook,
                format!(
                    "bookings close {} minutes before the period starts",
                    self.rules.booking_advance.num_minutes()
                ),
            ));
        }

        if !bypass {
            if let Some(blocked) = reader.blocked_slot(date, period)? {
                let message = if blocked.reason.trim().is_empty() {
                    "this slot is blocked".to_string()
                } else {
                    format!("this slot is blocked: {}", blocked.reason)
                };
                return Ok(reject(RejectReason::SlotBlocked, message));
            }
        }

        let occupancy = reader.occupancy(date, period)?;
        let available = occupancy.available(self.rules.max_capacity, request.editing);
        if students.len() > available {
            return Ok(reject(
                RejectReason::CapacityExceeded,
                format!("only {available} of {} places left", self.rules.max_capacity),
            ));
        }

        for student in &students {
            if occupancy.find_student(student, request.editing).is_some() {
                return Ok(reject(
                    RejectReason::DoubleBooking,
                    format!("{student} is already booked for this period"),
                ));
            }
        }

        let override_label = reader.offer_override(weekday, period)?;
        let mut offer = self.calendar.offer_for(weekday, period, override_label.as_deref());
        if offer.kind == OfferKind::Free {
            let module = form.module.as_deref().map(str::trim).unwrap_or_default();
            if !self.calendar.is_free_module(module) {
                return Ok(reject(
                    RejectReason::MissingModuleChoice,
                    format!("choose one of: {}", self.calendar.free_modules().join(", ")),
                ));
            }
            offer.label = module.to_string();
        }

        Ok(Decision::Accepted(Admitted {
            date,
            weekday,
            period,
            offer,
            requester_name: requester_name.to_string(),
            requester_class: requester_class.to_string(),
            students,
            notes: form.notes.trim().to_string(),
        }))
    }

    fn check_roster(&self, roster: &[Student]) -> Result<Vec<Student>, Rejection> {
        if roster.is_empty() || roster.len() > self.rules.max_roster_size {
            return Err(Rejection::new(
                RejectReason::InvalidRoster,
                format!("a booking needs 1 to {} students", self.rules.max_roster_size),
            ));
        }
        let students: Vec<Student> = roster.iter().map(Student::trimmed).collect();
        for (index, student) in students.iter().enumerate() {
            if student.name.is_empty() || student.class_label.is_empty() {
                return Err(Rejection::new(
                    RejectReason::InvalidRoster,
                    format!("student {} needs a name and a class", index + 1),
                ));
            }
            if students[..index].iter().any(|s| s.same_student(student)) {
                return Err(Rejection::new(
                    RejectReason::InvalidRoster,
                    format!("{student} is listed twice"),
                ));
            }
        }
        Ok(students)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::{BlockedSlot, Reservation, SlotOccupancy};
    use crate::clock::FixedClock;
    use crate::identity::Role;
    use crate::storage::config::CalendarConfig;
    use chrono::{NaiveDateTime, Utc};
    use std::collections::HashMap;

    /// In-memory slot state.
    #[derive(Default)]
    struct Slots {
        reservations: Vec<Reservation>,
        blocked: HashMap<(NaiveDate, Period), String>,
        overrides: HashMap<(Weekday, Period), String>,
    }

    impl Slots {
        fn book(&mut self, id: i64, date: NaiveDate, period: u8, students: &[(&str, &str)]) {
            self.reservations.push(Reservation {
                id: ReservationId(id),
                date,
                weekday: "Mon".into(),
                period: Period::new(period).unwrap(),
                owner_id: "someone".into(),
                requester_name: "X".into(),
                requester_class: "5a".into(),
                students: students.iter().map(|(n, c)| Student::new(*n, *c)).collect(),
                offer_kind: OfferKind::Fixed,
                offer_label: "x".into(),
                notes: String::new(),
                created_at: Utc::now(),
                calendar_event_id: None,
            });
        }
    }

    impl SlotStateReader for Slots {
        fn occupancy(&self, date: NaiveDate, period: Period) -> Result<SlotOccupancy, DatabaseError> {
            Ok(SlotOccupancy {
                date,
                period,
                reservations: self
                    .reservations
                    .iter()
                    .filter(|r| r.date == date && r.period == period)
                    .cloned()
                    .collect(),
            })
        }

        fn blocked_slot(&self, date: NaiveDate, period: Period) -> Result<Option<BlockedSlot>, DatabaseError> {
            Ok(self.blocked.get(&(date, period)).map(|reason| BlockedSlot {
                date,
                weekday: "Mon".into(),
                period,
                admin_id: "admin".into(),
                reason: reason.clone(),
                created_at: Utc::now(),
            }))
        }

        fn offer_override(&self, weekday: Weekday, period: Period) -> Result<Option<String>, DatabaseError> {
            Ok(self.overrides.get(&(weekday, period)).cloned())
        }
    }

    // 2030-01-07 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, 0).unwrap()
    }

    fn teacher() -> Identity {
        Identity::new("t-1", "Frau Berger", "berger@schule.de", Role::Teacher)
    }

    fn admin() -> Identity {
        Identity::new("a-1", "Leitung", "leitung@schule.de", Role::Admin)
    }

    fn form(date: &str, period: i64, students: &[(&str, &str)]) -> BookingRequest {
        BookingRequest {
            date: date.into(),
            period,
            requester_name: "Frau Berger".into(),
            requester_class: "7b".into(),
            students: students.iter().map(|(n, c)| Student::new(*n, *c)).collect(),
            module: None,
            notes: String::new(),
            on_behalf_of: None,
        }
    }

    struct Fixture {
        calendar: Calendar,
        rules: BookingRules,
        clock: FixedClock,
    }

    impl Fixture {
        fn at(now: NaiveDateTime) -> Self {
            Self {
                calendar: Calendar::from_config(&CalendarConfig::default()).unwrap(),
                rules: BookingRules::default(),
                clock: FixedClock(now),
            }
        }

        fn evaluate(&self, slots: &Slots, actor: &Identity, form: &BookingRequest, editing: Option<ReservationId>) -> Decision {
            let controller = AdmissionController::new(&self.calendar, &self.rules, &self.clock);
            controller
                .evaluate(
                    slots,
                    &AdmissionRequest {
                        actor,
                        form,
                        editing,
                        time_rules_waived: false,
                    },
                )
                .unwrap()
        }

        fn reason(&self, slots: &Slots, actor: &Identity, form: &BookingRequest) -> Option<RejectReason> {
            match self.evaluate(slots, actor, form, None) {
                Decision::Accepted(_) => None,
                Decision::Rejected(r) => Some(r.reason),
            }
        }
    }

    #[test]
    fn fixed_slot_is_accepted_with_fixed_label() {
        let fx = Fixture::at(at(monday(), 7, 0));
        let decision = fx.evaluate(&Slots::default(), &teacher(), &form("2030-01-07", 5, &[("Mia", "7b")]), None);
        let Decision::Accepted(admitted) = decision else { panic!("expected acceptance") };
        assert_eq!(admitted.offer.kind, OfferKind::Fixed);
        assert_eq!(admitted.offer.label, "Koordinationszirkel");
        assert_eq!(admitted.weekday, Weekday::Mon);
    }

    #[test]
    fn malformed_date_or_period_is_rejected_first() {
        let fx = Fixture::at(at(monday(), 7, 0));
        let slots = Slots::default();
        assert_eq!(fx.reason(&slots, &teacher(), &form("07.01.2030", 1, &[])), Some(RejectReason::InvalidDateOrPeriod));
        assert_eq!(fx.reason(&slots, &teacher(), &form("2030-01-07", 7, &[])), Some(RejectReason::InvalidDateOrPeriod));
        assert_eq!(fx.reason(&slots, &teacher(), &form("2030-01-07", 0, &[])), Some(RejectReason::InvalidDateOrPeriod));
    }

    #[test]
    fn roster_shape_is_checked_before_rules() {
        let fx = Fixture::at(at(monday(), 7, 0));
        let slots = Slots::default();
        let six = [("A", "5a"), ("B", "5a"), ("C", "5a"), ("D", "5a"), ("E", "5a"), ("F", "5a")];
        // Saturday, but the roster problem wins.
        assert_eq!(fx.reason(&slots, &teacher(), &form("2030-01-12", 1, &[])), Some(RejectReason::InvalidRoster));
        assert_eq!(fx.reason(&slots, &teacher(), &form("2030-01-07", 5, &six)), Some(RejectReason::InvalidRoster));
        assert_eq!(
            fx.reason(&slots, &teacher(), &form("2030-01-07", 5, &[("Mia", "7b"), (" mia", "7B ")])),
            Some(RejectReason::InvalidRoster)
        );
        assert_eq!(fx.reason(&slots, &teacher(), &form("2030-01-07", 5, &[("  ", "7b")])), Some(RejectReason::InvalidRoster));

        let mut missing = form("2030-01-07", 5, &[("Mia", "7b")]);
        missing.requester_class = " ".into();
        assert_eq!(fx.reason(&slots, &teacher(), &missing), Some(RejectReason::MissingRequesterDetails));
    }

    #[test]
    fn weekend_is_rejected_for_everyone() {
        let fx = Fixture::at(at(monday(), 7, 0));
        let slots = Slots::default();
        let saturday = form("2030-01-12", 2, &[("Mia", "7b")]);
        assert_eq!(fx.reason(&slots, &teacher(), &saturday), Some(RejectReason::PastOrWeekend));

        let mut bypassing = Fixture::at(at(monday(), 7, 0));
        bypassing.rules.admin_bypasses_temporal_guards = true;
        assert_eq!(bypassing.reason(&slots, &admin(), &saturday), Some(RejectReason::PastOrWeekend));
    }

    #[test]
    fn started_period_is_past() {
        let fx = Fixture::at(at(monday(), 9, 0));
        assert_eq!(
            fx.reason(&Slots::default(), &teacher(), &form("2030-01-07", 1, &[("Mia", "7b")])),
            Some(RejectReason::PastOrWeekend)
        );
    }

    #[test]
    fn booking_inside_advance_window_is_too_late() {
        // Period 5 starts 11:40.
        let fx = Fixture::at(at(monday(), 10, 45));
        assert_eq!(
            fx.reason(&Slots::default(), &teacher(), &form("2030-01-07", 5, &[("Mia", "7b")])),
            Some(RejectReason::TooLateToBook)
        );
        let exactly = Fixture::at(at(monday(), 10, 40));
        assert_eq!(exactly.reason(&Slots::default(), &teacher(), &form("2030-01-07", 5, &[("Mia", "7b")])), None);
    }

    #[test]
    fn blocked_slot_surfaces_reason() {
        let fx = Fixture::at(at(monday(), 7, 0));
        let mut slots = Slots::default();
        slots.blocked.insert((monday(), Period::new(5).unwrap()), "Sportfest".into());

        let Decision::Rejected(rejection) = fx.evaluate(&slots, &teacher(), &form("2030-01-07", 5, &[("Mia", "7b")]), None) else {
            panic!("expected rejection")
        };
        assert_eq!(rejection.reason, RejectReason::SlotBlocked);
        assert!(rejection.message.contains("Sportfest"));
    }

    #[test]
    fn admin_bypass_skips_time_and_block_checks_only_when_enabled() {
        let mut slots = Slots::default();
        slots.blocked.insert((monday(), Period::new(5).unwrap()), "Sportfest".into());
        let late = form("2030-01-07", 5, &[("Mia", "7b")]);

        let strict = Fixture::at(at(monday(), 11, 0));
        assert_eq!(strict.reason(&slots, &admin(), &late), Some(RejectReason::TooLateToBook));

        let mut lenient = Fixture::at(at(monday(), 11, 0));
        lenient.rules.admin_bypasses_temporal_guards = true;
        assert_eq!(lenient.reason(&slots, &admin(), &late), None);
        assert_eq!(lenient.reason(&slots, &teacher(), &late), Some(RejectReason::TooLateToBook));

        // Started periods too.
        let mut after_start = Fixture::at(at(monday(), 12, 0));
        after_start.rules.admin_bypasses_temporal_guards = true;
        assert_eq!(after_start.reason(&slots, &admin(), &late), None);
    }

    #[test]
    fn capacity_counts_all_reservations_in_slot() {
        let fx = Fixture::at(at(monday(), 7, 0));
        let mut slots = Slots::default();
        slots.book(1, monday(), 5, &[("A", "5a"), ("B", "5a"), ("C", "5a")]);

        let Decision::Rejected(rejection) =
            fx.evaluate(&slots, &teacher(), &form("2030-01-07", 5, &[("D", "6a"), ("E", "6a"), ("F", "6a")]), None)
        else {
            panic!("expected rejection")
        };
        assert_eq!(rejection.reason, RejectReason::CapacityExceeded);
        assert!(rejection.message.contains("only 2"));

        assert_eq!(fx.reason(&slots, &teacher(), &form("2030-01-07", 5, &[("D", "6a"), ("E", "6a")])), None);
    }

    #[test]
    fn edit_does_not_count_its_own_seats() {
        let fx = Fixture::at(at(monday(), 7, 0));
        let mut slots = Slots::default();
        slots.book(1, monday(), 5, &[("A", "5a"), ("B", "5a"), ("C", "5a")]);
        slots.book(2, monday(), 5, &[("D", "5a"), ("E", "5a")]);

        let grow = form("2030-01-07", 5, &[("A", "5a"), ("B", "5a"), ("C", "5a"), ("X", "5a")]);
        assert!(matches!(fx.evaluate(&slots, &teacher(), &grow, Some(ReservationId(1))), Decision::Rejected(_)));

        let same = form("2030-01-07", 5, &[("A", "5a"), ("B", "5a"), ("C", "5a")]);
        assert!(matches!(fx.evaluate(&slots, &teacher(), &same, Some(ReservationId(1))), Decision::Accepted(_)));
    }

    #[test]
    fn student_already_in_slot_is_double_booking() {
        let fx = Fixture::at(at(monday(), 7, 0));
        let mut slots = Slots::default();
        slots.book(1, monday(), 5, &[("Lena Schmidt", "5a")]);

        let Decision::Rejected(rejection) =
            fx.evaluate(&slots, &teacher(), &form("2030-01-07", 5, &[("lena schmidt ", "5A")]), None)
        else {
            panic!("expected rejection")
        };
        assert_eq!(rejection.reason, RejectReason::DoubleBooking);
        assert!(rejection.message.contains("lena schmidt"));
    }

    #[test]
    fn capacity_is_checked_before_double_booking() {
        let fx = Fixture::at(at(monday(), 7, 0));
        let mut slots = Slots::default();
        slots.book(1, monday(), 5, &[("A", "5a"), ("B", "5a"), ("C", "5a"), ("D", "5a")]);
        assert_eq!(
            fx.reason(&slots, &teacher(), &form("2030-01-07", 5, &[("A", "5a"), ("Z", "5a")])),
            Some(RejectReason::CapacityExceeded)
        );
    }

    #[test]
    fn free_slot_requires_catalog_module() {
        let fx = Fixture::at(at(monday(), 7, 0));
        let slots = Slots::default();
        // Monday period 2 has no fixed offer.
        let mut request = form("2030-01-07", 2, &[("Mia", "7b")]);
        assert_eq!(fx.reason(&slots, &teacher(), &request), Some(RejectReason::MissingModuleChoice));

        request.module = Some("Basketball".into());
        assert_eq!(fx.reason(&slots, &teacher(), &request), Some(RejectReason::MissingModuleChoice));

        request.module = Some("Aktivierung".into());
        let Decision::Accepted(admitted) = fx.evaluate(&slots, &teacher(), &request, None) else {
            panic!("expected acceptance")
        };
        assert_eq!(admitted.offer.kind, OfferKind::Free);
        assert_eq!(admitted.offer.label, "Aktivierung");
    }

    #[test]
    fn override_turns_free_slot_into_fixed() {
        let fx = Fixture::at(at(monday(), 7, 0));
        let mut slots = Slots::default();
        slots.overrides.insert((Weekday::Mon, Period::new(2).unwrap()), "Yoga".into());

        let Decision::Accepted(admitted) = fx.evaluate(&slots, &teacher(), &form("2030-01-07", 2, &[("Mia", "7b")]), None) else {
            panic!("expected acceptance")
        };
        assert_eq!(admitted.offer.label, "Yoga");
        assert_eq!(admitted.offer.kind, OfferKind::Fixed);
    }

    #[test]
    fn accepted_request_is_trimmed() {
        let fx = Fixture::at(at(monday(), 7, 0));
        let mut request = form(" 2030-01-07 ", 5, &[("  Mia ", " 7b")]);
        request.requester_name = "  Frau Berger ".into();
        request.notes = " bitte Hallenschuhe ".into();
        let Decision::Accepted(admitted) = fx.evaluate(&Slots::default(), &teacher(), &request, None) else {
            panic!("expected acceptance")
        };
        assert_eq!(admitted.students, vec![Student::new("Mia", "7b")]);
        assert_eq!(admitted.requester_name, "Frau Berger");
        assert_eq!(admitted.notes, "bitte Hallenschuhe");
    }

    fn full_slot(slots: &mut Slots, period: u8) {
        slots.book(1, monday(), period, &[("A", "5a"), ("B", "5a"), ("C", "5a"), ("D", "5a"), ("E", "5a")]);
    }

    #[test]
    fn malformed_input_wins_over_a_full_slot() {
        let fx = Fixture::at(at(monday(), 7, 0));
        let mut slots = Slots::default();
        full_slot(&mut slots, 5);
        let roster = [("Mia", "7b")];
        assert_eq!(fx.reason(&slots, &teacher(), &form("2030-13-07", 5, &roster)), Some(RejectReason::InvalidDateOrPeriod));
        assert_eq!(fx.reason(&slots, &teacher(), &form("2030-01-07", 9, &roster)), Some(RejectReason::InvalidDateOrPeriod));
        assert_eq!(fx.reason(&slots, &teacher(), &form("2030-01-07", 5, &roster)), Some(RejectReason::CapacityExceeded));
    }

    #[test]
    fn block_is_reported_before_capacity() {
        let fx = Fixture::at(at(monday(), 7, 0));
        let mut slots = Slots::default();
        full_slot(&mut slots, 5);
        slots.blocked.insert((monday(), Period::new(5).unwrap()), "Konferenz".into());
        assert_eq!(
            fx.reason(&slots, &teacher(), &form("2030-01-07", 5, &[("Mia", "7b")])),
            Some(RejectReason::SlotBlocked)
        );
    }

    #[test]
    fn double_booking_is_reported_before_missing_module() {
        let fx = Fixture::at(at(monday(), 7, 0));
        let mut slots = Slots::default();
        slots.book(1, monday(), 2, &[("Mia", "7b")]);
        let request = form("2030-01-07", 2, &[("Mia", "7b")]);
        assert!(request.module.is_none());
        assert_eq!(fx.reason(&slots, &teacher(), &request), Some(RejectReason::DoubleBooking));
    }

    #[test]
    fn waived_time_rules_still_enforce_weekend_and_capacity() {
        let fx = Fixture::at(at(monday(), 13, 0));
        let controller = AdmissionController::new(&fx.calendar, &fx.rules, &fx.clock);
        let mut slots = Slots::default();
        slots.book(1, monday(), 5, &[("Mia", "7b")]);
        slots.book(2, monday(), 5, &[("B", "5a"), ("C", "5a"), ("D", "5a"), ("E", "5a")]);
        slots.blocked.insert((monday(), Period::new(5).unwrap()), "Sportfest".into());

        let admin = admin();
        let reason = |form: &BookingRequest| {
            let request = AdmissionRequest {
                actor: &admin,
                form,
                editing: Some(ReservationId(1)),
                time_rules_waived: true,
            };
            match controller.evaluate(&slots, &request).unwrap() {
                Decision::Accepted(_) => None,
                Decision::Rejected(r) => Some(r.reason),
            }
        };

        // Started and blocked, yet the correction goes through.
        assert_eq!(reason(&form("2030-01-07", 5, &[("Mia Noor", "7b")])), None);
        assert_eq!(
            reason(&form("2030-01-07", 5, &[("Mia Noor", "7b"), ("X", "7b")])),
            Some(RejectReason::CapacityExceeded)
        );
        assert_eq!(reason(&form("2030-01-12", 5, &[("Mia", "7b")])), Some(RejectReason::PastOrWeekend));
    }
}
