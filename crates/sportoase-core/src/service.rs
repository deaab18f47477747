//! Booking use cases: admission, persistence and notification in one place.
//!
//! Every mutating call runs its checks and its write inside one
//! [`ReservationDb::transaction`], so two concurrent requests for the same
//! slot are decided one after the other. Notifications go out only after the
//! transaction commits.

use chrono::{Duration, NaiveDate, Weekday};

use crate::booking::{
    week_start, AdmissionController, AdmissionRequest, BookingRequest, BookingRules, DateRange,
    DaySchedule, Decision, Outcome, RejectReason, Rejection, Reservation, ReservationId,
    ScheduleInputs,
};
use crate::calendar::{is_weekend, weekday_code, Calendar, Period};
use crate::clock::{Clock, SystemClock};
use crate::error::{CoreError, DatabaseError, ValidationError};
use crate::identity::Identity;
use crate::notify::{Event, NotificationDispatcher};
use crate::storage::{BulkBlockSummary, Config, ReservationDb};

pub struct BookingService {
    db: ReservationDb,
    calendar: Calendar,
    rules: BookingRules,
    clock: Box<dyn Clock>,
    dispatcher: NotificationDispatcher,
}

fn require_admin(actor: &Identity, action: &str) -> Result<(), CoreError> {
    if actor.is_admin() {
        Ok(())
    } else {
        tracing::debug!(actor = %actor.id, action, "permission denied");
        Err(CoreError::PermissionDenied {
            action: action.to_string(),
        })
    }
}

/// The owner named in `on_behalf_of`, if it differs from the actor.
/// Only admins may name someone else.
fn delegated_owner(actor: &Identity, form: &BookingRequest, action: &str) -> Result<Option<String>, CoreError> {
    match form.on_behalf_of.as_deref().map(str::trim) {
        Some(owner) if !owner.is_empty() && owner != actor.id => {
            require_admin(actor, action)?;
            Ok(Some(owner.to_string()))
        }
        _ => Ok(None),
    }
}

/// Turn row-level conflicts raised by the store into rejections.
fn settle<T>(result: Result<Outcome<T>, DatabaseError>, action: &str) -> Result<Outcome<T>, CoreError> {
    match result {
        Ok(outcome) => Ok(outcome),
        Err(DatabaseError::CapacityConflict) => Ok(Outcome::Rejected(Rejection::new(
            RejectReason::CapacityExceeded,
            "the slot filled up while the request was processed",
        ))),
        Err(DatabaseError::DoubleBookingConflict) => Ok(Outcome::Rejected(Rejection::new(
            RejectReason::DoubleBooking,
            "a student on the roster was booked by another request",
        ))),
        Err(e) => {
            tracing::error!(action, error = %e, "storage fault");
            Err(e.into())
        }
    }
}

fn not_found(id: ReservationId) -> Rejection {
    Rejection::new(RejectReason::ReservationNotFound, format!("reservation {id} does not exist"))
}

impl BookingService {
    pub fn new(
        db: ReservationDb,
        calendar: Calendar,
        rules: BookingRules,
        clock: Box<dyn Clock>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        Self {
            db,
            calendar,
            rules,
            clock,
            dispatcher,
        }
    }

    /// Assemble a service from configuration around an opened store.
    ///
    /// # Errors
    /// Returns an error if the calendar or timezone settings are invalid.
    pub fn from_config(db: ReservationDb, config: &Config) -> Result<Self, CoreError> {
        let calendar = Calendar::from_config(&config.calendar)?;
        let clock = SystemClock::from_name(&config.timezone)?;
        Ok(Self::new(
            db,
            calendar,
            BookingRules::from_config(&config.booking),
            Box::new(clock),
            NotificationDispatcher::from_config(&config.notifications),
        ))
    }

    /// Open the store in the data directory and assemble the service.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or the
    /// configuration is invalid.
    pub fn open(config: &Config) -> Result<Self, CoreError> {
        let db = ReservationDb::open(config.booking.max_capacity)?;
        Self::from_config(db, config)
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: NotificationDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn db(&self) -> &ReservationDb {
        &self.db
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    fn controller(&self) -> AdmissionController<'_> {
        AdmissionController::new(&self.calendar, &self.rules, self.clock.as_ref())
    }

    /// Rejection for an owner or window violation on an existing reservation.
    fn modification_rejection(&self, actor: &Identity, existing: &Reservation) -> Option<Rejection> {
        if actor.is_admin() {
            return None;
        }
        if existing.owner_id != actor.id {
            return Some(Rejection::new(
                RejectReason::NotOwner,
                "only the teacher who booked this slot can change it",
            ));
        }
        let start = self.calendar.period_start_at(existing.date, existing.period);
        if !self.rules.can_modify(self.clock.now(), existing.date, start) {
            return Some(Rejection::new(
                RejectReason::ModificationWindowClosed,
                format!(
                    "changes close {} minutes before the period starts",
                    self.rules.modification_window.num_minutes()
                ),
            ));
        }
        None
    }

    // === Reservations ===

    /// Book a slot.
    ///
    /// # Errors
    /// Returns an error on storage faults, or if a non-admin books on behalf
    /// of someone else.
    pub fn book(&self, actor: &Identity, form: &BookingRequest) -> Result<Outcome<Reservation>, CoreError> {
        let owner_id = delegated_owner(actor, form, "booking on behalf of another teacher")?
            .unwrap_or_else(|| actor.id.clone());

        let controller = self.controller();
        let request = AdmissionRequest {
            actor,
            form,
            editing: None,
            time_rules_waived: false,
        };
        let result = self.db.transaction(|tx| match controller.evaluate(tx, &request)? {
            Decision::Rejected(rejection) => Ok(Outcome::Rejected(rejection)),
            Decision::Accepted(admitted) => {
                let id = tx.create(&admitted.into_new_reservation(owner_id))?;
                let reservation = tx.get(id)?.ok_or_else(|| DatabaseError::CorruptRow {
                    table: "reservations",
                    message: format!("reservation {id} missing after insert"),
                })?;
                Ok(Outcome::Accepted(reservation))
            }
        });

        let mut outcome = settle(result, "book")?;
        if let Outcome::Accepted(reservation) = &mut outcome {
            tracing::info!(
                reservation_id = %reservation.id,
                date = %reservation.date,
                period = %reservation.period,
                students = reservation.student_count(),
                owner = %reservation.owner_id,
                "reservation created"
            );
            if let Some(event_id) = self.dispatcher.reservation_created(reservation) {
                match self.db.set_calendar_event_id(reservation.id, &event_id) {
                    Ok(_) => reservation.calendar_event_id = Some(event_id),
                    Err(e) => tracing::warn!(reservation_id = %reservation.id, error = %e, "could not store calendar event id"),
                }
            }
        }
        Ok(outcome)
    }

    /// Replace date, period, roster, module and notes of a reservation.
    ///
    /// Admin edits skip the started, advance and blocked checks and may hand
    /// the reservation to another teacher through `on_behalf_of`. Without it
    /// the owner stays the same.
    ///
    /// # Errors
    /// Returns an error on storage faults, or if a non-admin names another
    /// owner.
    pub fn edit(
        &self,
        actor: &Identity,
        id: ReservationId,
        form: &BookingRequest,
    ) -> Result<Outcome<Reservation>, CoreError> {
        let new_owner = delegated_owner(actor, form, "reassigning a reservation")?;
        let controller = self.controller();
        let request = AdmissionRequest {
            actor,
            form,
            editing: Some(id),
            time_rules_waived: actor.is_admin(),
        };
        let result = self.db.transaction(|tx| {
            let Some(existing) = tx.get(id)? else {
                return Ok(Outcome::Rejected(not_found(id)));
            };
            if let Some(rejection) = self.modification_rejection(actor, &existing) {
                return Ok(Outcome::Rejected(rejection));
            }
            match controller.evaluate(tx, &request)? {
                Decision::Rejected(rejection) => Ok(Outcome::Rejected(rejection)),
                Decision::Accepted(admitted) => {
                    let owner_id = new_owner.clone().unwrap_or(existing.owner_id);
                    tx.update(id, &admitted.into_new_reservation(owner_id))?;
                    let updated = tx.get(id)?.ok_or_else(|| DatabaseError::CorruptRow {
                        table: "reservations",
                        message: format!("reservation {id} missing after update"),
                    })?;
                    Ok(Outcome::Accepted(updated))
                }
            }
        });

        let outcome = settle(result, "edit")?;
        if let Outcome::Accepted(reservation) = &outcome {
            tracing::info!(
                reservation_id = %reservation.id,
                date = %reservation.date,
                period = %reservation.period,
                students = reservation.student_count(),
                actor = %actor.id,
                "reservation updated"
            );
            self.dispatcher.reservation_updated(reservation);
        }
        Ok(outcome)
    }

    /// Cancel a reservation. The accepted outcome carries the removed
    /// reservation.
    ///
    /// # Errors
    /// Returns an error on storage faults.
    pub fn cancel(&self, actor: &Identity, id: ReservationId) -> Result<Outcome<Reservation>, CoreError> {
        let result = self.db.transaction(|tx| {
            let Some(existing) = tx.get(id)? else {
                return Ok(Outcome::Rejected(not_found(id)));
            };
            if let Some(rejection) = self.modification_rejection(actor, &existing) {
                return Ok(Outcome::Rejected(rejection));
            }
            tx.delete(id)?;
            Ok(Outcome::Accepted(existing))
        });

        let outcome = settle(result, "cancel")?;
        if let Outcome::Accepted(reservation) = &outcome {
            tracing::info!(reservation_id = %reservation.id, actor = %actor.id, "reservation cancelled");
            self.dispatcher.reservation_deleted(reservation);
        }
        Ok(outcome)
    }

    pub fn reservation(&self, id: ReservationId) -> Result<Option<Reservation>, CoreError> {
        Ok(self.db.get(id)?)
    }

    /// Reservations owned by `actor`, newest slot first.
    pub fn reservations_of(&self, actor: &Identity) -> Result<Vec<Reservation>, CoreError> {
        Ok(self.db.list_for_owner(&actor.id)?)
    }

    // === Slot administration ===

    /// Close a slot for bookings. Returns `false` if it was already blocked.
    ///
    /// # Errors
    /// Returns [`CoreError::PermissionDenied`] for non-admins.
    pub fn block_slot(
        &self,
        actor: &Identity,
        date: NaiveDate,
        period: Period,
        reason: &str,
    ) -> Result<bool, CoreError> {
        require_admin(actor, "blocking a slot")?;
        let reason = reason.trim();
        let blocked = self.db.block(date, period, &actor.id, reason)?;
        if blocked {
            tracing::info!(%date, %period, admin = %actor.id, reason, "slot blocked");
            self.dispatcher.publish(Event::SlotBlocked {
                date,
                period,
                reason: reason.to_string(),
                at: chrono::Utc::now(),
            });
        }
        Ok(blocked)
    }

    /// Reopen a slot. Returns `false` if it was not blocked.
    ///
    /// # Errors
    /// Returns [`CoreError::PermissionDenied`] for non-admins.
    pub fn unblock_slot(&self, actor: &Identity, date: NaiveDate, period: Period) -> Result<bool, CoreError> {
        require_admin(actor, "unblocking a slot")?;
        let removed = self.db.unblock(date, period)?;
        if removed {
            tracing::info!(%date, %period, admin = %actor.id, "slot unblocked");
            self.dispatcher.publish(Event::SlotUnblocked {
                date,
                period,
                at: chrono::Utc::now(),
            });
        }
        Ok(removed)
    }

    /// Block `periods` (all when `None`) on every day of `range`.
    ///
    /// # Errors
    /// Returns [`CoreError::PermissionDenied`] for non-admins.
    pub fn bulk_block(
        &self,
        actor: &Identity,
        range: DateRange,
        periods: Option<&[Period]>,
        reason: &str,
    ) -> Result<BulkBlockSummary, CoreError> {
        require_admin(actor, "bulk blocking slots")?;
        let summary = self.db.bulk_block(range, periods, &actor.id, reason.trim())?;
        tracing::info!(
            start = %range.start(),
            end = %range.end(),
            blocked = summary.blocked_count,
            skipped = summary.skipped_count,
            admin = %actor.id,
            "slots bulk blocked"
        );
        self.dispatcher.publish(Event::SlotsBulkBlocked {
            start: range.start(),
            end: range.end(),
            blocked_count: summary.blocked_count,
            skipped_count: summary.skipped_count,
            at: chrono::Utc::now(),
        });
        Ok(summary)
    }

    /// Replace the offer shown for a weekday and period.
    ///
    /// # Errors
    /// Returns [`CoreError::PermissionDenied`] for non-admins and a
    /// validation error for weekends or an empty label.
    pub fn set_offer_label(
        &self,
        actor: &Identity,
        weekday: Weekday,
        period: Period,
        label: &str,
    ) -> Result<(), CoreError> {
        require_admin(actor, "changing an offer label")?;
        if is_weekend(weekday) {
            return Err(ValidationError::InvalidValue {
                field: "weekday".to_string(),
                message: "no periods on weekends".to_string(),
            }
            .into());
        }
        let label = label.trim();
        if label.is_empty() {
            return Err(ValidationError::InvalidValue {
                field: "label".to_string(),
                message: "must not be empty".to_string(),
            }
            .into());
        }
        self.db.set_slot_name_override(weekday, period, label, &actor.id)?;
        tracing::info!(weekday = weekday_code(weekday), %period, label, admin = %actor.id, "offer label set");
        self.dispatcher.publish(Event::OfferLabelChanged {
            weekday: weekday_code(weekday).to_string(),
            period,
            label: Some(label.to_string()),
            at: chrono::Utc::now(),
        });
        Ok(())
    }

    /// Drop an offer label override. Returns `false` if none existed.
    ///
    /// # Errors
    /// Returns [`CoreError::PermissionDenied`] for non-admins.
    pub fn clear_offer_label(&self, actor: &Identity, weekday: Weekday, period: Period) -> Result<bool, CoreError> {
        require_admin(actor, "changing an offer label")?;
        let removed = self.db.clear_slot_name_override(weekday, period)?;
        if removed {
            tracing::info!(weekday = weekday_code(weekday), %period, admin = %actor.id, "offer label cleared");
            self.dispatcher.publish(Event::OfferLabelChanged {
                weekday: weekday_code(weekday).to_string(),
                period,
                label: None,
                at: chrono::Utc::now(),
            });
        }
        Ok(removed)
    }

    // === Views ===

    fn schedules(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DaySchedule>, CoreError> {
        let range = DateRange::new(start, end)?;
        let reservations = self.db.list_between(start, end)?;
        let blocked = self.db.list_blocked_between(start, end)?;
        let overrides = self.db.list_slot_name_overrides()?;
        let inputs = ScheduleInputs {
            reservations: &reservations,
            blocked: &blocked,
            overrides: &overrides,
        };
        let now = self.clock.now();
        Ok(range
            .days()
            .map(|date| DaySchedule::build(date, &self.calendar, &self.rules, now, inputs))
            .collect())
    }

    /// All six periods of `date` with fill, offer and block state.
    pub fn day_schedule(&self, date: NaiveDate) -> Result<DaySchedule, CoreError> {
        let mut days = self.schedules(date, date)?;
        days.pop().ok_or_else(|| {
            CoreError::Validation(ValidationError::InvalidValue {
                field: "date".to_string(),
                message: format!("no schedule for {date}"),
            })
        })
    }

    /// Monday to Friday of the week containing `date`.
    pub fn week_overview(&self, date: NaiveDate) -> Result<Vec<DaySchedule>, CoreError> {
        let monday = week_start(date);
        self.schedules(monday, monday + Duration::days(4))
    }
}
