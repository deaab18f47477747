//! Read models for the day dashboard and the week overview.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::{BlockedSlot, BookingRules, Reservation, ReservationId, SlotNameOverride};
use crate::calendar::{is_weekend, weekday_code, Calendar, OfferKind, Period};

/// One reservation as shown inside a slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotBooking {
    pub reservation_id: ReservationId,
    pub owner_id: String,
    pub requester_name: String,
    pub requester_class: String,
    pub offer_label: String,
    pub student_count: usize,
}

impl From<&Reservation> for SlotBooking {
    fn from(r: &Reservation) -> Self {
        Self {
            reservation_id: r.id,
            owner_id: r.owner_id.clone(),
            requester_name: r.requester_name.clone(),
            requester_class: r.requester_class.clone(),
            offer_label: r.offer_label.clone(),
            student_count: r.student_count(),
        }
    }
}

/// State of one period on one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotSummary {
    pub period: Period,
    /// "HH:MM - HH:MM"
    pub time: String,
    pub offer_kind: OfferKind,
    pub offer_label: String,
    pub booked: usize,
    pub available: usize,
    pub blocked: bool,
    pub block_reason: Option<String>,
    /// Whether a teacher could book this slot right now.
    pub can_book: bool,
    pub bookings: Vec<SlotBooking>,
}

/// All six periods of a date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub weekday: String,
    pub slots: Vec<SlotSummary>,
}

/// Persisted state of a date range needed to render schedules.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleInputs<'a> {
    pub reservations: &'a [Reservation],
    pub blocked: &'a [BlockedSlot],
    pub overrides: &'a [SlotNameOverride],
}

impl DaySchedule {
    pub fn build(
        date: NaiveDate,
        calendar: &Calendar,
        rules: &BookingRules,
        now: NaiveDateTime,
        inputs: ScheduleInputs<'_>,
    ) -> Self {
        let weekday = date.weekday();
        let code = weekday_code(weekday);
        let slots = Period::all()
            .map(|period| {
                let bookings: Vec<SlotBooking> = inputs
                    .reservations
                    .iter()
                    .filter(|r| r.date == date && r.period == period)
                    .map(SlotBooking::from)
                    .collect();
                let booked: usize = bookings.iter().map(|b| b.student_count).sum();
                let available = rules.max_capacity.saturating_sub(booked);
                let block = inputs
                    .blocked
                    .iter()
                    .find(|b| b.date == date && b.period == period);
                let override_label = inputs
                    .overrides
                    .iter()
                    .find(|o| o.weekday == code && o.period == period)
                    .map(|o| o.label.as_str());
                let offer = calendar.offer_for(weekday, period, override_label);
                let start = calendar.period_start_at(date, period);
                let can_book = !is_weekend(weekday)
                    && start >= now
                    && rules.can_book(now, start)
                    && block.is_none()
                    && available > 0;

                SlotSummary {
                    period,
                    time: calendar.period_time(period).to_string(),
                    offer_kind: offer.kind,
                    offer_label: offer.label,
                    booked,
                    available,
                    blocked: block.is_some(),
                    block_reason: block.map(|b| b.reason.clone()),
                    can_book,
                    bookings,
                }
            })
            .collect();

        Self {
            date,
            weekday: code.to_string(),
            slots,
        }
    }

    pub fn slot(&self, period: Period) -> Option<&SlotSummary> {
        self.slots.iter().find(|s| s.period == period)
    }
}

/// Monday of the week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - chrono::Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::Student;
    use crate::storage::config::CalendarConfig;
    use chrono::{Utc, Weekday};

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 1, 7).unwrap()
    }

    fn reservation(id: i64, period: u8, students: usize) -> Reservation {
        Reservation {
            id: ReservationId(id),
            date: monday(),
            weekday: "Mon".into(),
            period: Period::new(period).unwrap(),
            owner_id: "t".into(),
            requester_name: "Frau Berger".into(),
            requester_class: "7b".into(),
            students: (0..students).map(|i| Student::new(format!("S{i}"), "7b")).collect(),
            offer_kind: OfferKind::Fixed,
            offer_label: "x".into(),
            notes: String::new(),
            created_at: Utc::now(),
            calendar_event_id: None,
        }
    }

    #[test]
    fn day_schedule_reports_fill_blocks_and_offers() {
        let calendar = Calendar::from_config(&CalendarConfig::default()).unwrap();
        let rules = BookingRules::default();
        let now = monday().and_hms_opt(7, 0, 0).unwrap();
        let reservations = vec![reservation(1, 1, 2), reservation(2, 1, 3), reservation(3, 4, 1)];
        let blocked = vec![BlockedSlot {
            date: monday(),
            weekday: "Mon".into(),
            period: Period::new(6).unwrap(),
            admin_id: "a".into(),
            reason: "Konferenz".into(),
            created_at: Utc::now(),
        }];
        let overrides = vec![SlotNameOverride {
            weekday: "Mon".into(),
            period: Period::new(2).unwrap(),
            label: "Yoga".into(),
            admin_id: "a".into(),
            updated_at: Utc::now(),
        }];
        let inputs = ScheduleInputs {
            reservations: &reservations,
            blocked: &blocked,
            overrides: &overrides,
        };

        let day = DaySchedule::build(monday(), &calendar, &rules, now, inputs);
        assert_eq!(day.slots.len(), 6);
        assert_eq!(day.weekday, "Mon");

        let first = day.slot(Period::new(1).unwrap()).unwrap();
        assert_eq!((first.booked, first.available), (5, 0));
        assert!(!first.can_book);
        assert_eq!(first.time, "07:50 - 08:35");

        let second = day.slot(Period::new(2).unwrap()).unwrap();
        assert_eq!(second.offer_label, "Yoga");
        assert!(second.can_book);

        let fourth = day.slot(Period::new(4).unwrap()).unwrap();
        assert_eq!(fourth.offer_kind, OfferKind::Free);
        assert_eq!(fourth.bookings.len(), 1);

        let sixth = day.slot(Period::new(6).unwrap()).unwrap();
        assert!(sixth.blocked);
        assert_eq!(sixth.block_reason.as_deref(), Some("Konferenz"));
        assert!(!sixth.can_book);
    }

    #[test]
    fn week_start_is_monday() {
        let sunday = NaiveDate::from_ymd_opt(2030, 1, 13).unwrap();
        assert_eq!(week_start(sunday), monday());
        assert_eq!(week_start(monday()), monday());
        assert_eq!(week_start(sunday).weekday(), Weekday::Mon);
    }
}
