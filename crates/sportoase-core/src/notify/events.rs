use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::booking::{Reservation, ReservationId};
use crate::calendar::Period;

/// Every committed change to reservations or slots produces an Event.
/// Sinks and live subscribers receive them after the transaction commits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    ReservationCreated {
        reservation_id: ReservationId,
        date: NaiveDate,
        period: Period,
        requester_name: String,
        offer_label: String,
        student_count: usize,
        at: DateTime<Utc>,
    },
    ReservationUpdated {
        reservation_id: ReservationId,
        date: NaiveDate,
        period: Period,
        offer_label: String,
        student_count: usize,
        at: DateTime<Utc>,
    },
    /// Carries the calendar correlation id so the mirrored event can be removed.
    ReservationDeleted {
        reservation_id: ReservationId,
        calendar_event_id: Option<String>,
        at: DateTime<Utc>,
    },
    SlotBlocked {
        date: NaiveDate,
        period: Period,
        reason: String,
        at: DateTime<Utc>,
    },
    SlotUnblocked {
        date: NaiveDate,
        period: Period,
        at: DateTime<Utc>,
    },
    SlotsBulkBlocked {
        start: NaiveDate,
        end: NaiveDate,
        blocked_count: usize,
        skipped_count: usize,
        at: DateTime<Utc>,
    },
    /// `label` is `None` when an override was cleared.
    OfferLabelChanged {
        weekday: String,
        period: Period,
        label: Option<String>,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn reservation_created(reservation: &Reservation) -> Self {
        Event::ReservationCreated {
            reservation_id: reservation.id,
            date: reservation.date,
            period: reservation.period,
            requester_name: reservation.requester_name.clone(),
            offer_label: reservation.offer_label.clone(),
            student_count: reservation.student_count(),
            at: Utc::now(),
        }
    }

    pub fn reservation_updated(reservation: &Reservation) -> Self {
        Event::ReservationUpdated {
            reservation_id: reservation.id,
            date: reservation.date,
            period: reservation.period,
            offer_label: reservation.offer_label.clone(),
            student_count: reservation.student_count(),
            at: Utc::now(),
        }
    }

    pub fn reservation_deleted(reservation: &Reservation) -> Self {
        Event::ReservationDeleted {
            reservation_id: reservation.id,
            calendar_event_id: reservation.calendar_event_id.clone(),
            at: Utc::now(),
        }
    }

    /// Name of the variant, as used in the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ReservationCreated { .. } => "ReservationCreated",
            Event::ReservationUpdated { .. } => "ReservationUpdated",
            Event::ReservationDeleted { .. } => "ReservationDeleted",
            Event::SlotBlocked { .. } => "SlotBlocked",
            Event::SlotUnblocked { .. } => "SlotUnblocked",
            Event::SlotsBulkBlocked { .. } => "SlotsBulkBlocked",
            Event::OfferLabelChanged { .. } => "OfferLabelChanged",
        }
    }
}

/// In-process broadcast of events to live subscribers.
///
/// Slow subscribers lose the oldest events once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish to all current subscribers. Returns how many received it.
    pub fn publish(&self, event: Event) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::SlotBlocked {
            date: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
            period: Period::new(3).unwrap(),
            reason: "Sportfest".into(),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "SlotBlocked");
        assert_eq!(json["period"], 3);
        assert_eq!(json["date"], "2030-01-07");
        assert_eq!(event.kind(), "SlotBlocked");
    }

    #[test]
    fn publish_without_subscribers_is_not_an_error() {
        let bus = EventBus::new(4);
        let event = Event::SlotUnblocked {
            date: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
            period: Period::new(1).unwrap(),
            at: Utc::now(),
        };
        assert_eq!(bus.publish(event), 0);
    }

    #[test]
    fn subscribers_receive_published_events() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        let event = Event::SlotUnblocked {
            date: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
            period: Period::new(1).unwrap(),
            at: Utc::now(),
        };
        assert_eq!(bus.publish(event.clone()), 1);
        assert_eq!(rx.try_recv().unwrap(), event);
    }
}
