//! Post-commit notification fan-out.
//!
//! The [`NotificationDispatcher`] owns an in-process [`EventBus`] and a list
//! of [`NotificationSink`]s. Booking decisions never wait on or depend on a
//! sink: failures are logged at warn level and dropped.

mod events;
mod sink;

pub use events::{Event, EventBus};
pub use sink::{LogSink, NotificationSink, OutboxSink, SinkError};

use tokio::sync::broadcast;

use crate::booking::Reservation;
use crate::storage::config::NotificationsConfig;

pub struct NotificationDispatcher {
    bus: EventBus,
    sinks: Vec<Box<dyn NotificationSink>>,
}

impl NotificationDispatcher {
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            bus: EventBus::new(channel_capacity),
            sinks: Vec::new(),
        }
    }

    /// Build from configuration, registering the log and outbox sinks it
    /// enables.
    pub fn from_config(config: &NotificationsConfig) -> Self {
        let mut dispatcher = Self::new(config.channel_capacity);
        if config.log_events {
            dispatcher.add_sink(Box::new(LogSink));
        }
        if let Some(path) = config.outbox_path.as_deref().filter(|p| !p.trim().is_empty()) {
            dispatcher.add_sink(Box::new(OutboxSink::new(path)));
        }
        dispatcher
    }

    pub fn with_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.add_sink(sink);
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Broadcast `event` and hand it to every sink.
    pub fn publish(&self, event: Event) {
        for sink in &self.sinks {
            if let Err(e) = sink.on_event(&event) {
                tracing::warn!(sink = sink.name(), kind = event.kind(), error = %e, "notification sink failed");
            }
        }
        self.bus.publish(event);
    }

    /// Announce a new reservation.
    ///
    /// Returns the first calendar correlation id a sink produced.
    pub fn reservation_created(&self, reservation: &Reservation) -> Option<String> {
        let mut calendar_event_id = None;
        for sink in &self.sinks {
            match sink.on_reservation_created(reservation) {
                Ok(Some(id)) if calendar_event_id.is_none() => calendar_event_id = Some(id),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(sink = sink.name(), reservation_id = %reservation.id, error = %e, "notification sink failed")
                }
            }
        }
        self.publish(Event::reservation_created(reservation));
        calendar_event_id
    }

    pub fn reservation_updated(&self, reservation: &Reservation) {
        self.publish(Event::reservation_updated(reservation));
    }

    pub fn reservation_deleted(&self, reservation: &Reservation) {
        for sink in &self.sinks {
            if let Err(e) = sink.on_reservation_deleted(reservation) {
                tracing::warn!(sink = sink.name(), reservation_id = %reservation.id, error = %e, "notification sink failed");
            }
        }
        self.publish(Event::reservation_deleted(reservation));
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::from_config(&NotificationsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::{ReservationId, Student};
    use crate::calendar::{OfferKind, Period};
    use chrono::{NaiveDate, Utc};
    use std::sync::{Arc, Mutex};

    struct FailingSink;

    impl NotificationSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        fn on_event(&self, _event: &Event) -> Result<(), SinkError> {
            Err("smtp down".into())
        }

        fn on_reservation_created(&self, _r: &Reservation) -> Result<Option<String>, SinkError> {
            Err("smtp down".into())
        }
    }

    struct CalendarMirror {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl NotificationSink for CalendarMirror {
        fn name(&self) -> &str {
            "calendar"
        }

        fn on_event(&self, event: &Event) -> Result<(), SinkError> {
            self.seen.lock().unwrap().push(event.kind().to_string());
            Ok(())
        }

        fn on_reservation_created(&self, r: &Reservation) -> Result<Option<String>, SinkError> {
            Ok(Some(format!("cal-{}", r.id)))
        }
    }

    fn reservation() -> Reservation {
        Reservation {
            id: ReservationId(7),
            date: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
            weekday: "Mon".into(),
            period: Period::new(1).unwrap(),
            owner_id: "t".into(),
            requester_name: "Herr Kaya".into(),
            requester_class: "8c".into(),
            students: vec![Student::new("Ida", "8c")],
            offer_kind: OfferKind::Fixed,
            offer_label: "Wochenstart-Aktivierung".into(),
            notes: String::new(),
            created_at: Utc::now(),
            calendar_event_id: Some("cal-7".into()),
        }
    }

    #[test]
    fn failing_sink_does_not_block_others() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let dispatcher = NotificationDispatcher::new(8)
            .with_sink(Box::new(FailingSink))
            .with_sink(Box::new(CalendarMirror { seen: seen.clone() }));
        let mut rx = dispatcher.subscribe();

        let id = dispatcher.reservation_created(&reservation());
        assert_eq!(id.as_deref(), Some("cal-7"));
        assert_eq!(*seen.lock().unwrap(), vec!["ReservationCreated".to_string()]);

        match rx.try_recv().unwrap() {
            Event::ReservationCreated { student_count, requester_name, .. } => {
                assert_eq!(student_count, 1);
                assert_eq!(requester_name, "Herr Kaya");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn deletion_event_carries_calendar_id() {
        let dispatcher = NotificationDispatcher::new(8);
        let mut rx = dispatcher.subscribe();
        dispatcher.reservation_deleted(&reservation());

        match rx.try_recv().unwrap() {
            Event::ReservationDeleted { reservation_id, calendar_event_id, .. } => {
                assert_eq!(reservation_id, ReservationId(7));
                assert_eq!(calendar_event_id.as_deref(), Some("cal-7"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn from_config_registers_enabled_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let config = NotificationsConfig {
            channel_capacity: 4,
            log_events: true,
            outbox_path: Some(dir.path().join("outbox.jsonl").display().to_string()),
        };
        let dispatcher = NotificationDispatcher::from_config(&config);
        assert_eq!(dispatcher.sink_names(), vec!["log", "outbox"]);
    }
}
