use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use super::Event;
use crate::booking::Reservation;

pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// A consumer of booking events, such as a mailer or a calendar mirror.
///
/// Hooks run after the change is committed. A failing hook is logged and
/// never changes the outcome of the operation that triggered it.
pub trait NotificationSink: Send + Sync {
    /// Unique identifier used in logs (e.g. "log", "outbox").
    fn name(&self) -> &str;

    /// Called for every event.
    fn on_event(&self, _event: &Event) -> Result<(), SinkError> {
        Ok(()) // default no-op
    }

    /// Called when a reservation is created. A sink that mirrors bookings
    /// into an external calendar returns the id of the created entry.
    fn on_reservation_created(
        &self,
        _reservation: &Reservation,
    ) -> Result<Option<String>, SinkError> {
        Ok(None) // default no-op
    }

    /// Called when a reservation is cancelled.
    fn on_reservation_deleted(&self, _reservation: &Reservation) -> Result<(), SinkError> {
        Ok(()) // default no-op
    }
}

/// Writes every event to the `tracing` log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn on_event(&self, event: &Event) -> Result<(), SinkError> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(kind = event.kind(), %payload, "booking event");
        Ok(())
    }
}

/// Appends every event as one JSON line to a file that an external mailer
/// or calendar bridge consumes.
#[derive(Debug, Clone)]
pub struct OutboxSink {
    path: PathBuf,
}

impl OutboxSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl NotificationSink for OutboxSink {
    fn name(&self) -> &str {
        "outbox"
    }

    fn on_event(&self, event: &Event) -> Result<(), SinkError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Period;
    use chrono::{NaiveDate, Utc};

    #[test]
    fn outbox_appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutboxSink::new(dir.path().join("outbox.jsonl"));
        for period in [1, 2] {
            sink.on_event(&Event::SlotUnblocked {
                date: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
                period: Period::new(period).unwrap(),
                at: Utc::now(),
            })
            .unwrap();
        }

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["type"], "SlotUnblocked");
        assert_eq!(second["period"], 2);
    }

    #[test]
    fn outbox_reports_unwritable_path() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutboxSink::new(dir.path().join("missing").join("outbox.jsonl"));
        let result = sink.on_event(&Event::SlotUnblocked {
            date: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
            period: Period::new(1).unwrap(),
            at: Utc::now(),
        });
        assert!(result.is_err());
    }
}
