//! Event Logger - persists plan events to JSONL files
//!
//! Subscribes to the EventBus and writes each trip's events to
//! `{runs_dir}/{trip-id}/events.jsonl` for history and `tp show --events`.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{Context, Result};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::{EventLogEntry, PlanEvent};

/// Default directory for per-trip event logs
pub fn default_runs_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripplanner")
        .join("runs")
}

pub struct EventLogger {
    runs_dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl EventLogger {
    pub fn new(runs_dir: impl AsRef<Path>) -> Self {
        let runs_dir = runs_dir.as_ref().to_path_buf();
        debug!(?runs_dir, "EventLogger::new: creating logger");
        Self {
            runs_dir,
            writers: HashMap::new(),
        }
    }

    /// Write an event to its trip's log file
    pub fn write_event(&mut self, event: &PlanEvent) -> Result<()> {
        let trip_id = event.trip_id().to_string();
        debug!(%trip_id, event_type = event.event_type(), "EventLogger::write_event");

        if !self.writers.contains_key(&trip_id) {
            let trip_dir = self.runs_dir.join(&trip_id);
            fs::create_dir_all(&trip_dir).context(format!("Failed to create {}", trip_dir.display()))?;
            let log_path = trip_dir.join("events.jsonl");
            debug!(?log_path, "EventLogger: creating new log file");
            let file = OpenOptions::new().create(true).append(true).open(&log_path)?;
            self.writers.insert(trip_id.clone(), BufWriter::new(file));
        }
        let Some(writer) = self.writers.get_mut(&trip_id) else {
            return Ok(());
        };

        let json = serde_json::to_string(&EventLogEntry::new(event.clone()))?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }

    pub fn close_trip(&mut self, trip_id: &str) {
        debug!(%trip_id, "EventLogger::close_trip");
        if let Some(mut writer) = self.writers.remove(trip_id) {
            let _ = writer.flush();
        }
    }

    /// Consume events until the channel closes
    pub async fn run(&mut self, mut rx: broadcast::Receiver<PlanEvent>) {
        debug!("EventLogger::run: starting event logger");
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = self.write_event(&event) {
                        error!(trip_id = event.trip_id(), error = %e, "EventLogger: failed to write event");
                    }
                    if event.is_terminal() {
                        self.close_trip(event.trip_id());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(missed = n, "EventLogger: lagged behind, missed events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("EventLogger: channel closed, shutting down");
                    break;
                }
            }
        }
        for (trip_id, mut writer) in self.writers.drain() {
            debug!(%trip_id, "EventLogger: flushing writer on shutdown");
            let _ = writer.flush();
        }
    }
}

/// Read a trip's events back from its log file
pub fn read_trip_events(runs_dir: impl AsRef<Path>, trip_id: &str) -> Result<Vec<EventLogEntry>> {
    let log_path = runs_dir.as_ref().join(trip_id).join("events.jsonl");
    debug!(?log_path, "read_trip_events: reading log file");
    if !log_path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(&log_path)?;
    let mut entries = Vec::new();
    for line in content.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<EventLogEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(line, error = %e, "read_trip_events: failed to parse line"),
        }
    }
    Ok(entries)
}

/// Spawn the event logger as a background task
///
/// The subscription is taken before the task starts, so events emitted right
/// after this returns are logged.
pub fn spawn_event_logger(event_bus: Arc<EventBus>, runs_dir: PathBuf) -> tokio::task::JoinHandle<()> {
    let mut logger = EventLogger::new(runs_dir);
    let rx = event_bus.subscribe();
    drop(event_bus);
    tokio::spawn(async move {
        logger.run(rx).await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn started(trip_id: &str) -> PlanEvent {
        PlanEvent::PlanStarted {
            trip_id: trip_id.to_string(),
            destination: "Paris, France".to_string(),
            days: 5,
        }
    }

    #[test]
    fn test_write_and_read_back() {
        let temp = tempdir().unwrap();
        let mut logger = EventLogger::new(temp.path());
        logger.write_event(&started("trip-1")).unwrap();
        logger
            .write_event(&PlanEvent::StoriesReady {
                trip_id: "trip-1".to_string(),
                count: 3,
            })
            .unwrap();
        logger.write_event(&started("trip-2")).unwrap();

        let entries = read_trip_events(temp.path(), "trip-1").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].event.event_type(), "StoriesReady");
        assert!(temp.path().join("trip-2").join("events.jsonl").exists());
        assert!(read_trip_events(temp.path(), "missing").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_closes_writer_on_terminal_event() {
        let temp = tempdir().unwrap();
        let bus = Arc::new(EventBus::new(16));
        let rx = bus.subscribe();
        let emitter = bus.emitter_for("trip-9");
        emitter.plan_started("Rome, Italy", 2);
        emitter.plan_completed(crate::domain::Money::from_major(900.0), true, false);
        drop(emitter);
        drop(bus);

        let mut logger = EventLogger::new(temp.path());
        logger.run(rx).await;
        assert!(logger.writers.is_empty());
        assert_eq!(read_trip_events(temp.path(), "trip-9").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_spawned_logger_keeps_first_events() {
        let temp = tempdir().unwrap();
        let bus = Arc::new(EventBus::new(16));
        let handle = spawn_event_logger(bus.clone(), temp.path().to_path_buf());

        let emitter = bus.emitter_for("trip-3");
        emitter.plan_started("Lisbon, Portugal", 3);
        emitter.plan_completed(crate::domain::Money::from_major(400.0), true, false);
        drop(emitter);
        drop(bus);
        handle.await.unwrap();

        let entries = read_trip_events(temp.path(), "trip-3").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event.event_type(), "PlanStarted");
    }
}
