//! Event Logger - persists lifecycle events to a JSONL file
//!
//! Subscribes to the EventBus and appends every event, one JSON object per
//! line, for history and debugging.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use super::bus::EventBus;
use super::types::{EventLogEntry, LifecycleEvent};
use crate::gateway::TaskId;

pub struct EventLogger {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl EventLogger {
    /// Open (or create) the log file for appending
    pub fn open(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref().to_path_buf();
        debug!(?path, "EventLogger::open: called");
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a JSON line
    pub fn write_event(&mut self, event: &LifecycleEvent) -> eyre::Result<()> {
        debug!(event_type = event.event_type(), submission = %event.submission(), "EventLogger::write_event");
        let entry = EventLogEntry::new(event.clone());
        let json = serde_json::to_string(&entry)?;
        writeln!(self.writer, "{}", json)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Consume events from the bus until the channel closes
    pub async fn run(mut self, mut rx: broadcast::Receiver<LifecycleEvent>) {
        debug!("EventLogger::run: starting event logger");

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Err(e) = self.write_event(&event) {
                        error!(error = %e, "EventLogger: failed to write event");
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

        let _ = self.writer.flush();
    }
}

/// Spawn the event logger as a background task
///
/// Subscribes before returning, so no event emitted after this call is missed.
pub fn spawn_event_logger(
    event_bus: &Arc<EventBus>,
    path: impl AsRef<Path>,
) -> eyre::Result<tokio::task::JoinHandle<()>> {
    let logger = EventLogger::open(path)?;
    let rx = event_bus.subscribe();
    Ok(tokio::spawn(logger.run(rx)))
}

/// Read every logged event for one task, in file order
///
/// Events without a task id (a submission that never created a task) are
/// skipped. Unparseable lines are logged and skipped.
pub fn read_task_events(path: impl AsRef<Path>, task_id: &TaskId) -> eyre::Result<Vec<EventLogEntry>> {
    let path = path.as_ref();
    debug!(?path, %task_id, "read_task_events: called");

    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<EventLogEntry>(line) {
            Ok(entry) => {
                if entry.event.task_id() == Some(task_id) {
                    entries.push(entry);
                }
            }
            Err(e) => {
                warn!(line, error = %e, "read_task_events: failed to parse line");
            }
        }
    }

    debug!(count = entries.len(), "read_task_events: loaded entries");
    Ok(entries)
}
