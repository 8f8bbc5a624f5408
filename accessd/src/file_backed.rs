//! Local, file-backed implementations of the Splitter's external
//! collaborator traits (spec §6), for the `split` CLI subcommand and for
//! exercising the protocol against real files instead of an in-memory
//! fake. Not a production shard transport — durable event storage and the
//! writer/admin surfaces are out of scope (spec §1) — but a
//! deployment needs *something* concrete to point the CLI at, the same way
//! `accessd-config::JsonFileConfigurationPersister` is a concrete-but-local
//! stand-in for "Shard Configuration Persister: not further specified"
//! (spec §4.6).
//!
//! Source and target logs are newline-delimited JSON (one [`Event`] per
//! line), append-only, read/written with a `tokio::sync::Mutex` guarding
//! the file handle so concurrent batch reads and the final delete don't
//! interleave.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info};

use accessd_config::HashRangeStart;

use crate::event::{Event, EventId};
use crate::splitter::{
    CollaboratorError, EventDeleter, EventReader, IdempotentEventPersister, OperationRouter,
    WriterAdmin,
};

async fn read_all(path: &Path) -> Result<Vec<Event>, CollaboratorError> {
    let file = match fs::File::open(path).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(CollaboratorError::new(err.to_string())),
    };
    let mut lines = BufReader::new(file).lines();
    let mut events = Vec::new();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| CollaboratorError::new(e.to_string()))?
    {
        if line.trim().is_empty() {
            continue;
        }
        let event: Event =
            serde_json::from_str(&line).map_err(|e| CollaboratorError::new(e.to_string()))?;
        events.push(event);
    }
    Ok(events)
}

/// Reads events from a newline-delimited JSON file, in file order.
pub struct FileEventReader {
    path: PathBuf,
}

impl FileEventReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EventReader for FileEventReader {
    async fn get_initial_event(&self) -> Result<Option<EventId>, CollaboratorError> {
        Ok(read_all(&self.path).await?.first().map(|e| e.event_id))
    }

    async fn get_events(
        &self,
        start_id: EventId,
        range_start: HashRangeStart,
        range_end: HashRangeStart,
        filter_group_events_by_hash_range: bool,
        batch_size: usize,
    ) -> Result<Vec<Event>, CollaboratorError> {
        let events = read_all(&self.path).await?;
        let start = events
            .iter()
            .position(|e| e.event_id == start_id)
            .ok_or_else(|| CollaboratorError::new(format!("unknown start event id {start_id}")))?;
        Ok(events[start..]
            .iter()
            .filter(|e| e.in_range(range_start, range_end, filter_group_events_by_hash_range))
            .take(batch_size)
            .cloned()
            .collect())
    }

    async fn get_next_event_after(&self, id: EventId) -> Result<Option<EventId>, CollaboratorError> {
        let events = read_all(&self.path).await?;
        let pos = events
            .iter()
            .position(|e| e.event_id == id)
            .ok_or_else(|| CollaboratorError::new(format!("unknown event id {id}")))?;
        Ok(events.get(pos + 1).map(|e| e.event_id))
    }
}

/// Appends events to a newline-delimited JSON file, skipping any
/// [`EventId`] already present so repeated delivery of the same batch is a
/// no-op (spec §4.5 "Idempotence").
pub struct FileEventPersister {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileEventPersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl IdempotentEventPersister for FileEventPersister {
    async fn persist_events(&self, events: &[Event]) -> Result<(), CollaboratorError> {
        let _guard = self.lock.lock().await;
        let existing = read_all(&self.path).await?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| CollaboratorError::new(e.to_string()))?;
        let mut written = 0;
        for event in events {
            if existing.iter().any(|e| e.event_id == event.event_id) {
                continue;
            }
            let line = serde_json::to_string(event).map_err(|e| CollaboratorError::new(e.to_string()))?;
            file.write_all(line.as_bytes())
                .await
                .map_err(|e| CollaboratorError::new(e.to_string()))?;
            file.write_all(b"\n")
                .await
                .map_err(|e| CollaboratorError::new(e.to_string()))?;
            written += 1;
        }
        debug!(path = %self.path.display(), written, "persisted event batch to target log");
        Ok(())
    }
}

/// Rewrites the source log with the moved range's events removed.
pub struct FileEventDeleter {
    path: PathBuf,
}

impl FileEventDeleter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EventDeleter for FileEventDeleter {
    async fn delete_events(
        &self,
        range_start: HashRangeStart,
        range_end: HashRangeStart,
        filter_group_events_by_hash_range: bool,
    ) -> Result<(), CollaboratorError> {
        let events = read_all(&self.path).await?;
        let kept: Vec<&Event> = events
            .iter()
            .filter(|e| !e.in_range(range_start, range_end, filter_group_events_by_hash_range))
            .collect();
        let mut body = String::new();
        for event in &kept {
            body.push_str(&serde_json::to_string(event).map_err(|e| CollaboratorError::new(e.to_string()))?);
            body.push('\n');
        }
        fs::write(&self.path, body)
            .await
            .map_err(|e| CollaboratorError::new(e.to_string()))?;
        info!(
            path = %self.path.display(),
            removed = events.len() - kept.len(),
            remaining = kept.len(),
            "deleted events from source log"
        );
        Ok(())
    }
}

/// No real front door to pause — logs the transition so a CLI run is
/// observable. A deployment substitutes its own `OperationRouter` wired to
/// the actual data plane.
#[derive(Debug, Default)]
pub struct LoggingOperationRouter;

#[async_trait]
impl OperationRouter for LoggingOperationRouter {
    async fn pause_operations(&self) -> Result<(), CollaboratorError> {
        info!("pausing incoming operations (logging router: no real data plane attached)");
        Ok(())
    }

    async fn resume_operations(&self) -> Result<(), CollaboratorError> {
        info!("resuming incoming operations");
        Ok(())
    }
}

/// A writer admin with nothing in flight — correct for a local file-backed
/// demo where there is no concurrent writer to drain.
#[derive(Debug, Default)]
pub struct IdleWriterAdmin;

#[async_trait]
impl WriterAdmin for IdleWriterAdmin {
    async fn get_event_processing_count(&self) -> Result<i64, CollaboratorError> {
        Ok(0)
    }

    async fn flush_event_buffers(&self) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use uuid::Uuid;

    fn event(id: EventId, hash: HashRangeStart) -> Event {
        Event {
            event_id: id,
            occurred_at: chrono::Utc::now(),
            kind: EventKind::AddUser,
            payload: serde_json::Value::Null,
            principal_hash: hash,
        }
    }

    #[tokio::test]
    async fn persist_then_read_round_trips_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.ndjson");
        let persister = FileEventPersister::new(&path);
        let reader = FileEventReader::new(&path);

        let e1 = event(Uuid::new_v4(), 5);
        let e2 = event(Uuid::new_v4(), 6);
        persister.persist_events(&[e1.clone(), e2.clone()]).await.unwrap();
        persister.persist_events(&[e1.clone()]).await.unwrap(); // duplicate, must be absorbed

        let events = read_all(&path).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(reader.get_initial_event().await.unwrap(), Some(e1.event_id));
    }

    #[tokio::test]
    async fn deleter_removes_only_in_range_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.ndjson");
        let persister = FileEventPersister::new(&path);

        let in_range = event(Uuid::new_v4(), 5);
        let out_of_range = event(Uuid::new_v4(), 500);
        persister
            .persist_events(&[in_range.clone(), out_of_range.clone()])
            .await
            .unwrap();

        let deleter = FileEventDeleter::new(&path);
        deleter.delete_events(0, 100, true).await.unwrap();

        let remaining = read_all(&path).await.unwrap();
        assert_eq!(remaining, vec![out_of_range]);
    }
}
