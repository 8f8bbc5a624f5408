//! Online rebalancing of a contiguous hash range from a source shard group
//! to a previously-empty target shard group (spec §4.5), structured as a
//! phase-by-phase state machine that copies events, quiesces the source,
//! drains and flushes its writer, copies a final tail batch, and deletes
//! the moved range.

pub mod error;

use std::sync::Arc;
use std::time::Duration;

use accessd_config::HashRangeStart;
use accessd_metrics::CoordinatorMetrics;
use async_trait::async_trait;

use crate::event::{Event, EventId};

pub use error::{CollaboratorError, SplitError};

/// Consumed by the Splitter to walk the source shard group's event log in
/// hash-range order (spec §6 "Event reader").
#[async_trait]
pub trait EventReader: Send + Sync {
    /// The earliest event id in the source's log, or `None` if the source
    /// holds no events at all.
    async fn get_initial_event(&self) -> Result<Option<EventId>, CollaboratorError>;

    /// Up to `batch_size` events starting at `start_id`, restricted to
    /// `[range_start, range_end]` (subject to `filter_group_events_by_hash_range`,
    /// spec §4.5 step 1).
    async fn get_events(
        &self,
        start_id: EventId,
        range_start: HashRangeStart,
        range_end: HashRangeStart,
        filter_group_events_by_hash_range: bool,
        batch_size: usize,
    ) -> Result<Vec<Event>, CollaboratorError>;

    /// The event id immediately following `id` in the source's log, or
    /// `None` if `id` was the last event.
    async fn get_next_event_after(&self, id: EventId) -> Result<Option<EventId>, CollaboratorError>;
}

/// Consumed by the Splitter to write copied events to the target shard
/// group. Must be idempotent over [`EventId`]: the Splitter may deliver the
/// same event more than once (spec §4.5 "Idempotence").
#[async_trait]
pub trait IdempotentEventPersister: Send + Sync {
    async fn persist_events(&self, events: &[Event]) -> Result<(), CollaboratorError>;
}

/// Consumed by the Splitter to remove the moved range from the source once
/// the copy is verified complete (spec §6 "Event deleter").
#[async_trait]
pub trait EventDeleter: Send + Sync {
    async fn delete_events(
        &self,
        range_start: HashRangeStart,
        range_end: HashRangeStart,
        filter_group_events_by_hash_range: bool,
    ) -> Result<(), CollaboratorError>;
}

/// The front-door data-plane component that can hold incoming requests
/// while the source writer drains (spec §6 "Operation router").
#[async_trait]
pub trait OperationRouter: Send + Sync {
    async fn pause_operations(&self) -> Result<(), CollaboratorError>;
    async fn resume_operations(&self) -> Result<(), CollaboratorError>;
}

/// Consumed by the Splitter to observe and flush the source shard group's
/// writer node during drain (spec §6 "Writer administrator").
#[async_trait]
pub trait WriterAdmin: Send + Sync {
    async fn get_event_processing_count(&self) -> Result<i64, CollaboratorError>;
    async fn flush_event_buffers(&self) -> Result<(), CollaboratorError>;
}

/// The protocol's phases, in the order spec §4.5 drives them. Every
/// non-terminal state can transition to `Failed`; there is no rollback
/// transition — earlier phases are not undone (spec "Propagation policy").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitState {
    Init,
    Copying,
    Pausing,
    Draining,
    Flushing,
    TailCopying,
    Deleting,
    Done,
    Failed,
}

/// Validated inputs to [`ShardGroupSplitter::run`] (spec §4.5
/// "Inputs"/§6 "Configuration").
#[derive(Debug, Clone)]
pub struct SplitParameters {
    pub hash_range_start: HashRangeStart,
    pub hash_range_end: HashRangeStart,
    pub filter_group_events_by_hash_range: bool,
    pub event_batch_size: usize,
    pub source_writer_ops_complete_check_retry_attempts: u32,
    pub source_writer_ops_complete_check_retry_interval: Duration,
}

impl SplitParameters {
    /// Preconditions a split call must satisfy up front (spec
    /// `SplitPreconditionViolation`: fatal to the call, never raised mid-protocol).
    /// `source_writer_ops_complete_check_retry_attempts`/`_interval` are
    /// unsigned types, so "negative retry counts" can't be constructed in
    /// the first place — only batch size and the range bounds need a
    /// runtime check.
    pub fn validate(&self) -> Result<(), SplitError> {
        if self.event_batch_size < 1 {
            return Err(SplitError::PreconditionViolation(
                "event_batch_size must be >= 1".into(),
            ));
        }
        if self.hash_range_start > self.hash_range_end {
            return Err(SplitError::PreconditionViolation(format!(
                "hash_range_start ({}) must be <= hash_range_end ({})",
                self.hash_range_start, self.hash_range_end
            )));
        }
        Ok(())
    }
}

/// Drives one (source, target) rebalance: batched copy, quiesce, drain,
/// flush, tail copy, delete (spec §4.5 "Protocol"). Must be run at most
/// once concurrently per (source, target) pair (spec §5 "Splitter");
/// nothing here enforces that — it is an operator discipline, same as the
/// reference design.
pub struct ShardGroupSplitter {
    reader: Arc<dyn EventReader>,
    persister: Arc<dyn IdempotentEventPersister>,
    deleter: Arc<dyn EventDeleter>,
    router: Arc<dyn OperationRouter>,
    writer_admin: Arc<dyn WriterAdmin>,
    metrics: Arc<CoordinatorMetrics>,
    params: SplitParameters,
    state: SplitState,
    /// Last event id seen during the initial copy phase, carried into the
    /// tail-copy phase so it can ask "is there anything after this?"
    /// without re-reading from the very start (spec §4.5 step 5).
    last_seen_event_id: Option<EventId>,
}

impl ShardGroupSplitter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        reader: Arc<dyn EventReader>,
        persister: Arc<dyn IdempotentEventPersister>,
        deleter: Arc<dyn EventDeleter>,
        router: Arc<dyn OperationRouter>,
        writer_admin: Arc<dyn WriterAdmin>,
        metrics: Arc<CoordinatorMetrics>,
        params: SplitParameters,
    ) -> Result<Self, SplitError> {
        params.validate()?;
        Ok(Self {
            reader,
            persister,
            deleter,
            router,
            writer_admin,
            metrics,
            params,
            state: SplitState::Init,
            last_seen_event_id: None,
        })
    }

    pub fn state(&self) -> SplitState {
        self.state
    }

    /// Runs the full protocol to completion. On any fatal failure, `state()`
    /// is left at `Failed` and the router is left paused (spec's documented
    /// default — see `DESIGN.md`'s "Splitter resume-on-failure" decision):
    /// resuming is a separate operator action, not something `run` does
    /// automatically.
    pub async fn run(&mut self) -> Result<(), SplitError> {
        self.state = SplitState::Copying;
        if let Err(err) = self.initial_copy().await {
            self.state = SplitState::Failed;
            return Err(err);
        }

        self.state = SplitState::Pausing;
        if let Err(err) = self.router.pause_operations().await.map_err(SplitError::Pause) {
            self.state = SplitState::Failed;
            return Err(err);
        }

        self.state = SplitState::Draining;
        if let Err(err) = self.drain().await {
            self.state = SplitState::Failed;
            return Err(err);
        }

        self.state = SplitState::Flushing;
        if let Err(err) = self
            .writer_admin
            .flush_event_buffers()
            .await
            .map_err(SplitError::Flush)
        {
            self.state = SplitState::Failed;
            return Err(err);
        }

        self.state = SplitState::TailCopying;
        if let Err(err) = self.tail_copy().await {
            self.state = SplitState::Failed;
            return Err(err);
        }

        self.state = SplitState::Deleting;
        let delete_start = self.metrics.event_delete.begin();
        let delete_result = self
            .deleter
            .delete_events(
                self.params.hash_range_start,
                self.params.hash_range_end,
                self.params.filter_group_events_by_hash_range,
            )
            .await;
        match &delete_result {
            Ok(()) => self.metrics.event_delete.end(delete_start),
            Err(_) => self.metrics.event_delete.cancel(),
        }
        if let Err(err) = delete_result.map_err(SplitError::Delete) {
            self.state = SplitState::Failed;
            return Err(err);
        }

        self.state = SplitState::Done;
        Ok(())
    }

    /// Spec §4.5 step 1: bulk copy without pausing writes.
    async fn initial_copy(&mut self) -> Result<(), SplitError> {
        let initial = self
            .reader
            .get_initial_event()
            .await
            .map_err(SplitError::InitialEventFetch)?;
        if let Some(start) = initial {
            self.copy_from(start).await?;
        }
        Ok(())
    }

    /// Spec §4.5 step 5: copy whatever landed between the initial scan's
    /// last `None` and the quiesce+drain+flush completing. If there was no
    /// initial event at all, re-check `get_initial_event` rather than
    /// `get_next_event_after` (there is no id to anchor the latter on).
    async fn tail_copy(&mut self) -> Result<(), SplitError> {
        let resume_at = match self.last_seen_event_id {
            Some(id) => self
                .reader
                .get_next_event_after(id)
                .await
                .map_err(SplitError::NextEventFetch)?,
            None => self
                .reader
                .get_initial_event()
                .await
                .map_err(SplitError::InitialEventFetch)?,
        };
        match resume_at {
            Some(id) => self.copy_from(id).await,
            None => Ok(()), // "final batch not required"
        }
    }

    /// The batch-copy loop shared by the initial and tail phases: read a
    /// batch, write it, ask for the next start, repeat until exhausted.
    async fn copy_from(&mut self, mut cursor: EventId) -> Result<(), SplitError> {
        loop {
            let batch = {
                let start = self.metrics.event_batch_read.begin();
                let result = self
                    .reader
                    .get_events(
                        cursor,
                        self.params.hash_range_start,
                        self.params.hash_range_end,
                        self.params.filter_group_events_by_hash_range,
                        self.params.event_batch_size,
                    )
                    .await;
                match &result {
                    Ok(_) => self.metrics.event_batch_read.end(start),
                    Err(_) => self.metrics.event_batch_read.cancel(),
                }
                result.map_err(SplitError::BatchRead)?
            };

            let last_in_batch = if let Some(last) = batch.last() {
                let id = last.event_id;
                let start = self.metrics.event_batch_write.begin();
                let result = self.persister.persist_events(&batch).await;
                match &result {
                    Ok(_) => self.metrics.event_batch_write.end(start),
                    Err(_) => self.metrics.event_batch_write.cancel(),
                }
                result.map_err(SplitError::BatchWrite)?;
                self.last_seen_event_id = Some(id);
                id
            } else {
                cursor
            };

            match self
                .reader
                .get_next_event_after(last_in_batch)
                .await
                .map_err(SplitError::NextEventFetch)?
            {
                Some(next) => cursor = next,
                None => return Ok(()),
            }
        }
    }

    /// Spec §4.5 step 3: poll until the writer reports zero in-flight
    /// operations, or fail after the configured retry budget. The very
    /// first check is not a "retry" — the counter only increments for
    /// checks made after that one came back non-zero (spec "Drain observes
    /// zero on the first attempt: no retry metric incremented").
    async fn drain(&mut self) -> Result<(), SplitError> {
        let count = self.poll_processing_count().await?;
        if count == 0 {
            return Ok(());
        }

        let attempts = self.params.source_writer_ops_complete_check_retry_attempts;
        let interval = self.params.source_writer_ops_complete_check_retry_interval;
        let mut last = count;
        for attempt in 1..=attempts {
            tokio::time::sleep(interval).await;
            last = self.poll_processing_count().await?;
            if last == 0 {
                return Ok(());
            }
            self.metrics.event_processing_count_check_retried.increment();
            if attempt == attempts {
                return Err(SplitError::drain_exhausted(last, attempts, interval));
            }
        }
        // attempts == 0: the single initial check already came back non-zero.
        Err(SplitError::drain_exhausted(last, attempts, interval))
    }

    async fn poll_processing_count(&self) -> Result<i64, SplitError> {
        let count = self
            .writer_admin
            .get_event_processing_count()
            .await
            .map_err(SplitError::DrainQuery)?;
        self.metrics.writer_event_processing_count.set(count);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use uuid::Uuid;

    fn event(id: EventId, hash: HashRangeStart) -> Event {
        Event {
            event_id: id,
            occurred_at: chrono::Utc::now(),
            kind: crate::event::EventKind::AddUser,
            payload: serde_json::Value::Null,
            principal_hash: hash,
        }
    }

    /// An in-memory source: a fixed ordered log plus scripted
    /// `get_event_processing_count` responses, so drain/retry behavior is
    /// deterministic in tests.
    struct FakeSource {
        log: Vec<Event>,
        processing_counts: Mutex<VecDeque<i64>>,
        flush_called: Mutex<u32>,
    }

    impl FakeSource {
        fn new(log: Vec<Event>, processing_counts: Vec<i64>) -> Arc<Self> {
            Arc::new(Self {
                log,
                processing_counts: Mutex::new(processing_counts.into()),
                flush_called: Mutex::new(0),
            })
        }

        fn position_of(&self, id: EventId) -> Option<usize> {
            self.log.iter().position(|e| e.event_id == id)
        }
    }

    #[async_trait]
    impl EventReader for FakeSource {
        async fn get_initial_event(&self) -> Result<Option<EventId>, CollaboratorError> {
            Ok(self.log.first().map(|e| e.event_id))
        }

        async fn get_events(
            &self,
            start_id: EventId,
            range_start: HashRangeStart,
            range_end: HashRangeStart,
            filter_group_events_by_hash_range: bool,
            batch_size: usize,
        ) -> Result<Vec<Event>, CollaboratorError> {
            let start = self
                .position_of(start_id)
                .ok_or_else(|| CollaboratorError::new("unknown start id"))?;
            Ok(self.log[start..]
                .iter()
                .filter(|e| e.in_range(range_start, range_end, filter_group_events_by_hash_range))
                .take(batch_size)
                .cloned()
                .collect())
        }

        async fn get_next_event_after(&self, id: EventId) -> Result<Option<EventId>, CollaboratorError> {
            let pos = self
                .position_of(id)
                .ok_or_else(|| CollaboratorError::new("unknown id"))?;
            Ok(self.log.get(pos + 1).map(|e| e.event_id))
        }
    }

    #[async_trait]
    impl WriterAdmin for FakeSource {
        async fn get_event_processing_count(&self) -> Result<i64, CollaboratorError> {
            let mut counts = self.processing_counts.lock();
            Ok(counts.pop_front().unwrap_or(0))
        }

        async fn flush_event_buffers(&self) -> Result<(), CollaboratorError> {
            *self.flush_called.lock() += 1;
            Ok(())
        }
    }

    #[async_trait]
    impl EventDeleter for FakeSource {
        async fn delete_events(
            &self,
            _range_start: HashRangeStart,
            _range_end: HashRangeStart,
            _filter_group_events_by_hash_range: bool,
        ) -> Result<(), CollaboratorError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeRouter {
        paused: Mutex<u32>,
        resumed: Mutex<u32>,
    }

    #[async_trait]
    impl OperationRouter for FakeRouter {
        async fn pause_operations(&self) -> Result<(), CollaboratorError> {
            *self.paused.lock() += 1;
            Ok(())
        }

        async fn resume_operations(&self) -> Result<(), CollaboratorError> {
            *self.resumed.lock() += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeTarget {
        received: Mutex<Vec<Event>>,
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl IdempotentEventPersister for FakeTarget {
        async fn persist_events(&self, events: &[Event]) -> Result<(), CollaboratorError> {
            *self.calls.lock() += 1;
            let mut received = self.received.lock();
            for event in events {
                if !received.iter().any(|e| e.event_id == event.event_id) {
                    received.push(event.clone());
                }
            }
            Ok(())
        }
    }

    fn params(batch_size: usize, attempts: u32) -> SplitParameters {
        SplitParameters {
            hash_range_start: 0,
            hash_range_end: 1000,
            filter_group_events_by_hash_range: true,
            event_batch_size: batch_size,
            source_writer_ops_complete_check_retry_attempts: attempts,
            source_writer_ops_complete_check_retry_interval: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn happy_path_copies_drains_flushes_once_and_deletes() {
        let log: Vec<Event> = (0..8).map(|i| event(Uuid::new_v4(), i * 10)).collect();
        let source = FakeSource::new(log.clone(), vec![0]);
        let router = Arc::new(FakeRouter::default());
        let target = Arc::new(FakeTarget::default());
        let metrics = Arc::new(CoordinatorMetrics::new(true));

        let mut splitter = ShardGroupSplitter::new(
            source.clone(),
            target.clone(),
            source.clone(),
            router.clone(),
            source.clone(),
            metrics.clone(),
            params(2, 5),
        )
        .unwrap();

        splitter.run().await.unwrap();

        assert_eq!(splitter.state(), SplitState::Done);
        assert_eq!(*router.paused.lock(), 1);
        assert_eq!(*source.flush_called.lock(), 1);
        assert_eq!(target.received.lock().len(), log.len());
        assert_eq!(*target.calls.lock(), 4); // 8 events / batch size 2
        assert_eq!(metrics.event_delete.completed(), 1);
        assert_eq!(metrics.event_delete.cancelled(), 0);
    }

    #[tokio::test]
    async fn drain_exhaustion_fails_with_retry_count_and_increments_counter() {
        let log = vec![event(Uuid::new_v4(), 5)];
        // One initial check plus three retries, all non-zero: exhausts the
        // configured retry budget.
        let source = FakeSource::new(log, vec![3, 3, 3, 3]);
        let router = Arc::new(FakeRouter::default());
        let target = Arc::new(FakeTarget::default());
        let metrics = Arc::new(CoordinatorMetrics::new(true));

        let mut splitter = ShardGroupSplitter::new(
            source.clone(),
            target,
            source.clone(),
            router,
            source.clone(),
            metrics.clone(),
            params(10, 3),
        )
        .unwrap();

        let err = splitter.run().await.unwrap_err();
        assert!(matches!(err, SplitError::DrainExhausted { count: 3, retries: 3, .. }));
        assert_eq!(splitter.state(), SplitState::Failed);
        assert_eq!(metrics.event_processing_count_check_retried.get(), 3);
    }

    #[tokio::test]
    async fn drain_success_on_first_check_does_not_increment_retry_counter() {
        let log = vec![event(Uuid::new_v4(), 5)];
        let source = FakeSource::new(log, vec![0]);
        let router = Arc::new(FakeRouter::default());
        let target = Arc::new(FakeTarget::default());
        let metrics = Arc::new(CoordinatorMetrics::new(true));

        let mut splitter = ShardGroupSplitter::new(
            source.clone(),
            target,
            source.clone(),
            router,
            source.clone(),
            metrics.clone(),
            params(10, 5),
        )
        .unwrap();

        splitter.run().await.unwrap();
        assert_eq!(metrics.event_processing_count_check_retried.get(), 0);
    }

    #[tokio::test]
    async fn event_batch_size_zero_is_rejected_up_front() {
        let source = FakeSource::new(vec![], vec![0]);
        let router = Arc::new(FakeRouter::default());
        let target = Arc::new(FakeTarget::default());

        let err = ShardGroupSplitter::new(
            source.clone(),
            target,
            source.clone(),
            router,
            source.clone(),
            Arc::new(CoordinatorMetrics::new(false)),
            params(0, 1),
        )
        .unwrap_err();

        assert!(matches!(err, SplitError::PreconditionViolation(_)));
    }

    #[tokio::test]
    async fn empty_source_skips_copy_and_deletes_nothing() {
        let source = FakeSource::new(vec![], vec![0]);
        let router = Arc::new(FakeRouter::default());
        let target = Arc::new(FakeTarget::default());

        let mut splitter = ShardGroupSplitter::new(
            source.clone(),
            target.clone(),
            source.clone(),
            router,
            source.clone(),
            Arc::new(CoordinatorMetrics::new(false)),
            params(10, 1),
        )
        .unwrap();

        splitter.run().await.unwrap();
        assert_eq!(splitter.state(), SplitState::Done);
        assert!(target.received.lock().is_empty());
    }
}
