use std::time::Duration;

use thiserror::Error;

/// A failure from one of the Splitter's external collaborators (event
/// reader/persister/deleter, operation router, writer admin). Carries no
/// phase context of its own — [`SplitError`] attaches the stable
/// phase-specific message prefix (spec §7 `SplitProtocolFailure`).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Failures the Shard Group Splitter can report (spec §7
/// `SplitPreconditionViolation`, `SplitProtocolFailure`).
#[derive(Debug, Error)]
pub enum SplitError {
    /// An input parameter was out of range. Fatal to the call; never
    /// raised once the protocol itself has started.
    #[error("split precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("Failed to retrieve initial event id from the source shard group.")]
    InitialEventFetch(#[source] CollaboratorError),

    #[error("Failed to read a batch of events from the source shard group.")]
    BatchRead(#[source] CollaboratorError),

    #[error("Failed to write a batch of events to the target shard group.")]
    BatchWrite(#[source] CollaboratorError),

    #[error("Failed to retrieve the next event id from the source shard group.")]
    NextEventFetch(#[source] CollaboratorError),

    #[error("Failed to hold/pause incoming operations on the source shard group.")]
    Pause(#[source] CollaboratorError),

    #[error("Failed to query the source shard group event writer node's processing count.")]
    DrainQuery(#[source] CollaboratorError),

    #[error(
        "Active operations in the source shard group event writer node remains at {count} after {retries} retries with {interval_ms}ms interval."
    )]
    DrainExhausted {
        count: i64,
        retries: u32,
        interval_ms: u64,
    },

    #[error("Failed to flush the source shard group event writer node's buffers.")]
    Flush(#[source] CollaboratorError),

    #[error("Failed to delete events from the source shard group.")]
    Delete(#[source] CollaboratorError),
}

impl SplitError {
    pub fn drain_exhausted(count: i64, retries: u32, interval: Duration) -> Self {
        Self::DrainExhausted {
            count,
            retries,
            interval_ms: interval.as_millis() as u64,
        }
    }
}
