use thiserror::Error;

use crate::{DataElement, HashRangeStart, Operation};

/// Failures building or validating a [`crate::ShardConfigurationSet`].
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error(
        "duplicate shard assignment for element={element}, operation={operation}, hash_range_start={hash_range_start}"
    )]
    DuplicateAssignment {
        element: DataElement,
        operation: Operation,
        hash_range_start: HashRangeStart,
    },

    #[error("element={element}, operation={operation} has no shard assignments")]
    EmptyElementOperation { element: DataElement, operation: Operation },

    #[error("failed to read shard configuration: {0}")]
    Read(String),

    #[error("failed to write shard configuration: {0}")]
    Write(String),

    #[error("malformed shard configuration: {0}")]
    Deserialize(String),
}
