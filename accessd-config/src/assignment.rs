use serde::{Deserialize, Serialize};

use crate::{DataElement, Operation, ShardClientConfig};

/// The inclusive lower bound of a hash range owned by a shard, for one
/// (element, operation) pairing. Ranges partition the full `i32` space;
/// the owner of hash `h` is the shard whose start is the largest `<= h`,
/// or the shard with the largest start if none is `<= h` (wrap-around).
pub type HashRangeStart = i32;

/// One row of a shard configuration: which shard owns a given hash range
/// for a given (data element, operation) pair.
///
/// Uniqueness key: `(element, operation, hash_range_start)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardAssignment {
    pub element: DataElement,
    pub operation: Operation,
    pub hash_range_start: HashRangeStart,
    pub client_config: ShardClientConfig,
}

impl ShardAssignment {
    pub fn new(
        element: DataElement,
        operation: Operation,
        hash_range_start: HashRangeStart,
        client_config: ShardClientConfig,
    ) -> Self {
        Self {
            element,
            operation,
            hash_range_start,
            client_config,
        }
    }

    /// The `(element, operation, hash_range_start)` uniqueness key.
    pub fn key(&self) -> (DataElement, Operation, HashRangeStart) {
        (self.element, self.operation, self.hash_range_start)
    }
}
