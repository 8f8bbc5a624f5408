use accessd_config::ShardDescription;
use thiserror::Error;

use crate::shard_client::ShardCallError;
use crate::shard_client_manager::ManagerError;

/// Every outgoing failure from the coordinator carries a stable,
/// operation-specific message prefix plus the shard description it failed
/// against (spec §4.4 "Error translation").
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Failed to {operation} on shard with configuration '{shard}'.")]
    ShardCall {
        operation: String,
        shard: ShardDescription,
        #[source]
        source: ShardCallError,
    },
    #[error("no shard is configured to serve this operation: {0}")]
    NoShard(#[from] ManagerError),
    #[error("failed to refresh shard configuration: {0}")]
    ConfigurationRefreshFailure(#[source] ManagerError),
}

impl CoordinatorError {
    pub fn shard_call(
        operation: impl Into<String>,
        shard: impl Into<ShardDescription>,
        source: ShardCallError,
    ) -> Self {
        Self::ShardCall {
            operation: operation.into(),
            shard: shard.into(),
            source,
        }
    }
}
