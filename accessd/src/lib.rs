//! `accessd` — the distributed coordination layer for a sharded
//! access-management service (spec §1/§2): the Shard Client Manager, the
//! Distributed Operation Coordinator, and the Shard Group Splitter. The
//! per-shard access-manager graph, durable event storage, and the
//! HTTP/RPC front door are external collaborators referenced only by the
//! traits in [`shard_client`] and [`splitter`].

pub mod cli;
pub mod client_factory;
pub mod coordinator;
pub mod event;
pub mod file_backed;
pub mod hash_ring;
pub mod hasher;
pub mod shard_client;
pub mod shard_client_manager;
pub mod shard_handle;
pub mod sighup;
pub mod splitter;

pub use coordinator::{CoordinatorError, DistributedOperationCoordinator};
pub use shard_client_manager::{ManagerError, ShardClientManager};
pub use splitter::{ShardGroupSplitter, SplitError, SplitParameters, SplitState};
