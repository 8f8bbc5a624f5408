//! Shard configuration data model and persistence.
//!
//! This crate is deliberately free of networking: it owns the value types
//! that describe *where* shards live and *how* requests are partitioned
//! across them (spec §3/§4.2/§4.6), leaving the actual shard RPC client and
//! event store to the `accessd` crate's collaborator traits.

pub mod assignment;
pub mod configuration_set;
pub mod data_element;
pub mod error;
pub mod options;
pub mod persister;
pub mod shard_client_config;

pub use assignment::{HashRangeStart, ShardAssignment};
pub use configuration_set::{ref_counts_by_config, ShardConfigurationSet};
pub use data_element::{DataElement, Operation};
pub use error::ConfigError;
pub use options::{CoordinatorOptions, HasherKind};
pub use persister::{load, JsonFileConfigurationPersister, ShardConfigurationPersister};
pub use shard_client_config::ShardClientConfig;

/// Human-readable label attached to a client, used in error messages and
/// metric labels (spec §3 `ShardDescription`).
pub type ShardDescription = String;
