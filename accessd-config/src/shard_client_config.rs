use serde::{Deserialize, Serialize};

/// Opaque, value-equal identifier for a reachable shard endpoint.
///
/// This is the unit of identity the shard client manager pools clients by:
/// every `ShardAssignment` that carries an equal `ShardClientConfig` shares
/// the same pooled `ShardClient` handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardClientConfig {
    /// Host or DNS name of the shard group's front door.
    pub host: String,
    /// Port the shard group's front door listens on.
    pub port: u16,
    /// Human-readable label, used in error messages and metric labels.
    pub description: String,
}

impl ShardClientConfig {
    pub fn new(host: impl Into<String>, port: u16, description: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            description: description.into(),
        }
    }
}

impl std::fmt::Display for ShardClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
