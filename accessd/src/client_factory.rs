//! Turns a `ShardClientConfig` into a live `ShardClient` (spec §4.2).
//!
//! The factory itself is an external collaborator too — it knows how to
//! dial a shard, `accessd` does not prescribe a transport — but unlike
//! `ShardClient` it is synchronous and infallible at the type level: the
//! manager needs client construction to be cheap and non-blocking so it can
//! build an entire new ring inline during a configuration refresh (spec
//! §4.3 `refreshConfiguration`).

use std::sync::Arc;

use accessd_config::ShardClientConfig;

use crate::shard_client::ShardClient;

/// Builds `ShardClient` handles for a `ShardClientConfig`. Construction is
/// expected to be cheap (e.g. opening a lazy connection pool), not to
/// perform the first round trip — that happens on first use.
pub trait ClientFactory: Send + Sync {
    fn build(&self, config: &ShardClientConfig) -> Arc<dyn ShardClient>;
}

pub mod test_support {
    use super::*;
    use crate::shard_client::test_support::FakeShardClient;

    /// Builds a fresh in-memory `FakeShardClient` per config, ignoring the
    /// config contents beyond using it as an identity.
    #[derive(Debug, Default)]
    pub struct FakeClientFactory;

    impl ClientFactory for FakeClientFactory {
        fn build(&self, _config: &ShardClientConfig) -> Arc<dyn ShardClient> {
            Arc::new(FakeShardClient::new())
        }
    }
}

/// The factory the `accessd run` CLI command wires the manager up with.
/// A real shard RPC client is out of scope for this crate (spec §1) — this
/// is [`test_support::FakeClientFactory`] under a name that doesn't imply
/// "only for tests," so `accessd run` has something concrete to hold
/// without this crate claiming to ship a production transport.
pub use test_support::FakeClientFactory as DemoClientFactory;

#[cfg(test)]
mod tests {
    use super::test_support::FakeClientFactory;
    use super::*;

    #[tokio::test]
    async fn built_client_starts_empty() {
        let factory = FakeClientFactory;
        let config = ShardClientConfig::new("localhost", 5432, "shard-0");
        let client = factory.build(&config);
        assert!(client.get_users().await.unwrap().is_empty());
    }
}
