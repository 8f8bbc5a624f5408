//! The live, swappable view of "which shard owns which hash range" (spec
//! §4.3), using an `ArcSwap`-backed hot-reload pattern — an owned field
//! rather than a global `Lazy` static, so a process can host more than one
//! manager and tests don't share state across each other.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use thiserror::Error;
use tracing::{debug, info, warn};

use accessd_config::{
    ref_counts_by_config, DataElement, Operation, ShardClientConfig, ShardConfigurationSet,
};
use accessd_metrics::CoordinatorMetrics;

use crate::client_factory::ClientFactory;
use crate::hash_ring::HashRing;
use crate::hasher::Hasher;
use crate::shard_handle::ShardHandle;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("no shard configured for ({element}, {operation})")]
    NoShardForElementOperation {
        element: DataElement,
        operation: Operation,
    },
    #[error("configuration set failed validation: {0}")]
    ConfigInvalid(#[from] accessd_config::ConfigError),
}

/// One ring per (element, operation) pair, plus the pool of live clients
/// keyed by `ShardClientConfig` so shared configs (spec's ref-counting) only
/// get a single `ShardClient` instance.
struct Rings {
    rings: HashMap<(DataElement, Operation), HashRing<Arc<ShardHandle>>>,
    pool: HashMap<ShardClientConfig, Arc<ShardHandle>>,
    config: ShardConfigurationSet,
}

impl Rings {
    fn empty() -> Self {
        Self {
            rings: HashMap::new(),
            pool: HashMap::new(),
            config: ShardConfigurationSet::default(),
        }
    }
}

/// Owns the current `{(element, operation) -> HashRing}` view and the pool
/// of live `ShardClient` handles behind it. Reads (`get_client`,
/// `get_all_clients`) never block a concurrent `refresh_configuration` and
/// vice versa: both sides operate on an `Arc<Rings>` snapshot (spec §5
/// "refresh is atomic with respect to in-flight reads").
pub struct ShardClientManager {
    rings: ArcSwap<Rings>,
    factory: Box<dyn ClientFactory>,
    user_hasher: Box<dyn Hasher>,
    group_hasher: Box<dyn Hasher>,
    metrics: Arc<CoordinatorMetrics>,
}

impl ShardClientManager {
    pub fn new(
        factory: Box<dyn ClientFactory>,
        user_hasher: Box<dyn Hasher>,
        group_hasher: Box<dyn Hasher>,
        metrics: Arc<CoordinatorMetrics>,
    ) -> Self {
        Self {
            rings: ArcSwap::from_pointee(Rings::empty()),
            factory,
            user_hasher,
            group_hasher,
            metrics,
        }
    }

    /// Builds a manager already populated from `config` (skips the "empty
    /// ring" window between construction and the first refresh).
    pub fn construct(
        config: ShardConfigurationSet,
        factory: Box<dyn ClientFactory>,
        user_hasher: Box<dyn Hasher>,
        group_hasher: Box<dyn Hasher>,
        metrics: Arc<CoordinatorMetrics>,
    ) -> Result<Self, ManagerError> {
        let manager = Self::new(factory, user_hasher, group_hasher, metrics);
        manager.refresh_configuration(config)?;
        Ok(manager)
    }

    fn hasher_for(&self, element: DataElement) -> &dyn Hasher {
        match element {
            DataElement::Group => self.group_hasher.as_ref(),
            DataElement::User | DataElement::GroupToGroupMapping => self.user_hasher.as_ref(),
        }
    }

    /// Resolves the single shard owning `identifier` for `(element, operation)`.
    pub fn get_client(
        &self,
        element: DataElement,
        operation: Operation,
        identifier: &str,
    ) -> Result<Arc<ShardHandle>, ManagerError> {
        let snapshot = self.rings.load();
        let ring = snapshot.rings.get(&(element, operation)).ok_or(
            ManagerError::NoShardForElementOperation { element, operation },
        )?;
        let h = self.hasher_for(element).hash(identifier);
        ring.lookup(h)
            .cloned()
            .ok_or(ManagerError::NoShardForElementOperation { element, operation })
    }

    /// Every distinct shard client serving `(element, operation)`, for
    /// fan-out recipes. Order is unspecified.
    pub fn get_all_clients(
        &self,
        element: DataElement,
        operation: Operation,
    ) -> Result<Vec<Arc<ShardHandle>>, ManagerError> {
        let snapshot = self.rings.load();
        let ring = snapshot.rings.get(&(element, operation)).ok_or(
            ManagerError::NoShardForElementOperation { element, operation },
        )?;
        Ok(ring.values().cloned().collect())
    }

    /// Returns the configuration set currently in effect.
    pub fn current_configuration(&self) -> ShardConfigurationSet {
        self.rings.load().config.clone()
    }

    /// Builds a whole new ring set from `new_config`, reusing pooled clients
    /// for `ShardClientConfig`s already live and constructing fresh clients
    /// only for newly-referenced ones, then atomically swaps the view (spec
    /// §4.3 `refreshConfiguration`). Never leaves live readers observing a
    /// half-built ring: the swap is the only externally visible mutation.
    /// If `new_config` equals the configuration already in effect, this is
    /// a no-op (spec §4.3: "if newSet equals currentConfiguration, no-op").
    pub fn refresh_configuration(
        &self,
        new_config: ShardConfigurationSet,
    ) -> Result<(), ManagerError> {
        if new_config.equals(&self.current_configuration()) {
            return Ok(());
        }

        let start = self.metrics.configuration_refresh.begin();
        let result = self.try_refresh_configuration(new_config);
        match &result {
            Ok(()) => {
                self.metrics.configuration_refresh.end(start);
                self.metrics.configuration_refreshed.increment();
            }
            Err(_) => self.metrics.configuration_refresh.cancel(),
        }
        result
    }

    fn try_refresh_configuration(
        &self,
        new_config: ShardConfigurationSet,
    ) -> Result<(), ManagerError> {
        new_config.validate()?;

        let previous = self.rings.load_full();
        let new_counts = ref_counts_by_config(&new_config);

        let mut pool: HashMap<ShardClientConfig, Arc<ShardHandle>> = HashMap::new();
        for config in new_counts.keys() {
            let handle = previous.pool.get(config).cloned().unwrap_or_else(|| {
                debug!(shard = %config, "constructing new shard client");
                ShardHandle::new(config.description.clone(), self.factory.build(config))
            });
            pool.insert(config.clone(), handle);
        }

        let dropped = previous.pool.len().saturating_sub(
            pool.keys().filter(|c| previous.pool.contains_key(*c)).count(),
        );
        if dropped > 0 {
            info!(count = dropped, "dropping shard clients no longer referenced");
        }

        let mut rings: HashMap<(DataElement, Operation), HashRing<Arc<ShardHandle>>> =
            HashMap::new();
        for assignment in new_config.items() {
            let client = pool
                .get(&assignment.client_config)
                .expect("every assignment's config was inserted into pool above")
                .clone();
            let ring = rings
                .entry((assignment.element, assignment.operation))
                .or_insert_with(HashRing::new);
            if let Err(err) = ring.insert(assignment.hash_range_start, client) {
                warn!(%err, "duplicate hash range start survived validate()");
            }
        }

        self.rings.store(Arc::new(Rings {
            rings,
            pool,
            config: new_config,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_factory::test_support::FakeClientFactory;
    use crate::hasher::Fnv1aHasher;
    use accessd_config::ShardAssignment;

    fn manager() -> ShardClientManager {
        ShardClientManager::new(
            Box::new(FakeClientFactory),
            Box::new(Fnv1aHasher),
            Box::new(Fnv1aHasher),
            Arc::new(CoordinatorMetrics::new(false)),
        )
    }

    fn config(n: u16) -> ShardClientConfig {
        ShardClientConfig::new("host", n, format!("shard{n}"))
    }

    #[test]
    fn get_client_without_configuration_errors() {
        let manager = manager();
        let err = manager
            .get_client(DataElement::User, Operation::Event, "u1")
            .unwrap_err();
        assert!(matches!(err, ManagerError::NoShardForElementOperation { .. }));
    }

    #[test]
    fn refresh_then_get_client_resolves_to_some_shard() {
        let manager = manager();
        let set = ShardConfigurationSet::new(vec![
            ShardAssignment::new(DataElement::User, Operation::Event, 0, config(1)),
            ShardAssignment::new(DataElement::User, Operation::Event, 32, config(2)),
        ]);
        manager.refresh_configuration(set).unwrap();

        assert!(manager
            .get_client(DataElement::User, Operation::Event, "some-user")
            .is_ok());
        assert_eq!(
            manager
                .get_all_clients(DataElement::User, Operation::Event)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn refresh_rejects_invalid_configuration_and_keeps_prior_view() {
        let manager = manager();
        let good = ShardConfigurationSet::new(vec![ShardAssignment::new(
            DataElement::User,
            Operation::Event,
            0,
            config(1),
        )]);
        manager.refresh_configuration(good.clone()).unwrap();

        let bad = ShardConfigurationSet::new(vec![
            ShardAssignment::new(DataElement::User, Operation::Event, 0, config(1)),
            ShardAssignment::new(DataElement::User, Operation::Event, 0, config(2)),
        ]);
        assert!(manager.refresh_configuration(bad).is_err());
        assert!(manager.current_configuration().equals(&good));
    }

    #[test]
    fn refresh_with_unchanged_configuration_is_a_no_op() {
        let manager = manager();
        let set = ShardConfigurationSet::new(vec![ShardAssignment::new(
            DataElement::User,
            Operation::Event,
            0,
            config(1),
        )]);
        manager.refresh_configuration(set.clone()).unwrap();

        let user_client = manager
            .get_client(DataElement::User, Operation::Event, "u1")
            .unwrap();

        manager.refresh_configuration(set).unwrap();

        let user_client_after = manager
            .get_client(DataElement::User, Operation::Event, "u1")
            .unwrap();
        assert!(Arc::ptr_eq(&user_client, &user_client_after));
        assert_eq!(manager.metrics.configuration_refreshed.get(), 1);
    }

    #[test]
    fn shared_client_config_is_pooled_once() {
        let manager = manager();
        let shared = config(1);
        let set = ShardConfigurationSet::new(vec![
            ShardAssignment::new(DataElement::User, Operation::Event, 0, shared.clone()),
            ShardAssignment::new(DataElement::Group, Operation::Event, 0, shared.clone()),
        ]);
        manager.refresh_configuration(set).unwrap();

        let user_client = manager
            .get_client(DataElement::User, Operation::Event, "u1")
            .unwrap();
        let group_client = manager
            .get_client(DataElement::Group, Operation::Event, "g1")
            .unwrap();
        assert!(Arc::ptr_eq(&user_client, &group_client));
    }
}
