//! The union of shard operations, routed per spec §4.4's recipe table:
//! point (hash to a single shard), fan-out (concurrently to every shard for
//! an (element, operation) pair), or composite (point + fan-out chained).

pub mod error;

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use accessd_config::{DataElement, Operation, ShardConfigurationSet};
use accessd_metrics::CoordinatorMetrics;
use futures::future::join_all;

use crate::shard_client::{ComponentAccess, ShardCallError};
use crate::shard_client_manager::ShardClientManager;
use crate::shard_handle::ShardHandle;

pub use error::CoordinatorError;

/// Dispatches every public access-management operation across the shard
/// group, hiding the fact that the answer may come from one shard or many.
pub struct DistributedOperationCoordinator {
    manager: Arc<ShardClientManager>,
    metrics: Arc<CoordinatorMetrics>,
}

async fn timed<T>(
    metrics: &CoordinatorMetrics,
    fut: impl Future<Output = Result<T, CoordinatorError>>,
) -> Result<T, CoordinatorError> {
    let start = metrics.operation.begin();
    let result = fut.await;
    match &result {
        Ok(_) => {
            metrics.operation.end(start);
            metrics.operation_succeeded.increment();
        }
        Err(_) => metrics.operation.cancel(),
    }
    result
}

fn wrap(operation: &str, handle: &ShardHandle, source: ShardCallError) -> CoordinatorError {
    CoordinatorError::shard_call(operation, handle.description.clone(), source)
}

impl DistributedOperationCoordinator {
    pub fn new(manager: Arc<ShardClientManager>, metrics: Arc<CoordinatorMetrics>) -> Self {
        Self { manager, metrics }
    }

    fn point(
        &self,
        element: DataElement,
        operation: Operation,
        identifier: &str,
    ) -> Result<Arc<ShardHandle>, CoordinatorError> {
        Ok(self.manager.get_client(element, operation, identifier)?)
    }

    fn all(
        &self,
        element: DataElement,
        operation: Operation,
    ) -> Result<Vec<Arc<ShardHandle>>, CoordinatorError> {
        Ok(self.manager.get_all_clients(element, operation)?)
    }

    /// Fan-out-all (mutations): succeeds only when every call succeeds. On
    /// failure, surfaces the first failure wrapping its shard description;
    /// already-applied writes on other shards are not rolled back (spec
    /// §4.4 "Fan-out-all semantics").
    ///
    /// `f` receives an owned handle clone (rather than a borrow) so the
    /// resulting futures don't need to name a shared lifetime against
    /// `handles` — each one owns everything it touches.
    async fn fan_out_all<F, Fut>(
        &self,
        handles: &[Arc<ShardHandle>],
        operation: &str,
        f: F,
    ) -> Result<(), CoordinatorError>
    where
        F: Fn(Arc<ShardHandle>) -> Fut,
        Fut: Future<Output = Result<(), ShardCallError>>,
    {
        let results = join_all(handles.iter().cloned().map(f)).await;
        for (handle, result) in handles.iter().zip(results) {
            result.map_err(|e| wrap(operation, handle, e))?;
        }
        Ok(())
    }

    /// Fan-out-any: await every call, OR the booleans; fail if any call
    /// failed (spec §4.4's documented default policy).
    async fn fan_out_any<F, Fut>(
        &self,
        handles: &[Arc<ShardHandle>],
        operation: &str,
        f: F,
    ) -> Result<bool, CoordinatorError>
    where
        F: Fn(Arc<ShardHandle>) -> Fut,
        Fut: Future<Output = Result<bool, ShardCallError>>,
    {
        let results = join_all(handles.iter().cloned().map(f)).await;
        let mut any = false;
        for (handle, result) in handles.iter().zip(results) {
            any |= result.map_err(|e| wrap(operation, handle, e))?;
        }
        Ok(any)
    }

    /// Fan-out collecting a union of results, deduplicated; fails if any
    /// shard call fails.
    async fn fan_out_union<T, F, Fut>(
        &self,
        handles: &[Arc<ShardHandle>],
        operation: &str,
        f: F,
    ) -> Result<Vec<T>, CoordinatorError>
    where
        T: Eq + std::hash::Hash,
        F: Fn(Arc<ShardHandle>) -> Fut,
        Fut: Future<Output = Result<Vec<T>, ShardCallError>>,
    {
        let results = join_all(handles.iter().cloned().map(f)).await;
        let mut union = HashSet::new();
        for (handle, result) in handles.iter().zip(results) {
            let items = result.map_err(|e| wrap(operation, handle, e))?;
            union.extend(items);
        }
        Ok(union.into_iter().collect())
    }

    // --- User ---------------------------------------------------------

    pub async fn add_user(&self, user: &str) -> Result<(), CoordinatorError> {
        timed(&self.metrics, async {
            let handle = self.point(DataElement::User, Operation::Event, user)?;
            handle
                .add_user(user)
                .await
                .map_err(|e| wrap("add user to shard", &handle, e))
        })
        .await
    }

    /// Fans out to every User/Event shard: the identity of the single
    /// shard actually holding `user` cannot be assumed stable across a
    /// rebalance, so the Coordinator removes everywhere it might exist
    /// (spec §4.4's stated default for `removeUser`).
    pub async fn remove_user(&self, user: &str) -> Result<(), CoordinatorError> {
        timed(&self.metrics, async {
            let handles = self.all(DataElement::User, Operation::Event)?;
            self.fan_out_all(&handles, "remove user from shard", |h| async move {
                h.remove_user(user).await
            })
            .await
        })
        .await
    }

    pub async fn contains_user(&self, user: &str) -> Result<bool, CoordinatorError> {
        timed(&self.metrics, async {
            let handles = self.all(DataElement::User, Operation::Query)?;
            self.fan_out_any(&handles, "check for user on shard", |h| async move {
                h.contains_user(user).await
            })
            .await
        })
        .await
    }

    pub async fn get_users(&self) -> Result<Vec<String>, CoordinatorError> {
        timed(&self.metrics, async {
            let handles = self.all(DataElement::User, Operation::Query)?;
            self.fan_out_union(&handles, "list users on shard", |h| async move {
                h.get_users().await
            })
            .await
        })
        .await
    }

    // --- Group ----------------------------------------------------------

    /// Dual-target: the group itself is created on its Group/Event shard,
    /// and every GroupToGroupMapping/Event shard is notified so a
    /// subsequent group-to-group mapping involving it can be accepted
    /// (spec §4.4 "addGroup — Event, dual-target").
    pub async fn add_group(&self, group: &str) -> Result<(), CoordinatorError> {
        timed(&self.metrics, async {
            let primary = self.point(DataElement::Group, Operation::Event, group)?;
            primary
                .add_group(group)
                .await
                .map_err(|e| wrap("add group to shard", &primary, e))?;

            let mapping_handles = self.all(DataElement::GroupToGroupMapping, Operation::Event)?;
            self.fan_out_all(
                &mapping_handles,
                "register group with mapping shard",
                |h| async move { h.add_group(group).await },
            )
            .await
        })
        .await
    }

    pub async fn remove_group(&self, group: &str) -> Result<(), CoordinatorError> {
        timed(&self.metrics, async {
            let handles = self.all(DataElement::Group, Operation::Event)?;
            self.fan_out_all(&handles, "remove group from shard", |h| async move {
                h.remove_group(group).await
            })
            .await
        })
        .await
    }

    pub async fn contains_group(&self, group: &str) -> Result<bool, CoordinatorError> {
        timed(&self.metrics, async {
            let mut handles = self.all(DataElement::User, Operation::Query)?;
            handles.extend(self.all(DataElement::Group, Operation::Query)?);
            handles.extend(self.all(DataElement::GroupToGroupMapping, Operation::Query)?);
            self.fan_out_any(&handles, "check for group on shard", |h| async move {
                h.contains_group(group).await
            })
            .await
        })
        .await
    }

    pub async fn get_groups(&self) -> Result<Vec<String>, CoordinatorError> {
        timed(&self.metrics, async {
            let mut handles = self.all(DataElement::User, Operation::Query)?;
            handles.extend(self.all(DataElement::Group, Operation::Query)?);
            handles.extend(self.all(DataElement::GroupToGroupMapping, Operation::Query)?);
            self.fan_out_union(&handles, "list groups on shard", |h| async move {
                h.get_groups().await
            })
            .await
        })
        .await
    }

    pub async fn add_group_to_group_mapping(
        &self,
        from_group: &str,
        to_group: &str,
    ) -> Result<(), CoordinatorError> {
        timed(&self.metrics, async {
            let handle = self.point(
                DataElement::GroupToGroupMapping,
                Operation::Event,
                from_group,
            )?;
            handle
                .add_group_to_group_mapping(from_group, to_group)
                .await
                .map_err(|e| wrap("add group-to-group mapping on shard", &handle, e))
        })
        .await
    }

    pub async fn add_user_to_group_mapping(
        &self,
        user: &str,
        group: &str,
    ) -> Result<(), CoordinatorError> {
        timed(&self.metrics, async {
            let handle = self.point(DataElement::User, Operation::Event, user)?;
            handle
                .add_user_to_group_mapping(user, group)
                .await
                .map_err(|e| wrap("add user-to-group mapping on shard", &handle, e))
        })
        .await
    }

    /// Direct: point-routed to the user's own User/Query shard.
    pub async fn get_user_to_group_mappings_direct(
        &self,
        user: &str,
    ) -> Result<Vec<String>, CoordinatorError> {
        timed(&self.metrics, async {
            let handle = self.point(DataElement::User, Operation::Query, user)?;
            handle
                .get_user_to_group_mappings(user)
                .await
                .map_err(|e| wrap("read user-to-group mappings on shard", &handle, e))
        })
        .await
    }

    /// Indirect: direct mappings, then expand the resulting group set one
    /// hop through GroupToGroupMapping/Query (spec §4.4
    /// "getUserToGroupMappings (indirect)").
    pub async fn get_user_to_group_mappings_indirect(
        &self,
        user: &str,
    ) -> Result<Vec<String>, CoordinatorError> {
        timed(&self.metrics, async {
            let direct = {
                let handle = self.point(DataElement::User, Operation::Query, user)?;
                handle
                    .get_user_to_group_mappings(user)
                    .await
                    .map_err(|e| wrap("read user-to-group mappings on shard", &handle, e))?
            };
            self.expand_group_closure(direct).await
        })
        .await
    }

    /// One hop of group-to-group expansion: each direct group is
    /// point-routed to its own GroupToGroupMapping/Query shard by hash, the
    /// responses merged and deduplicated with the input set.
    async fn expand_group_closure(
        &self,
        direct_groups: Vec<String>,
    ) -> Result<Vec<String>, CoordinatorError> {
        let mut expanded: HashSet<String> = direct_groups.iter().cloned().collect();
        let futures = direct_groups.iter().map(|group| async move {
            let handle = self.point(DataElement::GroupToGroupMapping, Operation::Query, group)?;
            handle
                .get_group_to_group_mappings(group)
                .await
                .map_err(|e| wrap("expand group-to-group mapping on shard", &handle, e))
        });
        for result in join_all(futures).await {
            expanded.extend(result?);
        }
        Ok(expanded.into_iter().collect())
    }

    // --- Entity types / entities -----------------------------------------

    pub async fn add_entity_type(&self, entity_type: &str) -> Result<(), CoordinatorError> {
        self.fan_out_entity_event("register entity type on shard", |h| async move {
            h.add_entity_type(entity_type).await
        })
        .await
    }

    pub async fn remove_entity_type(&self, entity_type: &str) -> Result<(), CoordinatorError> {
        self.fan_out_entity_event("remove entity type from shard", |h| async move {
            h.remove_entity_type(entity_type).await
        })
        .await
    }

    pub async fn add_entity(&self, entity_type: &str, entity: &str) -> Result<(), CoordinatorError> {
        self.fan_out_entity_event("register entity on shard", |h| async move {
            h.add_entity(entity_type, entity).await
        })
        .await
    }

    pub async fn remove_entity(
        &self,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), CoordinatorError> {
        self.fan_out_entity_event("remove entity from shard", |h| async move {
            h.remove_entity(entity_type, entity).await
        })
        .await
    }

    /// Shared fan-out-all target for the entity-type/entity mutations:
    /// every User/Event ∪ Group/Event shard (spec §4.4).
    async fn fan_out_entity_event<F, Fut>(&self, operation: &str, f: F) -> Result<(), CoordinatorError>
    where
        F: Fn(Arc<ShardHandle>) -> Fut,
        Fut: Future<Output = Result<(), ShardCallError>>,
    {
        timed(&self.metrics, async {
            let mut handles = self.all(DataElement::User, Operation::Event)?;
            handles.extend(self.all(DataElement::Group, Operation::Event)?);
            self.fan_out_all(&handles, operation, f).await
        })
        .await
    }

    pub async fn get_entity_types(&self) -> Result<Vec<String>, CoordinatorError> {
        timed(&self.metrics, async {
            let mut handles = self.all(DataElement::User, Operation::Query)?;
            handles.extend(self.all(DataElement::Group, Operation::Query)?);
            self.fan_out_union(&handles, "list entity types on shard", |h| async move {
                h.get_entity_types().await
            })
            .await
        })
        .await
    }

    // --- Component / entity access mappings ------------------------------

    pub async fn add_user_to_application_component_and_access_level_mapping(
        &self,
        user: &str,
        application_component: &str,
        access_level: &str,
    ) -> Result<(), CoordinatorError> {
        timed(&self.metrics, async {
            let handle = self.point(DataElement::User, Operation::Event, user)?;
            handle
                .add_user_to_application_component_and_access_level_mapping(
                    user,
                    application_component,
                    access_level,
                )
                .await
                .map_err(|e| wrap("add user access mapping on shard", &handle, e))
        })
        .await
    }

    pub async fn add_group_to_application_component_and_access_level_mapping(
        &self,
        group: &str,
        application_component: &str,
        access_level: &str,
    ) -> Result<(), CoordinatorError> {
        timed(&self.metrics, async {
            let handle = self.point(DataElement::Group, Operation::Event, group)?;
            handle
                .add_group_to_application_component_and_access_level_mapping(
                    group,
                    application_component,
                    access_level,
                )
                .await
                .map_err(|e| wrap("add group access mapping on shard", &handle, e))
        })
        .await
    }

    pub async fn add_user_to_entity_mapping(
        &self,
        user: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), CoordinatorError> {
        timed(&self.metrics, async {
            let handle = self.point(DataElement::User, Operation::Event, user)?;
            handle
                .add_user_to_entity_mapping(user, entity_type, entity)
                .await
                .map_err(|e| wrap("add user entity mapping on shard", &handle, e))
        })
        .await
    }

    pub async fn add_group_to_entity_mapping(
        &self,
        group: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), CoordinatorError> {
        timed(&self.metrics, async {
            let handle = self.point(DataElement::Group, Operation::Event, group)?;
            handle
                .add_group_to_entity_mapping(group, entity_type, entity)
                .await
                .map_err(|e| wrap("add group entity mapping on shard", &handle, e))
        })
        .await
    }

    // --- Composite access checks -----------------------------------------

    /// Resolves `user`'s direct groups, expands the closure one hop through
    /// GroupToGroupMapping, then ORs `hasAccess` across every Group/Query
    /// shard with the resulting group set (spec §4.4 "Composite").
    pub async fn has_access_to_application_component(
        &self,
        user: &str,
        application_component: &str,
        access_level: &str,
    ) -> Result<bool, CoordinatorError> {
        timed(&self.metrics, async {
            let groups = self.resolve_group_closure(user).await?;
            let handles = self.all(DataElement::Group, Operation::Query)?;
            self.fan_out_any(
                &handles,
                "check application component access on shard",
                |h| {
                    let groups = groups.clone();
                    async move {
                        h.group_set_has_access_to_application_component(
                            &groups,
                            application_component,
                            access_level,
                        )
                        .await
                    }
                },
            )
            .await
        })
        .await
    }

    pub async fn has_access_to_entity(
        &self,
        user: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<bool, CoordinatorError> {
        timed(&self.metrics, async {
            let groups = self.resolve_group_closure(user).await?;
            let handles = self.all(DataElement::Group, Operation::Query)?;
            self.fan_out_any(&handles, "check entity access on shard", |h| {
                let groups = groups.clone();
                async move { h.group_set_has_access_to_entity(&groups, entity_type, entity).await }
            })
            .await
        })
        .await
    }

    pub async fn get_application_components_accessible_by_user(
        &self,
        user: &str,
    ) -> Result<Vec<ComponentAccess>, CoordinatorError> {
        timed(&self.metrics, async {
            let direct = {
                let handle = self.point(DataElement::User, Operation::Query, user)?;
                handle
                    .application_components_accessible_by_user(user)
                    .await
                    .map_err(|e| wrap("list user-accessible components on shard", &handle, e))?
            };
            let groups = self.resolve_group_closure(user).await?;
            let handles = self.all(DataElement::Group, Operation::Query)?;
            let via_groups = self
                .fan_out_union(&handles, "list group-accessible components on shard", |h| {
                    let groups = groups.clone();
                    async move { h.application_components_accessible_by_group_set(&groups).await }
                })
                .await?;
            Ok(dedup_component_access(direct, via_groups))
        })
        .await
    }

    pub async fn get_application_components_accessible_by_group(
        &self,
        group: &str,
    ) -> Result<Vec<ComponentAccess>, CoordinatorError> {
        timed(&self.metrics, async {
            let groups = self.expand_group_closure(vec![group.to_string()]).await?;
            let handles = self.all(DataElement::Group, Operation::Query)?;
            self.fan_out_union(&handles, "list group-accessible components on shard", |h| {
                let groups = groups.clone();
                async move { h.application_components_accessible_by_group_set(&groups).await }
            })
            .await
        })
        .await
    }

    async fn resolve_group_closure(&self, user: &str) -> Result<Vec<String>, CoordinatorError> {
        let direct = {
            let handle = self.point(DataElement::User, Operation::Query, user)?;
            handle
                .get_user_to_group_mappings(user)
                .await
                .map_err(|e| wrap("read user-to-group mappings on shard", &handle, e))?
        };
        self.expand_group_closure(direct).await
    }

    // --- Configuration ----------------------------------------------------

    /// Delegates to the Shard Client Manager and wraps any failure (spec
    /// §4.4 "Shard Configuration Refresh").
    pub fn refresh_shard_configuration(
        &self,
        new_set: ShardConfigurationSet,
    ) -> Result<(), CoordinatorError> {
        self.manager
            .refresh_configuration(new_set)
            .map_err(CoordinatorError::ConfigurationRefreshFailure)
    }
}

fn dedup_component_access(
    direct: Vec<ComponentAccess>,
    via_groups: Vec<ComponentAccess>,
) -> Vec<ComponentAccess> {
    let mut seen: HashSet<ComponentAccess> = HashSet::new();
    let mut out = Vec::new();
    for item in direct.into_iter().chain(via_groups) {
        if seen.insert(item.clone()) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_factory::ClientFactory;
    use crate::hasher::Fnv1aHasher;
    use crate::shard_client::test_support::FakeShardClient;
    use accessd_config::{ShardAssignment, ShardClientConfig, ShardConfigurationSet};

    struct MapFactory {
        clients: std::sync::Mutex<std::collections::HashMap<String, Arc<FakeShardClient>>>,
    }

    impl MapFactory {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                clients: std::sync::Mutex::new(std::collections::HashMap::new()),
            })
        }

        fn client_for(&self, description: &str) -> Arc<FakeShardClient> {
            self.clients
                .lock()
                .unwrap()
                .entry(description.to_string())
                .or_insert_with(|| Arc::new(FakeShardClient::new()))
                .clone()
        }
    }

    impl ClientFactory for MapFactory {
        fn build(&self, config: &ShardClientConfig) -> Arc<dyn crate::shard_client::ShardClient> {
            self.client_for(&config.description)
        }
    }

    fn config(n: u16) -> ShardClientConfig {
        ShardClientConfig::new("host", n, format!("shard{n}"))
    }

    fn coordinator() -> (DistributedOperationCoordinator, Arc<MapFactory>) {
        let factory = MapFactory::new();
        let manager = ShardClientManager::new(
            Box::new(factory.clone()) as Box<dyn ClientFactory>,
            Box::new(Fnv1aHasher),
            Box::new(Fnv1aHasher),
            Arc::new(CoordinatorMetrics::new(false)),
        );
        let set = ShardConfigurationSet::new(vec![
            ShardAssignment::new(DataElement::User, Operation::Event, 0, config(1)),
            ShardAssignment::new(DataElement::User, Operation::Event, 1 << 30, config(2)),
            ShardAssignment::new(DataElement::User, Operation::Query, 0, config(1)),
            ShardAssignment::new(DataElement::User, Operation::Query, 1 << 30, config(2)),
        ]);
        manager.refresh_configuration(set).unwrap();
        let coordinator =
            DistributedOperationCoordinator::new(Arc::new(manager), Arc::new(CoordinatorMetrics::new(false)));
        (coordinator, factory)
    }

    #[tokio::test]
    async fn add_user_is_point_routed_to_one_shard() {
        let (coordinator, factory) = coordinator();
        coordinator.add_user("alice").await.unwrap();

        let total: usize = ["shard1", "shard2"]
            .iter()
            .map(|d| {
                factory
                    .client_for(d)
                    .users
                    .lock()
                    .iter()
                    .filter(|u| *u == "alice")
                    .count()
            })
            .sum();
        assert_eq!(total, 1);
    }

    #[tokio::test]
    async fn remove_user_fans_out_to_every_shard() {
        let (coordinator, factory) = coordinator();
        factory.client_for("shard1").users.lock().insert("alice".into());
        factory.client_for("shard2").users.lock().insert("alice".into());

        coordinator.remove_user("alice").await.unwrap();

        assert!(!factory.client_for("shard1").users.lock().contains("alice"));
        assert!(!factory.client_for("shard2").users.lock().contains("alice"));
    }

    #[tokio::test]
    async fn contains_user_ors_across_shards() {
        let (coordinator, factory) = coordinator();
        factory.client_for("shard2").users.lock().insert("alice".into());

        assert!(coordinator.contains_user("alice").await.unwrap());
        assert!(!coordinator.contains_user("bob").await.unwrap());
    }

    #[tokio::test]
    async fn contains_user_fails_if_any_shard_fails() {
        let (coordinator, factory) = coordinator();
        *factory.client_for("shard1").fail_with.lock() = Some("boom".into());

        let err = coordinator.contains_user("alice").await.unwrap_err();
        assert!(matches!(err, CoordinatorError::ShardCall { .. }));
        assert!(err.to_string().contains("shard1"));
    }

    #[tokio::test]
    async fn get_users_unions_and_dedups() {
        let (coordinator, factory) = coordinator();
        factory.client_for("shard1").users.lock().insert("alice".into());
        factory.client_for("shard2").users.lock().insert("bob".into());

        let mut users = coordinator.get_users().await.unwrap();
        users.sort();
        assert_eq!(users, vec!["alice".to_string(), "bob".to_string()]);
    }
}
