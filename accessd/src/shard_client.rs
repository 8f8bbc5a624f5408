//! The per-shard operation surface (spec §6 "shard client API").
//!
//! `ShardClient` is an external collaborator: the per-shard in-memory
//! access-manager graph and its validation layer are explicitly out of
//! scope (spec §1). This trait is the seam the coordinator dispatches
//! through; a real deployment backs it with an RPC client, `accessd`
//! itself only ships an in-memory test double (see `test_support`).

use async_trait::async_trait;
use thiserror::Error;

/// An access/component pair, as returned by the "accessible by" queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentAccess {
    pub application_component: String,
    pub access_level: String,
}

/// A failure from a single outbound call to a shard. Carries no shard
/// description of its own — the coordinator attaches that context when it
/// wraps the error (spec §7 `ShardCallFailure`).
#[derive(Debug, Error)]
pub enum ShardCallError {
    #[error("{0}")]
    Failed(String),
}

impl ShardCallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// The operation set a single shard exposes, scoped to its own hash range.
/// Every method is semantically equivalent to a single-shard access manager
/// query/mutation (spec §6).
#[async_trait]
pub trait ShardClient: Send + Sync {
    async fn add_user(&self, user: &str) -> Result<(), ShardCallError>;
    async fn remove_user(&self, user: &str) -> Result<(), ShardCallError>;
    async fn contains_user(&self, user: &str) -> Result<bool, ShardCallError>;
    async fn get_users(&self) -> Result<Vec<String>, ShardCallError>;

    async fn add_group(&self, group: &str) -> Result<(), ShardCallError>;
    async fn remove_group(&self, group: &str) -> Result<(), ShardCallError>;
    async fn contains_group(&self, group: &str) -> Result<bool, ShardCallError>;
    async fn get_groups(&self) -> Result<Vec<String>, ShardCallError>;

    async fn add_user_to_group_mapping(&self, user: &str, group: &str) -> Result<(), ShardCallError>;
    async fn get_user_to_group_mappings(&self, user: &str) -> Result<Vec<String>, ShardCallError>;

    async fn add_group_to_group_mapping(
        &self,
        from_group: &str,
        to_group: &str,
    ) -> Result<(), ShardCallError>;
    async fn get_group_to_group_mappings(&self, group: &str) -> Result<Vec<String>, ShardCallError>;

    async fn add_entity_type(&self, entity_type: &str) -> Result<(), ShardCallError>;
    async fn remove_entity_type(&self, entity_type: &str) -> Result<(), ShardCallError>;
    async fn get_entity_types(&self) -> Result<Vec<String>, ShardCallError>;

    async fn add_entity(&self, entity_type: &str, entity: &str) -> Result<(), ShardCallError>;
    async fn remove_entity(&self, entity_type: &str, entity: &str) -> Result<(), ShardCallError>;

    async fn add_user_to_application_component_and_access_level_mapping(
        &self,
        user: &str,
        application_component: &str,
        access_level: &str,
    ) -> Result<(), ShardCallError>;

    async fn add_group_to_application_component_and_access_level_mapping(
        &self,
        group: &str,
        application_component: &str,
        access_level: &str,
    ) -> Result<(), ShardCallError>;

    async fn add_user_to_entity_mapping(
        &self,
        user: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), ShardCallError>;

    async fn add_group_to_entity_mapping(
        &self,
        group: &str,
        entity_type: &str,
        entity: &str,
    ) -> Result<(), ShardCallError>;

    /// True if any of `groups` has access to `application_component`/`access_level`
    /// *on this shard*. The coordinator ORs this across every Group/Query shard.
    async fn group_set_has_access_to_application_component(
        &self,
        groups: &[String],
        application_component: &str,
        access_level: &str,
    ) -> Result<bool, ShardCallError>;

    async fn group_set_has_access_to_entity(
        &self,
        groups: &[String],
        entity_type: &str,
        entity: &str,
    ) -> Result<bool, ShardCallError>;

    async fn application_components_accessible_by_user(
        &self,
        user: &str,
    ) -> Result<Vec<ComponentAccess>, ShardCallError>;

    async fn application_components_accessible_by_group_set(
        &self,
        groups: &[String],
    ) -> Result<Vec<ComponentAccess>, ShardCallError>;
}

pub mod test_support {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// In-memory `ShardClient` double, for exercising coordinator routing
    /// logic without real network I/O. Also backs [`crate::client_factory::DemoClientFactory`]
    /// for the `accessd run` CLI command, since a real shard RPC client is
    /// out of scope for this crate (spec §1).
    #[derive(Default)]
    pub struct FakeShardClient {
        pub users: Mutex<HashSet<String>>,
        pub groups: Mutex<HashSet<String>>,
        pub fail_with: Mutex<Option<String>>,
    }

    impl FakeShardClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_users(users: impl IntoIterator<Item = &'static str>) -> Self {
            let client = Self::new();
            client
                .users
                .lock()
                .extend(users.into_iter().map(String::from));
            client
        }

        pub fn failing(message: impl Into<String>) -> Self {
            let client = Self::new();
            *client.fail_with.lock() = Some(message.into());
            client
        }

        fn check_failure(&self) -> Result<(), ShardCallError> {
            if let Some(message) = self.fail_with.lock().clone() {
                return Err(ShardCallError::new(message));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ShardClient for FakeShardClient {
        async fn add_user(&self, user: &str) -> Result<(), ShardCallError> {
            self.check_failure()?;
            self.users.lock().insert(user.to_string());
            Ok(())
        }

        async fn remove_user(&self, user: &str) -> Result<(), ShardCallError> {
            self.check_failure()?;
            self.users.lock().remove(user);
            Ok(())
        }

        async fn contains_user(&self, user: &str) -> Result<bool, ShardCallError> {
            self.check_failure()?;
            Ok(self.users.lock().contains(user))
        }

        async fn get_users(&self) -> Result<Vec<String>, ShardCallError> {
            self.check_failure()?;
            Ok(self.users.lock().iter().cloned().collect())
        }

        async fn add_group(&self, group: &str) -> Result<(), ShardCallError> {
            self.check_failure()?;
            self.groups.lock().insert(group.to_string());
            Ok(())
        }

        async fn remove_group(&self, group: &str) -> Result<(), ShardCallError> {
            self.check_failure()?;
            self.groups.lock().remove(group);
            Ok(())
        }

        async fn contains_group(&self, group: &str) -> Result<bool, ShardCallError> {
            self.check_failure()?;
            Ok(self.groups.lock().contains(group))
        }

        async fn get_groups(&self) -> Result<Vec<String>, ShardCallError> {
            self.check_failure()?;
            Ok(self.groups.lock().iter().cloned().collect())
        }

        async fn add_user_to_group_mapping(&self, _u: &str, _g: &str) -> Result<(), ShardCallError> {
            self.check_failure()
        }

        async fn get_user_to_group_mappings(&self, _u: &str) -> Result<Vec<String>, ShardCallError> {
            self.check_failure()?;
            Ok(Vec::new())
        }

        async fn add_group_to_group_mapping(&self, _f: &str, _t: &str) -> Result<(), ShardCallError> {
            self.check_failure()
        }

        async fn get_group_to_group_mappings(&self, _g: &str) -> Result<Vec<String>, ShardCallError> {
            self.check_failure()?;
            Ok(Vec::new())
        }

        async fn add_entity_type(&self, _t: &str) -> Result<(), ShardCallError> {
            self.check_failure()
        }

        async fn remove_entity_type(&self, _t: &str) -> Result<(), ShardCallError> {
            self.check_failure()
        }

        async fn get_entity_types(&self) -> Result<Vec<String>, ShardCallError> {
            self.check_failure()?;
            Ok(Vec::new())
        }

        async fn add_entity(&self, _t: &str, _e: &str) -> Result<(), ShardCallError> {
            self.check_failure()
        }

        async fn remove_entity(&self, _t: &str, _e: &str) -> Result<(), ShardCallError> {
            self.check_failure()
        }

        async fn add_user_to_application_component_and_access_level_mapping(
            &self,
            _u: &str,
            _c: &str,
            _a: &str,
        ) -> Result<(), ShardCallError> {
            self.check_failure()
        }

        async fn add_group_to_application_component_and_access_level_mapping(
            &self,
            _g: &str,
            _c: &str,
            _a: &str,
        ) -> Result<(), ShardCallError> {
            self.check_failure()
        }

        async fn add_user_to_entity_mapping(
            &self,
            _u: &str,
            _t: &str,
            _e: &str,
        ) -> Result<(), ShardCallError> {
            self.check_failure()
        }

        async fn add_group_to_entity_mapping(
            &self,
            _g: &str,
            _t: &str,
            _e: &str,
        ) -> Result<(), ShardCallError> {
            self.check_failure()
        }

        async fn group_set_has_access_to_application_component(
            &self,
            _groups: &[String],
            _c: &str,
            _a: &str,
        ) -> Result<bool, ShardCallError> {
            self.check_failure()?;
            Ok(false)
        }

        async fn group_set_has_access_to_entity(
            &self,
            _groups: &[String],
            _t: &str,
            _e: &str,
        ) -> Result<bool, ShardCallError> {
            self.check_failure()?;
            Ok(false)
        }

        async fn application_components_accessible_by_user(
            &self,
            _user: &str,
        ) -> Result<Vec<ComponentAccess>, ShardCallError> {
            self.check_failure()?;
            Ok(Vec::new())
        }

        async fn application_components_accessible_by_group_set(
            &self,
            _groups: &[String],
        ) -> Result<Vec<ComponentAccess>, ShardCallError> {
            self.check_failure()?;
            Ok(Vec::new())
        }
    }
}
