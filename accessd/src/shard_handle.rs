//! A live `ShardClient` paired with the human-readable description it was
//! configured with, so the coordinator can attach "shard with configuration
//! 'D'" to every wrapped error (spec §4.4 "Error translation").

use std::ops::Deref;
use std::sync::Arc;

use accessd_config::ShardDescription;

use crate::shard_client::ShardClient;

pub struct ShardHandle {
    pub description: ShardDescription,
    pub client: Arc<dyn ShardClient>,
}

impl ShardHandle {
    pub fn new(description: ShardDescription, client: Arc<dyn ShardClient>) -> Arc<Self> {
        Arc::new(Self { description, client })
    }
}

impl Deref for ShardHandle {
    type Target = dyn ShardClient;

    fn deref(&self) -> &Self::Target {
        self.client.as_ref()
    }
}
