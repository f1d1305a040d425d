//! Bounded replay cache of lifecycle events, keyed by subscriber group.
//!
//! The runner puts every published event here so reconnecting clients can replay
//! what they missed; clients acknowledge events with [`EventCache::clear`].
//! The cache is best-effort: failures are logged by the runner and never block
//! live delivery.

mod memory;

pub use memory::MemoryCache;

use async_trait::async_trait;

use crate::core::TaskId;
use crate::error::CacheError;
use crate::events::{SubscriberGroup, TaskEvent};

/// Storage capability for cached events.
#[async_trait]
pub trait EventCache: Send + Sync + 'static {
    /// Appends `event` to the group's cache and returns its insertion key.
    ///
    /// Keys are string-sortable and strictly increasing per group.
    async fn put(&self, group: &SubscriberGroup, event: &TaskEvent) -> Result<String, CacheError>;

    /// Cached events for `group` as `(key, event)` pairs in arrival order.
    async fn get(&self, group: &SubscriberGroup) -> Result<Vec<(String, TaskEvent)>, CacheError>;

    /// Removes every cached event of `task_id` from the group and returns how many
    /// were removed. Clearing an unknown id removes nothing.
    async fn clear(&self, group: &SubscriberGroup, task_id: &TaskId) -> Result<usize, CacheError>;
}
