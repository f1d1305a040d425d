//! # In-memory event cache.
//!
//! Per group, an ordered map from insertion key to event:
//! ```text
//! "alice" ─► { "00001700000000000001": started(a),
//!              "00001700000000000002": started(b),
//!              "00001700000000120007": success(a) }
//! ```
//! Keys are the wall clock in microseconds, zero-padded to 20 digits and bumped past
//! the group's previous key on ties, so lexical order equals arrival order.
//!
//! Bounds: at most `capacity` entries per group (oldest evicted first) and, when a
//! TTL is set, entries older than the TTL are purged on every access.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::EventCache;
use crate::config::Config;
use crate::core::TaskId;
use crate::error::CacheError;
use crate::events::{SubscriberGroup, TaskEvent};

struct Entry {
    inserted: Instant,
    event: TaskEvent,
}

#[derive(Default)]
struct GroupCache {
    entries: BTreeMap<String, Entry>,
    last_stamp: i64,
}

impl GroupCache {
    fn next_key(&mut self) -> String {
        let stamp = Utc::now().timestamp_micros().max(self.last_stamp + 1);
        self.last_stamp = stamp;
        format!("{stamp:020}")
    }

    fn purge_expired(&mut self, ttl: Option<Duration>, now: Instant) {
        if let Some(ttl) = ttl {
            self.entries
                .retain(|_, entry| now.saturating_duration_since(entry.inserted) < ttl);
        }
    }

    fn evict_over(&mut self, capacity: usize) {
        while self.entries.len() > capacity {
            if self.entries.pop_first().is_none() {
                break;
            }
        }
    }
}

/// Bounded in-process [`EventCache`].
pub struct MemoryCache {
    capacity: usize,
    ttl: Option<Duration>,
    groups: RwLock<HashMap<SubscriberGroup, GroupCache>>,
}

impl MemoryCache {
    /// `capacity` is clamped to at least 1; `ttl = None` disables expiry.
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            groups: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.cache_capacity_clamped(), cfg.cache_ttl())
    }

    /// Number of cached events for `group` (expired entries excluded).
    pub async fn len(&self, group: &SubscriberGroup) -> usize {
        let now = Instant::now();
        let groups = self.groups.read().await;
        groups.get(group).map_or(0, |cache| {
            cache
                .entries
                .values()
                .filter(|e| self.ttl.is_none_or(|ttl| now.saturating_duration_since(e.inserted) < ttl))
                .count()
        })
    }
}

#[async_trait]
impl EventCache for MemoryCache {
    async fn put(&self, group: &SubscriberGroup, event: &TaskEvent) -> Result<String, CacheError> {
        let now = Instant::now();
        let mut groups = self.groups.write().await;
        let cache = groups.entry(group.clone()).or_default();
        cache.purge_expired(self.ttl, now);

        let key = cache.next_key();
        cache.entries.insert(
            key.clone(),
            Entry {
                inserted: now,
                event: event.clone(),
            },
        );
        cache.evict_over(self.capacity);
        Ok(key)
    }

    async fn get(&self, group: &SubscriberGroup) -> Result<Vec<(String, TaskEvent)>, CacheError> {
        let now = Instant::now();
        let mut groups = self.groups.write().await;
        let Some(cache) = groups.get_mut(group) else {
            return Ok(Vec::new());
        };
        cache.purge_expired(self.ttl, now);
        Ok(cache
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.event.clone()))
            .collect())
    }

    async fn clear(&self, group: &SubscriberGroup, task_id: &TaskId) -> Result<usize, CacheError> {
        let mut groups = self.groups.write().await;
        let Some(cache) = groups.get_mut(group) else {
            return Ok(0);
        };
        let before = cache.entries.len();
        cache.entries.retain(|_, entry| &entry.event.task_id != task_id);
        let removed = before - cache.entries.len();
        if cache.entries.is_empty() {
            groups.remove(group);
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskHandle;

    fn started(id: &str) -> TaskEvent {
        TaskEvent::for_handle(&TaskHandle::started(TaskId::new(id), "app.job"))
    }

    #[tokio::test]
    async fn keys_are_strictly_increasing() {
        let cache = MemoryCache::new(16, None);
        let group = SubscriberGroup::new("alice");

        let mut keys = Vec::new();
        for i in 0..10 {
            keys.push(cache.put(&group, &started(&i.to_string())).await.unwrap());
        }

        assert!(keys.windows(2).all(|w| w[0] < w[1]));
        assert!(keys.iter().all(|k| k.len() == 20));
    }

    #[tokio::test]
    async fn capacity_evicts_oldest_first() {
        let cache = MemoryCache::new(3, None);
        let group = SubscriberGroup::new("alice");
        for id in ["1", "2", "3", "4", "5"] {
            cache.put(&group, &started(id)).await.unwrap();
        }

        let ids: Vec<_> = cache
            .get(&group)
            .await
            .unwrap()
            .into_iter()
            .map(|(_, ev)| ev.task_id.to_string())
            .collect();
        assert_eq!(ids, ["3", "4", "5"]);
    }

    #[tokio::test]
    async fn clear_removes_only_matching_task_and_is_idempotent() {
        let cache = MemoryCache::new(16, None);
        let alice = SubscriberGroup::new("alice");
        let bob = SubscriberGroup::new("bob");
        let a = TaskHandle::started(TaskId::new("a"), "app.job");

        cache.put(&alice, &TaskEvent::for_handle(&a)).await.unwrap();
        cache.put(&alice, &started("b")).await.unwrap();
        cache.put(&alice, &TaskEvent::for_handle(&a)).await.unwrap();
        cache.put(&bob, &TaskEvent::for_handle(&a)).await.unwrap();

        let id = TaskId::new("a");
        assert_eq!(cache.clear(&alice, &id).await.unwrap(), 2);
        assert_eq!(cache.clear(&alice, &id).await.unwrap(), 0);
        assert_eq!(cache.clear(&SubscriberGroup::new("nobody"), &id).await.unwrap(), 0);

        let left = cache.get(&alice).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].1.task_id.as_str(), "b");
        assert_eq!(cache.len(&bob).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_purged() {
        let cache = MemoryCache::new(16, Some(Duration::from_secs(60)));
        let group = SubscriberGroup::default();
        cache.put(&group, &started("old")).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.put(&group, &started("new")).await.unwrap();

        let events = cache.get(&group).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].1.task_id.as_str(), "new");
    }
}
