//! # Per-group event broadcasting.
//!
//! [`Broadcast`] is the capability the runner publishes through; [`GroupBus`] is the
//! in-process implementation: one [`tokio::sync::broadcast`] channel per
//! [`SubscriberGroup`], created on first subscribe.
//!
//! ## Architecture
//! ```text
//! Dispatcher ──publish(group, ev)──► GroupBus ──► [chan "alice"] ──► Subscription 1
//!                                        │                      └──► Subscription 2
//!                                        └──────► [chan "bob"]   ──► Subscription 3
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits on receivers.
//! - **No subscribers, no-op**: publishing to a group nobody listens to drops the
//!   event (the cache keeps it for replay).
//! - **Per-group order**: each subscription observes its group's events in publish order.
//! - **Lag handling**: a subscription that falls more than `capacity` events behind
//!   skips the oldest ones and logs a warning.
//! - **Unsubscribe on drop**: dropping a [`Subscription`] detaches it; channels left
//!   without receivers are pruned on the next publish.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};

use super::event::{SubscriberGroup, TaskEvent};

/// Fire-and-forget fan-out of events to every current listener of a group.
///
/// Implementations must tolerate concurrent `publish` calls and keep per-group
/// publish order.
#[async_trait]
pub trait Broadcast: Send + Sync + 'static {
    /// Delivers `event` to all current subscribers of `group`.
    async fn publish(&self, group: &SubscriberGroup, event: Arc<TaskEvent>);
}

/// In-process broadcaster with one bounded channel per subscriber group.
pub struct GroupBus {
    capacity: usize,
    groups: RwLock<HashMap<SubscriberGroup, broadcast::Sender<Arc<TaskEvent>>>>,
}

impl GroupBus {
    /// Creates a bus whose per-group channels hold `capacity` events (min 1; clamped).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            groups: RwLock::new(HashMap::new()),
        }
    }

    /// Opens a live subscription to `group`.
    ///
    /// The subscription only observes events published after this call.
    pub async fn subscribe(&self, group: &SubscriberGroup) -> Subscription {
        let mut groups = self.groups.write().await;
        let rx = match groups.get(group) {
            Some(tx) => tx.subscribe(),
            None => {
                let (tx, rx) = broadcast::channel(self.capacity);
                groups.insert(group.clone(), tx);
                rx
            }
        };
        tracing::debug!(group = %group, "subscribed");
        Subscription {
            group: group.clone(),
            rx,
        }
    }

    /// Number of live subscriptions for `group`.
    pub async fn receiver_count(&self, group: &SubscriberGroup) -> usize {
        self.groups
            .read()
            .await
            .get(group)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Number of groups with an open channel.
    pub async fn group_count(&self) -> usize {
        self.groups.read().await.len()
    }
}

#[async_trait]
impl Broadcast for GroupBus {
    async fn publish(&self, group: &SubscriberGroup, event: Arc<TaskEvent>) {
        let delivered = {
            let groups = self.groups.read().await;
            match groups.get(group) {
                Some(tx) => tx.send(event).is_ok(),
                None => return,
            }
        };
        if !delivered {
            let mut groups = self.groups.write().await;
            if groups.get(group).is_some_and(|tx| tx.receiver_count() == 0) {
                groups.remove(group);
                tracing::debug!(group = %group, "pruned group without subscribers");
            }
        }
    }
}

/// Live stream of one group's events. Dropping it unsubscribes.
pub struct Subscription {
    group: SubscriberGroup,
    rx: broadcast::Receiver<Arc<TaskEvent>>,
}

impl Subscription {
    pub fn group(&self) -> &SubscriberGroup {
        &self.group
    }

    /// Waits for the next event. Returns `None` once the group channel is closed.
    pub async fn recv(&mut self) -> Option<Arc<TaskEvent>> {
        loop {
            match self.rx.recv().await {
                Ok(ev) => return Some(ev),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(group = %self.group, skipped, "subscription lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<TaskEvent>> {
        loop {
            match self.rx.try_recv() {
                Ok(ev) => return Some(ev),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(group = %self.group, skipped, "subscription lagged");
                }
                Err(_) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TaskHandle, TaskId};

    fn event(id: &str) -> Arc<TaskEvent> {
        Arc::new(TaskEvent::for_handle(&TaskHandle::started(
            TaskId::new(id),
            "app.job",
        )))
    }

    #[tokio::test]
    async fn delivers_in_order_to_group_only() {
        let bus = GroupBus::new(16);
        let alice = SubscriberGroup::new("alice");
        let bob = SubscriberGroup::new("bob");
        let mut a1 = bus.subscribe(&alice).await;
        let mut a2 = bus.subscribe(&alice).await;
        let mut b = bus.subscribe(&bob).await;

        for id in ["1", "2", "3"] {
            bus.publish(&alice, event(id)).await;
        }

        for sub in [&mut a1, &mut a2] {
            let ids: Vec<_> = (0..3)
                .map(|_| sub.try_recv().unwrap().task_id.to_string())
                .collect();
            assert_eq!(ids, ["1", "2", "3"]);
        }
        assert!(b.try_recv().is_none());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop_and_prunes() {
        let bus = GroupBus::new(4);
        let group = SubscriberGroup::new("gone");
        bus.publish(&group, event("x")).await;
        assert_eq!(bus.group_count().await, 0);

        let sub = bus.subscribe(&group).await;
        assert_eq!(bus.receiver_count(&group).await, 1);
        drop(sub);

        bus.publish(&group, event("y")).await;
        assert_eq!(bus.group_count().await, 0);
    }

    #[tokio::test]
    async fn lagging_subscription_skips_oldest() {
        let bus = GroupBus::new(2);
        let group = SubscriberGroup::default();
        let mut sub = bus.subscribe(&group).await;

        for id in ["1", "2", "3", "4"] {
            bus.publish(&group, event(id)).await;
        }

        assert_eq!(sub.recv().await.unwrap().task_id.as_str(), "3");
        assert_eq!(sub.recv().await.unwrap().task_id.as_str(), "4");
    }
}
