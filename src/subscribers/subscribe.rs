//! # Observer trait
//!
//! Observers see every lifecycle event of every group: `task.started`, the terminal
//! event of each task, and `task.badrequest`. Typical uses are audit logs, metrics,
//! and forwarding to an external broker.
//!
//! Each observer gets its own worker and bounded queue inside the
//! [`SubscriberSet`](crate::SubscriberSet); a slow observer only delays itself, and
//! once its queue is full further events for it are dropped with a warning.

use async_trait::async_trait;

use crate::events::TaskEvent;

/// Process-wide lifecycle observer.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Called once per published event, in publish order.
    async fn on_event(&self, event: &TaskEvent);

    /// Name used in overflow and panic warnings.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Events buffered for this observer before new ones are dropped.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
