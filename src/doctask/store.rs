//! Completion-record storage.
//!
//! [`DocTaskStore`] is the narrow contract the scheduler needs from persistence;
//! [`MemoryStore`] is the in-process implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::tasks::Inputs;

pub type RecordId = u64;

/// Durable row correlating a scheduled task with its stored result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub id: RecordId,
    /// Registered task name.
    pub name: String,
    pub inputs: Inputs,
    pub scheduled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Terminal event content; `None` while the task runs.
    pub document: Option<Value>,
}

impl CompletionRecord {
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }
}

#[async_trait]
pub trait DocTaskStore: Send + Sync + 'static {
    /// Creates a running record and returns its id.
    async fn create(&self, name: &str, inputs: &Inputs) -> Result<RecordId, StoreError>;

    /// Writes the terminal document and completion time.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the record was deleted.
    async fn mark_complete(&self, id: RecordId, document: Value) -> Result<(), StoreError>;

    async fn get(&self, id: RecordId) -> Result<Option<CompletionRecord>, StoreError>;

    /// Returns `true` if a record was removed.
    async fn delete(&self, id: RecordId) -> Result<bool, StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

/// In-memory [`DocTaskStore`]. Ids start at 1.
#[derive(Debug)]
pub struct MemoryStore {
    records: RwLock<HashMap<RecordId, CompletionRecord>>,
    next_id: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All records, ordered by id.
    pub async fn records(&self) -> Vec<CompletionRecord> {
        let mut records: Vec<_> = self.records.read().await.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        records
    }
}

#[async_trait]
impl DocTaskStore for MemoryStore {
    async fn create(&self, name: &str, inputs: &Inputs) -> Result<RecordId, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = CompletionRecord {
            id,
            name: name.to_string(),
            inputs: inputs.clone(),
            scheduled_at: Utc::now(),
            completed_at: None,
            document: None,
        };
        self.records.write().await.insert(id, record);
        Ok(id)
    }

    async fn mark_complete(&self, id: RecordId, document: Value) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(StoreError::NotFound { id })?;
        record.document = Some(document);
        record.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn get(&self, id: RecordId) -> Result<Option<CompletionRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: RecordId) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn record_lifecycle() {
        let store = MemoryStore::new();
        let id = store.create("app.job", &Inputs::new()).await.unwrap();
        assert_eq!(id, 1);
        assert!(!store.get(id).await.unwrap().unwrap().is_complete());

        store.mark_complete(id, json!({"status": "Success"})).await.unwrap();
        let record = store.get(id).await.unwrap().unwrap();
        assert!(record.is_complete());
        assert_eq!(record.document, Some(json!({"status": "Success"})));

        assert!(store.delete(id).await.unwrap());
        assert!(!store.delete(id).await.unwrap());
        assert_eq!(
            store.mark_complete(id, Value::Null).await,
            Err(StoreError::NotFound { id })
        );
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
