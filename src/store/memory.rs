// src/store/memory.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{ResourceKey, ResourceStore, StatusPatch, StoreError};
use crate::operation::OperationRecord;

/// In-process resource store. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: Arc<Mutex<HashMap<ResourceKey, OperationRecord>>>,
    patches: Arc<AtomicUsize>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `patch` calls so far.
    pub fn patch_count(&self) -> usize {
        self.patches.load(Ordering::SeqCst)
    }

    /// Overwrite a record directly, bypassing patch semantics.
    pub async fn insert(&self, key: ResourceKey, record: OperationRecord) {
        self.records.lock().await.insert(key, record);
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get(&self, key: &ResourceKey) -> Result<OperationRecord, StoreError> {
        self.records
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn patch(
        &self,
        key: &ResourceKey,
        patch: StatusPatch,
    ) -> Result<OperationRecord, StoreError> {
        let mut records = self.records.lock().await;

        let record = match records.get_mut(key) {
            Some(existing) if existing.id == patch.id => {
                patch.apply_to(existing);
                existing.clone()
            }
            _ => {
                let fresh = patch.into_record(key)?;
                debug!(key = %key, operation_id = %fresh.id, "starting fresh record");
                records.insert(key.clone(), fresh.clone());
                fresh
            }
        };

        self.patches.fetch_add(1, Ordering::SeqCst);
        Ok(record)
    }
}
