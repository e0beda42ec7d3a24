//! Status store: durable `id -> GenerationRecord` map read by pollers.
//!
//! Every write is a conditional state-machine transition and returns whether
//! it applied, so a late writer can never overwrite a terminal record.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::generation::GenerationRecord;
use crate::types::{GenerationId, Timestamp};

/// Errors from a status store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("status store backend error: {0}")]
    Backend(String),

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::Internal(err.to_string())
    }
}

#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Persist a freshly created `pending` record.
    async fn insert(&self, record: &GenerationRecord) -> Result<(), StoreError>;

    async fn get(&self, id: GenerationId) -> Result<Option<GenerationRecord>, StoreError>;

    /// `pending -> processing`.
    async fn mark_processing(&self, id: GenerationId) -> Result<bool, StoreError>;

    /// `processing -> complete` with the artifact URL.
    async fn mark_complete(
        &self,
        id: GenerationId,
        content_url: &str,
        transcript: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Any non-terminal status `-> failed` with a human-readable reason.
    async fn mark_failed(&self, id: GenerationId, error: &str) -> Result<bool, StoreError>;

    /// Fail every non-terminal record created before `cutoff`. Returns the count.
    async fn fail_stale(&self, cutoff: Timestamp, error: &str) -> Result<u64, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// In-process status store. Records do not survive a restart.
#[derive(Default)]
pub struct MemoryStatusStore {
    records: RwLock<HashMap<GenerationId, GenerationRecord>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Apply `f` to the record if it exists and `f` reports a successful transition.
    async fn update<F>(&self, id: GenerationId, f: F) -> bool
    where
        F: FnOnce(&mut GenerationRecord) -> bool,
    {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(record) => f(record),
            None => false,
        }
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn insert(&self, record: &GenerationRecord) -> Result<(), StoreError> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: GenerationId) -> Result<Option<GenerationRecord>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn mark_processing(&self, id: GenerationId) -> Result<bool, StoreError> {
        Ok(self.update(id, |r| r.start_processing().is_ok()).await)
    }

    async fn mark_complete(
        &self,
        id: GenerationId,
        content_url: &str,
        transcript: Option<&str>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .update(id, |r| {
                r.complete(content_url.to_string(), transcript.map(str::to_string))
                    .is_ok()
            })
            .await)
    }

    async fn mark_failed(&self, id: GenerationId, error: &str) -> Result<bool, StoreError> {
        Ok(self.update(id, |r| r.fail(error.to_string()).is_ok()).await)
    }

    async fn fail_stale(&self, cutoff: Timestamp, error: &str) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let mut failed = 0;
        for record in records.values_mut() {
            if !record.status.is_terminal()
                && record.created_at < cutoff
                && record.fail(error.to_string()).is_ok()
            {
                failed += 1;
            }
        }
        Ok(failed)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Whether a non-terminal record was created before `cutoff`.
pub fn is_stale(record: &GenerationRecord, cutoff: Timestamp) -> bool {
    !record.status.is_terminal() && record.created_at < cutoff
}
