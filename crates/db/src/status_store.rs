//! [`StatusStore`] backed by the `generations` table.

use async_trait::async_trait;
use reverie_core::generation::GenerationRecord;
use reverie_core::store::{StatusStore, StoreError};
use reverie_core::types::{GenerationId, Timestamp};

use crate::repositories::GenerationRepo;
use crate::DbPool;

#[derive(Clone)]
pub struct PgStatusStore {
    pool: DbPool,
}

impl PgStatusStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl StatusStore for PgStatusStore {
    async fn insert(&self, record: &GenerationRecord) -> Result<(), StoreError> {
        GenerationRepo::insert(&self.pool, record)
            .await
            .map_err(backend)?;
        Ok(())
    }

    async fn get(&self, id: GenerationId) -> Result<Option<GenerationRecord>, StoreError> {
        GenerationRepo::find_by_id(&self.pool, id)
            .await
            .map_err(backend)?
            .map(GenerationRecord::try_from)
            .transpose()
    }

    async fn mark_processing(&self, id: GenerationId) -> Result<bool, StoreError> {
        GenerationRepo::mark_processing(&self.pool, id)
            .await
            .map_err(backend)
    }

    async fn mark_complete(
        &self,
        id: GenerationId,
        content_url: &str,
        transcript: Option<&str>,
    ) -> Result<bool, StoreError> {
        GenerationRepo::mark_complete(&self.pool, id, content_url, transcript)
            .await
            .map_err(backend)
    }

    async fn mark_failed(&self, id: GenerationId, error: &str) -> Result<bool, StoreError> {
        GenerationRepo::mark_failed(&self.pool, id, error)
            .await
            .map_err(backend)
    }

    async fn fail_stale(&self, cutoff: Timestamp, error: &str) -> Result<u64, StoreError> {
        GenerationRepo::fail_stale(&self.pool, cutoff, error)
            .await
            .map_err(backend)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await.map_err(backend)
    }
}
