//! Request intake, polling reads and stale-record reconciliation.

use std::sync::Arc;

use chrono::Utc;
use reverie_core::error::CoreError;
use reverie_core::generation::{CreateGeneration, GenerationRecord, GenerationRequest};
use reverie_core::store::{is_stale, StatusStore, StoreError};
use reverie_core::types::{GenerationId, Timestamp};

use crate::config::PipelineConfig;
use crate::orchestrator::{Collaborators, GenerationOrchestrator};

/// Reason written to records abandoned by a crash or restart.
pub const STALE_ERROR: &str = "Generation did not finish in time and was abandoned";

/// Entry point used by the HTTP layer.
#[derive(Clone)]
pub struct GenerationService {
    orchestrator: Arc<GenerationOrchestrator>,
    store: Arc<dyn StatusStore>,
}

impl GenerationService {
    pub fn new(config: PipelineConfig, collaborators: Collaborators, store: Arc<dyn StatusStore>) -> Self {
        let orchestrator = Arc::new(GenerationOrchestrator::new(
            config,
            collaborators,
            Arc::clone(&store),
        ));
        Self { orchestrator, store }
    }

    pub fn config(&self) -> &PipelineConfig {
        self.orchestrator.config()
    }

    /// Validate `input`, persist a `pending` record and start its run in the
    /// background. Returns as soon as the record exists.
    pub async fn create(&self, input: CreateGeneration) -> Result<GenerationRecord, CoreError> {
        let request = GenerationRequest::try_from(input)?;
        let record = GenerationRecord::pending(&request);
        self.store.insert(&record).await?;

        tracing::info!(
            id = %record.id,
            mode = %request.mode,
            conversation_id = %request.conversation_id,
            message_id = %request.message_id,
            "Generation accepted"
        );

        let orchestrator = Arc::clone(&self.orchestrator);
        let id = record.id;
        tokio::spawn(async move {
            orchestrator.run(id, request).await;
        });

        Ok(record)
    }

    /// Current state of record `id`.
    ///
    /// A non-terminal record older than the stale cutoff is failed on read,
    /// so a poller never waits forever on a run lost to a restart.
    pub async fn get(&self, id: GenerationId) -> Result<GenerationRecord, CoreError> {
        let record = self.find(id).await?;
        if !is_stale(&record, self.stale_cutoff()) {
            return Ok(record);
        }

        if self.store.mark_failed(id, STALE_ERROR).await? {
            tracing::warn!(%id, "Failed stale generation on read");
        }
        self.find(id).await
    }

    /// Fail every abandoned record. Returns how many were failed.
    pub async fn reconcile_stale(&self) -> Result<u64, StoreError> {
        let failed = self.store.fail_stale(self.stale_cutoff(), STALE_ERROR).await?;
        if failed > 0 {
            tracing::warn!(failed, "Failed stale generations");
        }
        Ok(failed)
    }

    pub fn purge_caches(&self) -> usize {
        self.orchestrator.purge_caches()
    }

    pub async fn store_healthy(&self) -> bool {
        self.store.health_check().await.is_ok()
    }

    fn stale_cutoff(&self) -> Timestamp {
        let age = chrono::Duration::from_std(self.config().stale_after())
            .unwrap_or_else(|_| chrono::Duration::days(1));
        Utc::now() - age
    }

    async fn find(&self, id: GenerationId) -> Result<GenerationRecord, CoreError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| CoreError::NotFound {
                entity: "Generation",
                id: id.to_string(),
            })
    }
}
