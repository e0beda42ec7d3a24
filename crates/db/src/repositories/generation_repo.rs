//! Repository for the `generations` table.
//!
//! Every status write is conditional on the current status, so a row that
//! reached `complete` or `failed` is never modified again.

use reverie_core::generation::{GenerationRecord, GenerationStatus};
use reverie_core::types::{GenerationId, Timestamp};
use sqlx::PgPool;

use crate::models::generation::GenerationRow;

/// Column list for `generations` queries.
const COLUMNS: &str = "\
    id, conversation_id, message_id, status_id, content_type, \
    content_url, error, transcript, created_at, updated_at, completed_at";

/// Provides status-machine writes for generation records.
pub struct GenerationRepo;

impl GenerationRepo {
    /// Insert a freshly created `pending` record.
    pub async fn insert(pool: &PgPool, record: &GenerationRecord) -> Result<GenerationRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO generations \
                (id, conversation_id, message_id, status_id, content_type, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, GenerationRow>(&query)
            .bind(record.id)
            .bind(&record.conversation_id)
            .bind(&record.message_id)
            .bind(record.status.id())
            .bind(record.content_type.as_str())
            .bind(record.created_at)
            .bind(record.updated_at)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: GenerationId) -> Result<Option<GenerationRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM generations WHERE id = $1");
        sqlx::query_as::<_, GenerationRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// `pending -> processing`. Returns `false` if the row was not pending.
    pub async fn mark_processing(pool: &PgPool, id: GenerationId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(GenerationStatus::Processing.id())
        .bind(GenerationStatus::Pending.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `processing -> complete`. Returns `false` if the row was not processing.
    pub async fn mark_complete(
        pool: &PgPool,
        id: GenerationId,
        content_url: &str,
        transcript: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2, content_url = $3, transcript = $4, \
                 updated_at = NOW(), completed_at = NOW() \
             WHERE id = $1 AND status_id = $5",
        )
        .bind(id)
        .bind(GenerationStatus::Complete.id())
        .bind(content_url)
        .bind(transcript)
        .bind(GenerationStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Any non-terminal status `-> failed`. Returns `false` if already terminal.
    pub async fn mark_failed(pool: &PgPool, id: GenerationId, error: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $2, error = $3, updated_at = NOW(), completed_at = NOW() \
             WHERE id = $1 AND status_id IN ($4, $5)",
        )
        .bind(id)
        .bind(GenerationStatus::Failed.id())
        .bind(error)
        .bind(GenerationStatus::Pending.id())
        .bind(GenerationStatus::Processing.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fail every non-terminal row created before `cutoff`.
    pub async fn fail_stale(pool: &PgPool, cutoff: Timestamp, error: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE generations \
             SET status_id = $1, error = $2, updated_at = NOW(), completed_at = NOW() \
             WHERE status_id IN ($3, $4) AND created_at < $5",
        )
        .bind(GenerationStatus::Failed.id())
        .bind(error)
        .bind(GenerationStatus::Pending.id())
        .bind(GenerationStatus::Processing.id())
        .bind(cutoff)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
