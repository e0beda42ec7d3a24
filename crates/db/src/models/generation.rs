//! Row model for the `generations` table.

use reverie_core::generation::{ContentMode, GenerationRecord, GenerationStatus};
use reverie_core::store::StoreError;
use reverie_core::types::{GenerationId, Timestamp};
use sqlx::FromRow;

/// A row from the `generations` table.
#[derive(Debug, Clone, FromRow)]
pub struct GenerationRow {
    pub id: GenerationId,
    pub conversation_id: String,
    pub message_id: String,
    pub status_id: i16,
    pub content_type: String,
    pub content_url: Option<String>,
    pub error: Option<String>,
    pub transcript: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl TryFrom<GenerationRow> for GenerationRecord {
    type Error = StoreError;

    fn try_from(row: GenerationRow) -> Result<Self, Self::Error> {
        let status = GenerationStatus::from_id(row.status_id).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "generation {} has unknown status_id {}",
                row.id, row.status_id
            ))
        })?;
        let content_type = row.content_type.parse::<ContentMode>().map_err(|_| {
            StoreError::Corrupt(format!(
                "generation {} has unknown content_type '{}'",
                row.id, row.content_type
            ))
        })?;
        Ok(GenerationRecord {
            id: row.id,
            conversation_id: row.conversation_id,
            message_id: row.message_id,
            status,
            content_type,
            content_url: row.content_url,
            error: row.error,
            transcript: row.transcript,
            created_at: row.created_at,
            updated_at: row.updated_at,
            completed_at: row.completed_at,
        })
    }
}
