//! Read models for conversation content.

use sqlx::FromRow;
use uuid::Uuid;

/// One document chunk joined with its document's filename.
#[derive(Debug, Clone, FromRow)]
pub struct SourceChunk {
    pub id: Uuid,
    pub filename: String,
    pub content: String,
}

impl SourceChunk {
    /// The chunk as it appears in assembled source text.
    pub fn render(&self) -> String {
        format!("From {}:\n{}", self.filename, self.content)
    }
}
