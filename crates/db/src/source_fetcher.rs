//! [`SourceFetcher`] reading conversation content from Postgres.

use async_trait::async_trait;
use reverie_core::generation::SourceContent;
use reverie_core::providers::{ProviderError, SourceFetcher};

use crate::repositories::ConversationRepo;
use crate::DbPool;

#[derive(Clone)]
pub struct PgSourceFetcher {
    pool: DbPool,
    char_budget: usize,
}

impl PgSourceFetcher {
    pub fn new(pool: DbPool, char_budget: usize) -> Self {
        Self { pool, char_budget }
    }
}

#[async_trait]
impl SourceFetcher for PgSourceFetcher {
    async fn fetch_source(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<SourceContent, ProviderError> {
        let request_err = |e: sqlx::Error| ProviderError::Request(e.to_string());

        let message_text = ConversationRepo::find_message_text(&self.pool, conversation_id, message_id)
            .await
            .map_err(request_err)?
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "message {message_id} in conversation {conversation_id}"
                ))
            })?;

        let text = ConversationRepo::assemble_source(&self.pool, conversation_id, self.char_budget)
            .await
            .map_err(request_err)?;

        Ok(SourceContent {
            text,
            message_text: Some(message_text),
        }
        .bounded(self.char_budget))
    }
}
