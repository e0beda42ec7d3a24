//! Read-only access to conversation messages and their source documents.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::conversation::SourceChunk;

/// Upper bound on chunks pulled per query; the char budget usually stops first.
const CHUNK_FETCH_LIMIT: i64 = 200;

/// Separator between rendered chunks in assembled source text.
const CHUNK_SEPARATOR: &str = "\n\n";

/// Shuffle seeded by the conversation id (always bound as `$1`). The same
/// conversation assembles the same source text, so its transcript and media
/// fingerprints stay stable across requests.
const SEEDED_ORDER: &str = "ORDER BY md5(c.id::text || $1), c.id";

const CITED_CHUNKS_SQL: &str = "SELECT c.id, d.filename, c.content \
     FROM document_chunks c \
     JOIN source_documents d ON d.id = c.source_document_id \
     WHERE d.active \
       AND d.filename IN ( \
           SELECT mc.filename FROM message_citations mc \
           JOIN messages m ON m.id = mc.message_id \
           WHERE m.conversation_id = $1 \
       )";

const OTHER_CHUNKS_SQL: &str = "SELECT c.id, d.filename, c.content \
     FROM document_chunks c \
     JOIN source_documents d ON d.id = c.source_document_id \
     WHERE d.active AND NOT (c.id = ANY($2))";

/// Append the seeded order and a `LIMIT` bound at placeholder `limit_param`.
fn seeded(select: &str, limit_param: u8) -> String {
    format!("{select} {SEEDED_ORDER} LIMIT ${limit_param}")
}

pub struct ConversationRepo;

impl ConversationRepo {
    /// Text of `message_id` if it belongs to `conversation_id`.
    pub async fn find_message_text(
        pool: &PgPool,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            "SELECT content FROM messages WHERE id = $1 AND conversation_id = $2",
        )
        .bind(message_id)
        .bind(conversation_id)
        .fetch_optional(pool)
        .await
    }

    /// Chunks of active documents cited anywhere in the conversation, in the
    /// conversation's shuffled order.
    pub async fn cited_chunks(pool: &PgPool, conversation_id: &str) -> Result<Vec<SourceChunk>, sqlx::Error> {
        let sql = seeded(CITED_CHUNKS_SQL, 2);
        sqlx::query_as::<_, SourceChunk>(&sql)
            .bind(conversation_id)
            .bind(CHUNK_FETCH_LIMIT)
            .fetch_all(pool)
            .await
    }

    /// Chunks from any active document, skipping `exclude`, in the
    /// conversation's shuffled order.
    pub async fn other_chunks(
        pool: &PgPool,
        conversation_id: &str,
        exclude: &[Uuid],
    ) -> Result<Vec<SourceChunk>, sqlx::Error> {
        let sql = seeded(OTHER_CHUNKS_SQL, 3);
        sqlx::query_as::<_, SourceChunk>(&sql)
            .bind(conversation_id)
            .bind(exclude)
            .bind(CHUNK_FETCH_LIMIT)
            .fetch_all(pool)
            .await
    }

    /// Assemble source text for a conversation: cited chunks first, then
    /// chunks from other documents, until `char_budget` is reached.
    pub async fn assemble_source(
        pool: &PgPool,
        conversation_id: &str,
        char_budget: usize,
    ) -> Result<String, sqlx::Error> {
        let mut assembly = ChunkAssembly::new(char_budget);

        let cited = Self::cited_chunks(pool, conversation_id).await?;
        assembly.extend(&cited);
        tracing::debug!(
            conversation_id,
            cited_chunks = assembly.len(),
            chars = assembly.chars(),
            "Collected cited chunks"
        );

        if !assembly.is_full() {
            let exclude: Vec<Uuid> = cited.iter().map(|c| c.id).collect();
            let others = Self::other_chunks(pool, conversation_id, &exclude).await?;
            assembly.extend(&others);
            tracing::debug!(
                conversation_id,
                total_chunks = assembly.len(),
                chars = assembly.chars(),
                "Added chunks from other documents"
            );
        }

        Ok(assembly.finish())
    }
}

/// Accumulates rendered chunks up to a character budget.
///
/// A chunk that would overflow the budget ends the current pass, so the
/// result never exceeds `budget` characters.
#[derive(Debug)]
pub struct ChunkAssembly {
    budget: usize,
    used: usize,
    full: bool,
    parts: Vec<String>,
}

impl ChunkAssembly {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            used: 0,
            full: budget == 0,
            parts: Vec::new(),
        }
    }

    pub fn extend(&mut self, chunks: &[SourceChunk]) {
        for chunk in chunks {
            if self.full {
                return;
            }
            let rendered = chunk.render();
            let sep = if self.parts.is_empty() { 0 } else { CHUNK_SEPARATOR.len() };
            let cost = rendered.chars().count() + sep;
            if self.used + cost > self.budget {
                self.full = true;
                return;
            }
            self.used += cost;
            self.parts.push(rendered);
        }
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn chars(&self) -> usize {
        self.used
    }

    pub fn finish(self) -> String {
        self.parts.join(CHUNK_SEPARATOR)
    }
}
