//! Generation request/record domain model and its status state machine.
//!
//! A [`GenerationRecord`] moves `pending -> processing -> complete | failed`.
//! `complete` and `failed` are terminal: every transition helper here refuses
//! to leave them, and at a terminal state exactly one of `content_url` /
//! `error` is populated.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::types::{GenerationId, Timestamp};

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Shortest narration a request may ask for.
pub const MIN_TARGET_MINUTES: u32 = 1;
/// Longest narration a request may ask for.
pub const MAX_TARGET_MINUTES: u32 = 30;

// ---------------------------------------------------------------------------
// Content mode
// ---------------------------------------------------------------------------

/// The kind of artifact a request produces. Fixed for the request's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentMode {
    Audio,
    Video,
    Image,
}

impl ContentMode {
    pub const ALL: [ContentMode; 3] = [ContentMode::Audio, ContentMode::Video, ContentMode::Image];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Image => "image",
        }
    }

    /// MIME type of the uploaded artifact.
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Audio => "audio/mpeg",
            Self::Video => "video/mp4",
            Self::Image => "image/png",
        }
    }

    /// Object key for the uploaded artifact of record `id`.
    pub fn object_key(self, id: GenerationId) -> String {
        let (prefix, ext) = match self {
            Self::Audio => ("meditation-audio", "mp3"),
            Self::Video => ("meditation-videos", "mp4"),
            Self::Image => ("contemplation-cards", "png"),
        };
        format!("{prefix}/{id}.{ext}")
    }

    /// Whether this mode needs narration audio (and therefore speech synthesis).
    pub fn needs_audio(self) -> bool {
        !matches!(self, Self::Image)
    }
}

impl fmt::Display for ContentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentMode::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid content type '{s}'. Must be 'audio', 'video', or 'image'"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Generation lifecycle status. Discriminants match the seed order of the
/// `generation_statuses` lookup table.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending = 1,
    Processing = 2,
    Complete = 3,
    Failed = 4,
}

impl GenerationStatus {
    /// Database status ID.
    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            1 => Some(Self::Pending),
            2 => Some(Self::Processing),
            3 => Some(Self::Complete),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: GenerationStatus) -> bool {
        use GenerationStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Failed) | (Processing, Complete) | (Processing, Failed)
        )
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Body of `POST /api/v1/generations`, validated before anything is created.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGeneration {
    #[validate(length(min = 1, max = 128, message = "conversation_id is required"))]
    pub conversation_id: String,
    #[validate(length(min = 1, max = 128, message = "message_id is required"))]
    pub message_id: String,
    pub mode: String,
    #[validate(range(min = 1, max = 30, message = "target_minutes must be between 1 and 30"))]
    pub target_minutes: Option<u32>,
}

/// A validated request for one generation run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub conversation_id: String,
    pub message_id: String,
    pub mode: ContentMode,
    pub target_minutes: Option<u32>,
}

impl TryFrom<CreateGeneration> for GenerationRequest {
    type Error = CoreError;

    fn try_from(input: CreateGeneration) -> Result<Self, Self::Error> {
        input
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        let mode = input.mode.trim().parse::<ContentMode>()?;
        let conversation_id = input.conversation_id.trim().to_string();
        let message_id = input.message_id.trim().to_string();
        if conversation_id.is_empty() || message_id.is_empty() {
            return Err(CoreError::Validation(
                "conversation_id and message_id must not be blank".to_string(),
            ));
        }
        Ok(Self {
            conversation_id,
            message_id,
            mode,
            target_minutes: input.target_minutes,
        })
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// Durable progress record for one generation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRecord {
    pub id: GenerationId,
    pub conversation_id: String,
    pub message_id: String,
    pub status: GenerationStatus,
    pub content_type: ContentMode,
    pub content_url: Option<String>,
    pub error: Option<String>,
    /// Narration (audio/video) or caption (image) text; set on completion.
    pub transcript: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl GenerationRecord {
    /// Build a fresh `pending` record for `request`.
    pub fn pending(request: &GenerationRequest) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::now_v7(),
            conversation_id: request.conversation_id.clone(),
            message_id: request.message_id.clone(),
            status: GenerationStatus::Pending,
            content_type: request.mode,
            content_url: None,
            error: None,
            transcript: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    fn transition(&mut self, next: GenerationStatus) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::Conflict(format!(
                "Generation {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        if next.is_terminal() {
            self.completed_at = Some(self.updated_at);
        }
        Ok(())
    }

    pub fn start_processing(&mut self) -> Result<(), CoreError> {
        self.transition(GenerationStatus::Processing)
    }

    pub fn complete(&mut self, content_url: String, transcript: Option<String>) -> Result<(), CoreError> {
        self.transition(GenerationStatus::Complete)?;
        self.content_url = Some(content_url);
        self.transcript = transcript;
        self.error = None;
        Ok(())
    }

    pub fn fail(&mut self, error: String) -> Result<(), CoreError> {
        self.transition(GenerationStatus::Failed)?;
        self.error = Some(error);
        self.content_url = None;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Source content
// ---------------------------------------------------------------------------

/// Snapshot of conversation text assembled once per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceContent {
    /// Assembled source passages.
    pub text: String,
    /// Text of the target message, when the store returned it.
    pub message_text: Option<String>,
}

impl SourceContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            message_text: None,
        }
    }

    /// Clamp the passages to at most `char_budget` characters. Never fails.
    pub fn bounded(mut self, char_budget: usize) -> Self {
        let cut = truncate_chars(&self.text, char_budget).len();
        self.text.truncate(cut);
        self
    }
}

/// Longest prefix of `s` with at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
