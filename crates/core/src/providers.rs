//! Boundary traits for the external collaborators a generation run calls.
//!
//! Implementations live in the integration crates (`reverie-openai`,
//! `reverie-cloud`, `reverie-db`, and [`crate::ffmpeg`]). Timeouts are not
//! part of these signatures except for the encoder: the stage runners in
//! `reverie-pipeline` wrap every call in its own deadline.

use std::time::Duration;

use async_trait::async_trait;

use crate::ffmpeg::FfmpegError;
use crate::generation::SourceContent;

/// Failure reported by an external provider.
///
/// Kept `Clone` so one failed call can be reported to every request that
/// was waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The request never produced a response (network, DNS, TLS, ...).
    #[error("request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success status.
    #[error("provider returned status {status}: {body}")]
    Api { status: u16, body: String },

    /// The response arrived but could not be used.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The referenced source entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

/// Conversation store: assembles the source text for a request.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch_source(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<SourceContent, ProviderError>;
}

/// Text-generation provider (LLM chat completion).
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Image-generation provider. Returns raw encoded image bytes.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Speech-synthesis provider. Returns encoded audio bytes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError>;
}

/// External media encoder process.
#[async_trait]
pub trait MediaEncoder: Send + Sync {
    /// Combine one still image and one audio track into a video container.
    async fn encode_video(
        &self,
        image: &[u8],
        audio: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, FfmpegError>;

    /// Package a bare audio track for delivery.
    async fn package_audio(&self, audio: &[u8], timeout: Duration) -> Result<Vec<u8>, FfmpegError>;
}

/// Durable blob storage for finished artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload `bytes` under `key` and return a URL the client can fetch.
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ProviderError>;
}
