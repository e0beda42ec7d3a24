//! REST client for the provider's chat, image and speech endpoints.

use async_trait::async_trait;
use reverie_core::providers::{ImageGenerator, ProviderError, SpeechSynthesizer, TextGenerator};

use crate::config::OpenAiConfig;
use crate::payload::{
    ChatMessage, ChatRequest, ChatResponse, ImageRequest, ImageResponse, SpeechRequest,
};

/// System prompt framing every narration request.
const SYSTEM_PROMPT: &str =
    "You write calm, grounded contemplative text for spoken narration and short quotations.";

/// Errors from the provider REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum OpenAiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider returned a non-2xx status code.
    #[error("provider API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// The response body did not contain usable output.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl From<OpenAiError> for ProviderError {
    fn from(err: OpenAiError) -> Self {
        match err {
            OpenAiError::Request(e) => ProviderError::Request(e.to_string()),
            OpenAiError::ApiError { status, body } => ProviderError::Api { status, body },
            OpenAiError::Malformed(msg) => ProviderError::Malformed(msg),
        }
    }
}

/// HTTP client for an OpenAI-compatible API.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: OpenAiConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    /// `POST /chat/completions` with a single user prompt.
    pub async fn chat(&self, prompt: &str) -> Result<String, OpenAiError> {
        let body = ChatRequest {
            model: &self.config.text_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
        };
        let response = self
            .client
            .post(self.url("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        Self::parse_response::<ChatResponse>(response)
            .await?
            .into_text()
    }

    /// `POST /images/generations`, returning decoded image bytes.
    pub async fn image(&self, prompt: &str) -> Result<Vec<u8>, OpenAiError> {
        let body = ImageRequest {
            model: &self.config.image_model,
            prompt,
            size: &self.config.image_size,
            n: 1,
            response_format: "b64_json",
        };
        let response = self
            .client
            .post(self.url("images/generations"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        Self::parse_response::<ImageResponse>(response)
            .await?
            .into_bytes()
    }

    /// `POST /audio/speech`, returning MP3 bytes.
    pub async fn speech(&self, text: &str) -> Result<Vec<u8>, OpenAiError> {
        let body = SpeechRequest {
            model: &self.config.speech_model,
            voice: &self.config.voice,
            input: text,
            response_format: "mp3",
        };
        let response = self
            .client
            .post(self.url("audio/speech"))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;
        let bytes = Self::ensure_success(response).await?.bytes().await?;
        if bytes.is_empty() {
            return Err(OpenAiError::Malformed("speech response was empty".into()));
        }
        Ok(bytes.to_vec())
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`OpenAiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, OpenAiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(OpenAiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, OpenAiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, ProviderError> {
        tracing::debug!(model = %self.config.text_model, prompt_chars = prompt.len(), "Requesting completion");
        Ok(self.chat(prompt).await?)
    }
}

#[async_trait]
impl ImageGenerator for OpenAiClient {
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, ProviderError> {
        tracing::debug!(model = %self.config.image_model, "Requesting image");
        Ok(self.image(prompt).await?)
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ProviderError> {
        tracing::debug!(model = %self.config.speech_model, voice = %self.config.voice, "Requesting speech");
        Ok(self.speech(text).await?)
    }
}
