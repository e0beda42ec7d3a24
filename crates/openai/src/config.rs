//! Provider configuration loaded from environment variables.

/// Default API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub image_model: String,
    pub image_size: String,
    pub speech_model: String,
    pub voice: String,
    /// Sampling temperature for narration text.
    pub temperature: f32,
}

impl OpenAiConfig {
    /// Load provider configuration from environment variables.
    ///
    /// | Env var               | Default                      |
    /// |-----------------------|------------------------------|
    /// | `OPENAI_API_KEY`      | (empty)                      |
    /// | `OPENAI_BASE_URL`     | `https://api.openai.com/v1`  |
    /// | `OPENAI_TEXT_MODEL`   | `gpt-4o`                     |
    /// | `OPENAI_IMAGE_MODEL`  | `dall-e-3`                   |
    /// | `OPENAI_IMAGE_SIZE`   | `1024x1024`                  |
    /// | `OPENAI_SPEECH_MODEL` | `tts-1`                      |
    /// | `OPENAI_VOICE`        | `nova`                       |
    /// | `OPENAI_TEMPERATURE`  | `0.7`                        |
    pub fn from_env() -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        if api_key.is_empty() {
            tracing::warn!("OPENAI_API_KEY is not set; provider calls will be rejected");
        }
        Self {
            api_key,
            base_url: std::env::var("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            text_model: std::env::var("OPENAI_TEXT_MODEL").unwrap_or_else(|_| "gpt-4o".into()),
            image_model: std::env::var("OPENAI_IMAGE_MODEL").unwrap_or_else(|_| "dall-e-3".into()),
            image_size: std::env::var("OPENAI_IMAGE_SIZE").unwrap_or_else(|_| "1024x1024".into()),
            speech_model: std::env::var("OPENAI_SPEECH_MODEL").unwrap_or_else(|_| "tts-1".into()),
            voice: std::env::var("OPENAI_VOICE").unwrap_or_else(|_| "nova".into()),
            temperature: std::env::var("OPENAI_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.7),
        }
    }
}
