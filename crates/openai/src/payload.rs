//! Request and response bodies for the provider endpoints.

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::api::OpenAiError;

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

/// `POST /chat/completions` body.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage<'a>>,
    pub temperature: f32,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoiceMessage {
    pub content: Option<String>,
}

impl ChatResponse {
    /// Trimmed text of the first choice. Empty output is an error.
    pub fn into_text(self) -> Result<String, OpenAiError> {
        let text = self
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(OpenAiError::Malformed("completion had no text".into()));
        }
        Ok(text)
    }
}

/// `POST /images/generations` body.
#[derive(Debug, Serialize)]
pub struct ImageRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub size: &'a str,
    pub n: u8,
    pub response_format: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ImageResponse {
    pub data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
pub struct ImageDatum {
    pub b64_json: Option<String>,
}

impl ImageResponse {
    /// Decode the first image and confirm it is a recognised image format.
    pub fn into_bytes(self) -> Result<Vec<u8>, OpenAiError> {
        let encoded = self
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or_else(|| OpenAiError::Malformed("image response had no b64_json".into()))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(|e| OpenAiError::Malformed(format!("invalid base64 image: {e}")))?;
        image::guess_format(&bytes)
            .map_err(|e| OpenAiError::Malformed(format!("unrecognised image data: {e}")))?;
        Ok(bytes)
    }
}

/// `POST /audio/speech` body.
#[derive(Debug, Serialize)]
pub struct SpeechRequest<'a> {
    pub model: &'a str,
    pub voice: &'a str,
    pub input: &'a str,
    pub response_format: &'a str,
}
