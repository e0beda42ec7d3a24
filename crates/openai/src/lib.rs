//! Client for an OpenAI-compatible provider.
//!
//! One [`OpenAiClient`] implements the text, image and speech collaborator
//! traits from `reverie_core::providers`.

pub mod api;
pub mod config;
pub mod payload;

pub use api::{OpenAiClient, OpenAiError};
pub use config::OpenAiConfig;
