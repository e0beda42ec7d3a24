//! Shared setup for API integration tests: in-memory store and canned
//! collaborators behind the production router.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use reverie_core::card::{CardConfig, CardRenderer};
use reverie_core::ffmpeg::FfmpegError;
use reverie_core::generation::SourceContent;
use reverie_core::providers::{
    ArtifactStore, ImageGenerator, MediaEncoder, ProviderError, SourceFetcher, SpeechSynthesizer,
    TextGenerator,
};
use reverie_core::store::MemoryStatusStore;
use reverie_pipeline::{Collaborators, GenerationService, PipelineConfig};
use tower::ServiceExt;

use reverie_api::config::ServerConfig;
use reverie_api::router::build_app_router;
use reverie_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        reconcile_interval_secs: 60,
    }
}

/// Canned collaborators. Source lookups for `conversation_id == "missing"`
/// fail; speech fails when `speech_fails` is set.
#[derive(Default)]
pub struct Canned {
    pub speech_fails: bool,
}

#[async_trait]
impl SourceFetcher for Canned {
    async fn fetch_source(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<SourceContent, ProviderError> {
        if conversation_id == "missing" {
            return Err(ProviderError::NotFound(format!("{conversation_id}/{message_id}")));
        }
        Ok(SourceContent::new("From rumi.txt:\nThe wound is the place where the light enters you."))
    }
}

#[async_trait]
impl TextGenerator for Canned {
    async fn generate_text(&self, _prompt: &str) -> Result<String, ProviderError> {
        Ok("Rest here. Let the light in.".into())
    }
}

#[async_trait]
impl ImageGenerator for Canned {
    async fn generate_image(&self, _prompt: &str) -> Result<Vec<u8>, ProviderError> {
        let picture = image::RgbImage::from_pixel(32, 32, image::Rgb([200, 180, 120]));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(picture)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .expect("encode test picture");
        Ok(bytes)
    }
}

#[async_trait]
impl SpeechSynthesizer for Canned {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, ProviderError> {
        if self.speech_fails {
            return Err(ProviderError::Api {
                status: 503,
                body: "overloaded".into(),
            });
        }
        Ok(b"ID3audio".to_vec())
    }
}

#[async_trait]
impl MediaEncoder for Canned {
    async fn encode_video(
        &self,
        _image: &[u8],
        _audio: &[u8],
        _timeout: Duration,
    ) -> Result<Vec<u8>, FfmpegError> {
        Ok(b"MP4".to_vec())
    }

    async fn package_audio(&self, audio: &[u8], _timeout: Duration) -> Result<Vec<u8>, FfmpegError> {
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl ArtifactStore for Canned {
    async fn upload(
        &self,
        key: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, ProviderError> {
        Ok(format!("https://cdn.test/{key}"))
    }
}

/// Build the full application router over an in-memory status store.
pub fn build_test_app(canned: Canned) -> (Router, Arc<MemoryStatusStore>) {
    let canned = Arc::new(canned);
    let store = Arc::new(MemoryStatusStore::new());
    let collaborators = Collaborators {
        source: canned.clone(),
        text: canned.clone(),
        image: canned.clone(),
        speech: canned.clone(),
        encoder: canned.clone(),
        artifacts: canned,
        cards: Arc::new(CardRenderer::new(CardConfig::default()).unwrap()),
    };
    let generations = GenerationService::new(PipelineConfig::default(), collaborators, store.clone());

    let config = test_config();
    let state = AppState {
        generations,
        config: Arc::new(config.clone()),
    };
    (build_app_router(state, &config), store)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll `GET /api/v1/generations/{id}` until the record is terminal.
pub async fn poll_terminal(app: &Router, id: &str) -> serde_json::Value {
    for _ in 0..500 {
        let json = body_json(get(app.clone(), &format!("/api/v1/generations/{id}")).await).await;
        let status = json["data"]["status"].as_str().unwrap().to_string();
        if status == "complete" || status == "failed" {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("generation {id} never finished");
}
