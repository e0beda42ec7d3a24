//! Fake collaborators with call counters for pipeline tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reverie_core::card::{CardConfig, CardRenderer};
use reverie_core::ffmpeg::FfmpegError;
use reverie_core::generation::{GenerationRecord, SourceContent};
use reverie_core::providers::{
    ArtifactStore, ImageGenerator, MediaEncoder, ProviderError, SourceFetcher, SpeechSynthesizer,
    TextGenerator,
};
use reverie_core::store::MemoryStatusStore;
use reverie_core::types::GenerationId;
use reverie_pipeline::{Collaborators, GenerationService, PipelineConfig};

/// Side length of the square picture the fake image provider returns.
pub const PICTURE_SIZE: u32 = 64;

/// A small decodable PNG.
pub fn png() -> Vec<u8> {
    encoded(image::ImageFormat::Png)
}

pub fn jpeg() -> Vec<u8> {
    encoded(image::ImageFormat::Jpeg)
}

fn encoded(format: image::ImageFormat) -> Vec<u8> {
    let picture = image::RgbImage::from_pixel(PICTURE_SIZE, PICTURE_SIZE, image::Rgb([30, 60, 90]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(picture)
        .write_to(&mut std::io::Cursor::new(&mut bytes), format)
        .unwrap();
    bytes
}

/// Start and end of one provider call.
pub type CallSpan = (Instant, Instant);

#[derive(Default)]
pub struct FakeSource {
    pub missing: bool,
}

#[async_trait]
impl SourceFetcher for FakeSource {
    async fn fetch_source(
        &self,
        conversation_id: &str,
        message_id: &str,
    ) -> Result<SourceContent, ProviderError> {
        if self.missing {
            return Err(ProviderError::NotFound(format!("{conversation_id}/{message_id}")));
        }
        Ok(SourceContent {
            text: "From tao.txt:\nThe soft overcomes the hard.".into(),
            message_text: Some("Tell me about yielding.".into()),
        })
    }
}

#[derive(Default)]
pub struct FakeText {
    pub calls: AtomicUsize,
    pub delay: Duration,
    pub hang: bool,
    /// The first call fails after `delay`; later calls succeed.
    pub fail_first: bool,
    pub spans: Mutex<Vec<CallSpan>>,
}

#[async_trait]
impl TextGenerator for FakeText {
    async fn generate_text(&self, _prompt: &str) -> Result<String, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang {
            std::future::pending::<()>().await;
        }
        let start = Instant::now();
        tokio::time::sleep(self.delay).await;
        self.spans.lock().unwrap().push((start, Instant::now()));
        if self.fail_first && call == 0 {
            return Err(ProviderError::Api {
                status: 502,
                body: "bad gateway".into(),
            });
        }
        Ok("Breathe in. Breathe out. Let the hard places soften.".into())
    }
}

#[derive(Default)]
pub struct FakeImage {
    pub calls: AtomicUsize,
    pub delay: Duration,
    /// Returned instead of [`png`] when set.
    pub bytes: Option<Vec<u8>>,
    pub spans: Mutex<Vec<CallSpan>>,
}

#[async_trait]
impl ImageGenerator for FakeImage {
    async fn generate_image(&self, _prompt: &str) -> Result<Vec<u8>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let start = Instant::now();
        tokio::time::sleep(self.delay).await;
        self.spans.lock().unwrap().push((start, Instant::now()));
        Ok(self.bytes.clone().unwrap_or_else(png))
    }
}

#[derive(Default)]
pub struct FakeSpeech {
    pub calls: AtomicUsize,
    pub fail: bool,
    pub delay: Duration,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(ProviderError::Api {
                status: 500,
                body: "voice backend exploded: key=sk-live-123".into(),
            });
        }
        Ok(b"ID3narration".to_vec())
    }
}

#[derive(Default)]
pub struct FakeEncoder {
    pub video_calls: AtomicUsize,
    pub audio_calls: AtomicUsize,
}

#[async_trait]
impl MediaEncoder for FakeEncoder {
    async fn encode_video(
        &self,
        _image: &[u8],
        _audio: &[u8],
        _timeout: Duration,
    ) -> Result<Vec<u8>, FfmpegError> {
        self.video_calls.fetch_add(1, Ordering::SeqCst);
        Ok(b"MP4video".to_vec())
    }

    async fn package_audio(&self, _audio: &[u8], _timeout: Duration) -> Result<Vec<u8>, FfmpegError> {
        self.audio_calls.fetch_add(1, Ordering::SeqCst);
        Ok(b"ID3packaged".to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub key: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Default)]
pub struct FakeArtifacts {
    pub uploads: Mutex<Vec<Upload>>,
}

impl FakeArtifacts {
    pub fn count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl ArtifactStore for FakeArtifacts {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, ProviderError> {
        self.uploads.lock().unwrap().push(Upload {
            key: key.to_string(),
            content_type: content_type.to_string(),
            bytes,
        });
        Ok(format!("https://cdn.test/{key}"))
    }
}

/// A full set of fakes; replace any field before calling [`Fakes::service`].
pub struct Fakes {
    pub source: Arc<FakeSource>,
    pub text: Arc<FakeText>,
    pub image: Arc<FakeImage>,
    pub speech: Arc<FakeSpeech>,
    pub encoder: Arc<dyn MediaEncoder>,
    pub fake_encoder: Arc<FakeEncoder>,
    pub artifacts: Arc<FakeArtifacts>,
    pub store: Arc<MemoryStatusStore>,
}

impl Default for Fakes {
    fn default() -> Self {
        let fake_encoder = Arc::new(FakeEncoder::default());
        Self {
            source: Arc::default(),
            text: Arc::default(),
            image: Arc::default(),
            speech: Arc::default(),
            encoder: fake_encoder.clone(),
            fake_encoder,
            artifacts: Arc::default(),
            store: Arc::new(MemoryStatusStore::new()),
        }
    }
}

impl Fakes {
    pub fn service(&self, config: PipelineConfig) -> GenerationService {
        let collaborators = Collaborators {
            source: self.source.clone(),
            text: self.text.clone(),
            image: self.image.clone(),
            speech: self.speech.clone(),
            encoder: self.encoder.clone(),
            artifacts: self.artifacts.clone(),
            cards: Arc::new(CardRenderer::new(CardConfig::default()).unwrap()),
        };
        GenerationService::new(config, collaborators, self.store.clone())
    }
}

/// Short timeouts so failing tests fail fast.
pub fn test_config() -> PipelineConfig {
    PipelineConfig {
        source_timeout: Duration::from_secs(2),
        text_timeout: Duration::from_secs(2),
        image_timeout: Duration::from_secs(2),
        speech_timeout: Duration::from_secs(2),
        encode_timeout: Duration::from_secs(5),
        upload_timeout: Duration::from_secs(2),
        ceiling: Duration::from_secs(10),
        ..PipelineConfig::default()
    }
}

/// Poll until record `id` is terminal.
pub async fn wait_terminal(service: &GenerationService, id: GenerationId) -> GenerationRecord {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let record = service.get(id).await.unwrap();
        if record.status.is_terminal() {
            return record;
        }
        assert!(Instant::now() < deadline, "generation {id} never finished");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
