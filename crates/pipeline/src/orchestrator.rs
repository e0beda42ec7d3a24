//! One generation run: stages in order, then a single terminal status write.
//!
//! Schedule per run:
//!
//! ```text
//! processing -> source
//!            -> transcript || image           (concurrent, first failure wins)
//!            -> image mode:  card(image, caption) -> upload(png)
//!            -> audio mode:  speech -> [package] -> upload(audio)
//!            -> video mode:  speech -> encode(image, audio) -> upload(video)
//!            -> complete | failed
//! ```

use std::sync::Arc;
use std::time::Instant;

use reverie_core::cache::ContentCache;
use reverie_core::card::CardRenderer;
use reverie_core::generation::{ContentMode, GenerationRequest};
use reverie_core::providers::{
    ArtifactStore, ImageGenerator, MediaEncoder, SourceFetcher, SpeechSynthesizer, TextGenerator,
};
use reverie_core::store::StatusStore;
use reverie_core::types::GenerationId;

use crate::config::PipelineConfig;
use crate::error::{with_timeout, Stage, StageError};
use crate::stages::{GeneratedImage, ImageStage, SpeechStage, TranscriptGenerator, TranscriptTarget};

/// External collaborators a run calls.
#[derive(Clone)]
pub struct Collaborators {
    pub source: Arc<dyn SourceFetcher>,
    pub text: Arc<dyn TextGenerator>,
    pub image: Arc<dyn ImageGenerator>,
    pub speech: Arc<dyn SpeechSynthesizer>,
    pub encoder: Arc<dyn MediaEncoder>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub cards: Arc<CardRenderer>,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub url: String,
    pub transcript: String,
}

pub struct GenerationOrchestrator {
    config: PipelineConfig,
    store: Arc<dyn StatusStore>,
    source: Arc<dyn SourceFetcher>,
    transcripts: TranscriptGenerator,
    images: ImageStage,
    speech: SpeechStage,
    encoder: Arc<dyn MediaEncoder>,
    artifacts: Arc<dyn ArtifactStore>,
    cards: Arc<CardRenderer>,
}

impl GenerationOrchestrator {
    pub fn new(config: PipelineConfig, collaborators: Collaborators, store: Arc<dyn StatusStore>) -> Self {
        let transcripts = TranscriptGenerator::new(
            collaborators.text,
            ContentCache::new(config.cache_ttl),
            config.text_timeout,
            config.words_per_minute,
        );
        let images = ImageStage::new(
            collaborators.image,
            ContentCache::new(config.cache_ttl),
            config.image_timeout,
            config.scene_prompts.clone(),
        );
        let speech_cache = config
            .speech_cache_enabled
            .then(|| ContentCache::new(config.cache_ttl));
        let speech = SpeechStage::new(collaborators.speech, speech_cache, config.speech_timeout);

        Self {
            config,
            store,
            source: collaborators.source,
            transcripts,
            images,
            speech,
            encoder: collaborators.encoder,
            artifacts: collaborators.artifacts,
            cards: collaborators.cards,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Drop expired entries from every stage cache. Returns how many were removed.
    pub fn purge_caches(&self) -> usize {
        self.transcripts.cache().purge_expired()
            + self.images.cache().purge_expired()
            + self.speech.cache().map_or(0, |c| c.purge_expired())
    }

    /// Drive record `id` from `pending` to a terminal state.
    ///
    /// Never returns an error: every failure ends up on the record.
    pub async fn run(&self, id: GenerationId, request: GenerationRequest) {
        let started = Instant::now();
        let mode = request.mode;

        match self.store.mark_processing(id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(%id, "Generation is no longer pending, skipping run");
                return;
            }
            Err(e) => {
                // Left pending; stale reconciliation will fail it.
                tracing::error!(%id, error = %e, "Failed to mark generation processing");
                return;
            }
        }
        tracing::info!(%id, %mode, "Generation started");

        let outcome = match tokio::time::timeout(self.config.ceiling, self.produce(id, &request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(StageError::Timeout {
                stage: Stage::Run,
                timeout: self.config.ceiling,
            }),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(artifact) => {
                match self
                    .store
                    .mark_complete(id, &artifact.url, Some(&artifact.transcript))
                    .await
                {
                    Ok(true) => tracing::info!(%id, %mode, elapsed_ms, url = %artifact.url, "Generation complete"),
                    Ok(false) => tracing::warn!(%id, elapsed_ms, "Generation finished after record became terminal"),
                    Err(e) => tracing::error!(%id, error = %e, "Failed to mark generation complete"),
                }
            }
            Err(err) => {
                tracing::error!(%id, %mode, stage = %err.stage(), elapsed_ms, error = %err, "Generation failed");
                if let Err(e) = self.store.mark_failed(id, &err.public_message()).await {
                    tracing::error!(%id, error = %e, "Failed to mark generation failed");
                }
            }
        }
    }

    async fn produce(&self, id: GenerationId, request: &GenerationRequest) -> Result<Artifact, StageError> {
        let stage_start = Instant::now();
        let source = with_timeout(
            Stage::Source,
            self.config.source_timeout,
            self.source
                .fetch_source(&request.conversation_id, &request.message_id),
        )
        .await?
        .bounded(self.config.source_char_budget);
        tracing::debug!(%id, stage = "source", chars = source.text.len(), elapsed_ms = stage_start.elapsed().as_millis() as u64, "Source fetched");

        let target = match request.mode {
            ContentMode::Image => TranscriptTarget::Caption,
            ContentMode::Audio | ContentMode::Video => TranscriptTarget::Narration {
                minutes: self.config.target_minutes(request.target_minutes),
            },
        };

        let stage_start = Instant::now();
        let (transcript, image) = tokio::try_join!(
            self.transcripts.generate(&source, target),
            self.images.generate(&source),
        )?;
        tracing::debug!(%id, stage = "transcript+image", elapsed_ms = stage_start.elapsed().as_millis() as u64, "Text and image ready");

        let bytes = match request.mode {
            ContentMode::Image => {
                let stage_start = Instant::now();
                let card = self.render_card(image, &transcript).await?;
                tracing::debug!(%id, stage = "card", size = card.len(), elapsed_ms = stage_start.elapsed().as_millis() as u64, "Card rendered");
                card
            }
            ContentMode::Audio => {
                let audio = self.synthesize(id, &transcript).await?;
                if self.config.package_audio {
                    let stage_start = Instant::now();
                    let packaged = self
                        .encoder
                        .package_audio(&audio, self.config.encode_timeout)
                        .await?;
                    tracing::debug!(%id, stage = "encode", elapsed_ms = stage_start.elapsed().as_millis() as u64, "Audio packaged");
                    packaged
                } else {
                    audio.as_ref().clone()
                }
            }
            ContentMode::Video => {
                let audio = self.synthesize(id, &transcript).await?;
                let stage_start = Instant::now();
                let video = self
                    .encoder
                    .encode_video(&image, &audio, self.config.encode_timeout)
                    .await?;
                tracing::debug!(%id, stage = "encode", size = video.len(), elapsed_ms = stage_start.elapsed().as_millis() as u64, "Video encoded");
                video
            }
        };

        let key = request.mode.object_key(id);
        let stage_start = Instant::now();
        let url = with_timeout(
            Stage::Upload,
            self.config.upload_timeout,
            self.artifacts.upload(&key, bytes, request.mode.mime_type()),
        )
        .await?;
        tracing::debug!(%id, stage = "upload", key = %key, elapsed_ms = stage_start.elapsed().as_millis() as u64, "Artifact uploaded");

        Ok(Artifact { url, transcript })
    }

    /// Caption the picture on the blocking pool; the result is always PNG.
    async fn render_card(&self, image: GeneratedImage, caption: &str) -> Result<Vec<u8>, StageError> {
        let cards = Arc::clone(&self.cards);
        let caption = caption.to_string();
        let card = tokio::task::spawn_blocking(move || cards.render(&image, &caption))
            .await
            .map_err(StageError::from)??;
        Ok(card)
    }

    async fn synthesize(&self, id: GenerationId, transcript: &str) -> Result<Arc<Vec<u8>>, StageError> {
        let stage_start = Instant::now();
        let audio = self.speech.synthesize(transcript).await?;
        tracing::debug!(%id, stage = "speech", size = audio.len(), elapsed_ms = stage_start.elapsed().as_millis() as u64, "Speech synthesized");
        Ok(audio)
    }
}
