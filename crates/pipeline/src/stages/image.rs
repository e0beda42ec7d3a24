//! Contemplation image, cached by prompt.

use std::sync::Arc;
use std::time::Duration;

use reverie_core::cache::ContentCache;
use reverie_core::generation::SourceContent;
use reverie_core::hashing::fingerprint;
use reverie_core::providers::ImageGenerator;

use crate::error::{with_timeout, Stage, StageError};
use crate::prompts::{image_prompt, select_scene_prompt, source_key, DEFAULT_SCENE_PROMPTS};

/// Image bytes shared between the cache and concurrent runs.
pub type GeneratedImage = Arc<Vec<u8>>;

pub struct ImageStage {
    provider: Arc<dyn ImageGenerator>,
    cache: ContentCache<GeneratedImage, StageError>,
    timeout: Duration,
    scene_prompts: Vec<String>,
}

impl ImageStage {
    pub fn new(
        provider: Arc<dyn ImageGenerator>,
        cache: ContentCache<GeneratedImage, StageError>,
        timeout: Duration,
        scene_prompts: Vec<String>,
    ) -> Self {
        let scene_prompts = if scene_prompts.is_empty() {
            DEFAULT_SCENE_PROMPTS.iter().map(|p| p.to_string()).collect()
        } else {
            scene_prompts
        };
        Self {
            provider,
            cache,
            timeout,
            scene_prompts,
        }
    }

    pub fn cache(&self) -> &ContentCache<GeneratedImage, StageError> {
        &self.cache
    }

    /// Prompt used for `source`.
    pub fn prompt_for(&self, source: &SourceContent) -> String {
        let scene = select_scene_prompt(&self.scene_prompts, &source_key(source))
            .unwrap_or(DEFAULT_SCENE_PROMPTS[0]);
        image_prompt(scene)
    }

    pub async fn generate(&self, source: &SourceContent) -> Result<GeneratedImage, StageError> {
        let prompt = self.prompt_for(source);
        let key = fingerprint([prompt.as_str()]);
        let provider = Arc::clone(&self.provider);
        let timeout = self.timeout;

        self.cache
            .get_or_try_insert_with(&key, move || async move {
                tracing::debug!(stage = "image", "Image cache miss, calling provider");
                let bytes = with_timeout(Stage::Image, timeout, provider.generate_image(&prompt)).await?;
                Ok::<_, StageError>(Arc::new(bytes))
            })
            .await
    }
}
