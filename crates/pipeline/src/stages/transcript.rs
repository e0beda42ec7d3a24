//! Narration and caption text, cached by source and target.

use std::sync::Arc;
use std::time::Duration;

use reverie_core::cache::ContentCache;
use reverie_core::generation::SourceContent;
use reverie_core::hashing::fingerprint;
use reverie_core::providers::{ProviderError, TextGenerator};

use crate::error::{with_timeout, Stage, StageError};
use crate::prompts::{caption_prompt, narration_prompt, source_key};

/// What the generated text is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptTarget {
    /// Spoken narration of about `minutes` minutes.
    Narration { minutes: u32 },
    /// One or two sentence quote for an image card.
    Caption,
}

impl TranscriptTarget {
    fn cache_tag(self) -> String {
        match self {
            Self::Narration { minutes } => format!("narration:{minutes}"),
            Self::Caption => "caption".to_string(),
        }
    }
}

pub struct TranscriptGenerator {
    provider: Arc<dyn TextGenerator>,
    cache: ContentCache<String, StageError>,
    timeout: Duration,
    words_per_minute: u32,
}

impl TranscriptGenerator {
    pub fn new(
        provider: Arc<dyn TextGenerator>,
        cache: ContentCache<String, StageError>,
        timeout: Duration,
        words_per_minute: u32,
    ) -> Self {
        Self {
            provider,
            cache,
            timeout,
            words_per_minute,
        }
    }

    pub fn cache(&self) -> &ContentCache<String, StageError> {
        &self.cache
    }

    /// Cache key for `source` and `target`.
    pub fn cache_key(source: &SourceContent, target: TranscriptTarget) -> String {
        fingerprint([source_key(source), target.cache_tag()])
    }

    /// Word count asked of the provider for `minutes` of narration.
    pub fn target_words(&self, minutes: u32) -> u32 {
        minutes.saturating_mul(self.words_per_minute)
    }

    /// Return cached text for this source and target, or ask the provider.
    ///
    /// Provider failures and timeouts are not retried and not cached.
    pub async fn generate(
        &self,
        source: &SourceContent,
        target: TranscriptTarget,
    ) -> Result<String, StageError> {
        let key = Self::cache_key(source, target);
        let prompt = match target {
            TranscriptTarget::Narration { minutes } => {
                narration_prompt(source, minutes, self.target_words(minutes))
            }
            TranscriptTarget::Caption => caption_prompt(source),
        };
        let provider = Arc::clone(&self.provider);
        let timeout = self.timeout;

        self.cache
            .get_or_try_insert_with(&key, move || async move {
                tracing::debug!(stage = "transcript", "Transcript cache miss, calling provider");
                let text = with_timeout(Stage::Transcript, timeout, provider.generate_text(&prompt)).await?;
                let text = text.trim().to_string();
                if text.is_empty() {
                    return Err(StageError::Upstream {
                        stage: Stage::Transcript,
                        error: ProviderError::Malformed("empty transcript".into()),
                    });
                }
                Ok::<_, StageError>(text)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use reverie_core::cache::DEFAULT_TTL;

    use super::*;

    struct CountingText {
        calls: AtomicUsize,
        reply: &'static str,
    }

    #[async_trait]
    impl TextGenerator for CountingText {
        async fn generate_text(&self, _prompt: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.to_string())
        }
    }

    fn generator(reply: &'static str) -> (Arc<CountingText>, TranscriptGenerator) {
        let provider = Arc::new(CountingText {
            calls: AtomicUsize::new(0),
            reply,
        });
        let generator = TranscriptGenerator::new(
            provider.clone(),
            ContentCache::new(DEFAULT_TTL),
            Duration::from_secs(5),
            130,
        );
        (provider, generator)
    }

    #[test]
    fn target_words_saturates_on_huge_rates() {
        let (_, generator) = generator("unused");
        assert_eq!(generator.target_words(5), 650);

        let fast = TranscriptGenerator::new(
            Arc::new(CountingText {
                calls: AtomicUsize::new(0),
                reply: "unused",
            }),
            ContentCache::new(DEFAULT_TTL),
            Duration::from_secs(5),
            u32::MAX / 2,
        );
        assert_eq!(fast.target_words(30), u32::MAX);
    }

    #[tokio::test]
    async fn second_call_hits_cache() {
        let (provider, generator) = generator("  Breathe in slowly.  ");
        let source = SourceContent::new("The breath is an anchor.");
        let target = TranscriptTarget::Narration { minutes: 5 };

        assert_eq!(generator.generate(&source, target).await.unwrap(), "Breathe in slowly.");
        assert_eq!(generator.generate(&source, target).await.unwrap(), "Breathe in slowly.");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn caption_and_narration_are_cached_separately() {
        let (provider, generator) = generator("text");
        let source = SourceContent::new("The breath is an anchor.");
        generator.generate(&source, TranscriptTarget::Caption).await.unwrap();
        generator
            .generate(&source, TranscriptTarget::Narration { minutes: 5 })
            .await
            .unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn blank_output_is_upstream_error() {
        let (_, generator) = generator("   ");
        let result = generator
            .generate(&SourceContent::new("x"), TranscriptTarget::Caption)
            .await;
        assert_matches!(result, Err(StageError::Upstream { stage: Stage::Transcript, .. }));
        assert!(generator.cache().is_empty());
    }
}
