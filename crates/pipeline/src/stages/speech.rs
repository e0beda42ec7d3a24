//! Narration audio, optionally cached by narration text.

use std::sync::Arc;
use std::time::Duration;

use reverie_core::cache::ContentCache;
use reverie_core::hashing::fingerprint;
use reverie_core::providers::SpeechSynthesizer;

use crate::error::{with_timeout, Stage, StageError};

pub type SpeechAudio = Arc<Vec<u8>>;

pub struct SpeechStage {
    provider: Arc<dyn SpeechSynthesizer>,
    cache: Option<ContentCache<SpeechAudio, StageError>>,
    timeout: Duration,
}

impl SpeechStage {
    pub fn new(
        provider: Arc<dyn SpeechSynthesizer>,
        cache: Option<ContentCache<SpeechAudio, StageError>>,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            cache,
            timeout,
        }
    }

    pub fn cache(&self) -> Option<&ContentCache<SpeechAudio, StageError>> {
        self.cache.as_ref()
    }

    /// Synthesize `narration`. Any failure is terminal for the run.
    pub async fn synthesize(&self, narration: &str) -> Result<SpeechAudio, StageError> {
        let provider = Arc::clone(&self.provider);
        let timeout = self.timeout;
        let text = narration.to_string();
        let call = move || async move {
            tracing::debug!(stage = "speech", chars = text.len(), "Calling speech provider");
            let audio = with_timeout(Stage::Speech, timeout, provider.synthesize(&text)).await?;
            Ok::<_, StageError>(Arc::new(audio))
        };

        match &self.cache {
            Some(cache) => {
                let key = fingerprint(["speech", narration]);
                cache.get_or_try_insert_with(&key, call).await
            }
            None => call().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use reverie_core::cache::DEFAULT_TTL;
    use reverie_core::providers::ProviderError;

    use super::*;

    struct Voice {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SpeechSynthesizer for Voice {
        async fn synthesize(&self, _text: &str) -> Result<Vec<u8>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ProviderError::Api {
                    status: 503,
                    body: "overloaded".into(),
                });
            }
            Ok(b"ID3audio".to_vec())
        }
    }

    fn voice(fail: bool) -> Arc<Voice> {
        Arc::new(Voice {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn cached_speech_is_reused() {
        let provider = voice(false);
        let stage = SpeechStage::new(
            provider.clone(),
            Some(ContentCache::new(DEFAULT_TTL)),
            Duration::from_secs(5),
        );
        stage.synthesize("Breathe.").await.unwrap();
        stage.synthesize("Breathe.").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn uncached_speech_calls_every_time() {
        let provider = voice(false);
        let stage = SpeechStage::new(provider.clone(), None, Duration::from_secs(5));
        stage.synthesize("Breathe.").await.unwrap();
        stage.synthesize("Breathe.").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn provider_failure_is_upstream() {
        let stage = SpeechStage::new(voice(true), None, Duration::from_secs(5));
        assert_matches!(
            stage.synthesize("Breathe.").await,
            Err(StageError::Upstream { stage: Stage::Speech, .. })
        );
    }
}
