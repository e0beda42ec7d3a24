//! Pipeline tuning loaded from environment variables.

use std::time::Duration;

use reverie_core::cache::DEFAULT_TTL;
use reverie_core::generation::{MAX_TARGET_MINUTES, MIN_TARGET_MINUTES};

use crate::prompts::DEFAULT_SCENE_PROMPTS;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source_timeout: Duration,
    pub text_timeout: Duration,
    pub image_timeout: Duration,
    pub speech_timeout: Duration,
    pub encode_timeout: Duration,
    pub upload_timeout: Duration,
    /// Upper bound on one whole run.
    pub ceiling: Duration,
    /// Extra time past `ceiling` before a non-terminal record counts as stale.
    pub stale_grace: Duration,
    pub cache_ttl: Duration,
    pub source_char_budget: usize,
    pub default_target_minutes: u32,
    pub words_per_minute: u32,
    /// Transcode synthesized speech to MP3 before upload in audio mode.
    pub package_audio: bool,
    pub speech_cache_enabled: bool,
    /// Scene prompts for contemplation images; one is picked per source.
    pub scene_prompts: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_timeout: Duration::from_secs(10),
            text_timeout: Duration::from_secs(60),
            image_timeout: Duration::from_secs(90),
            speech_timeout: Duration::from_secs(120),
            encode_timeout: Duration::from_secs(180),
            upload_timeout: Duration::from_secs(60),
            ceiling: Duration::from_secs(600),
            stale_grace: Duration::from_secs(60),
            cache_ttl: DEFAULT_TTL,
            source_char_budget: 24_000,
            default_target_minutes: 5,
            words_per_minute: 130,
            package_audio: false,
            speech_cache_enabled: true,
            scene_prompts: DEFAULT_SCENE_PROMPTS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from environment variables.
    ///
    /// | Env var                   | Default |
    /// |---------------------------|---------|
    /// | `SOURCE_TIMEOUT_SECS`     | `10`    |
    /// | `TEXT_TIMEOUT_SECS`       | `60`    |
    /// | `IMAGE_TIMEOUT_SECS`      | `90`    |
    /// | `SPEECH_TIMEOUT_SECS`     | `120`   |
    /// | `ENCODE_TIMEOUT_SECS`     | `180`   |
    /// | `UPLOAD_TIMEOUT_SECS`     | `60`    |
    /// | `GENERATION_CEILING_SECS` | `600`   |
    /// | `STALE_GRACE_SECS`        | `60`    |
    /// | `CACHE_TTL_SECS`          | `3600`  |
    /// | `SOURCE_CHAR_BUDGET`      | `24000` |
    /// | `DEFAULT_TARGET_MINUTES`  | `5`     |
    /// | `WORDS_PER_MINUTE`        | `130`   |
    /// | `PACKAGE_AUDIO`           | `false` |
    /// | `SPEECH_CACHE_ENABLED`    | `true`  |
    /// | `SCENE_PROMPTS`           | built-in list, `;`-separated to override |
    pub fn from_env() -> Self {
        let d = Self::default();
        let secs = |key: &str, default: Duration| {
            env_parse::<u64>(key)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };
        let scene_prompts = std::env::var("SCENE_PROMPTS")
            .ok()
            .map(|v| {
                v.split(';')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|prompts| !prompts.is_empty())
            .unwrap_or(d.scene_prompts);

        Self {
            source_timeout: secs("SOURCE_TIMEOUT_SECS", d.source_timeout),
            text_timeout: secs("TEXT_TIMEOUT_SECS", d.text_timeout),
            image_timeout: secs("IMAGE_TIMEOUT_SECS", d.image_timeout),
            speech_timeout: secs("SPEECH_TIMEOUT_SECS", d.speech_timeout),
            encode_timeout: secs("ENCODE_TIMEOUT_SECS", d.encode_timeout),
            upload_timeout: secs("UPLOAD_TIMEOUT_SECS", d.upload_timeout),
            ceiling: secs("GENERATION_CEILING_SECS", d.ceiling),
            stale_grace: secs("STALE_GRACE_SECS", d.stale_grace),
            cache_ttl: secs("CACHE_TTL_SECS", d.cache_ttl),
            source_char_budget: env_parse("SOURCE_CHAR_BUDGET").unwrap_or(d.source_char_budget),
            default_target_minutes: env_parse::<u32>("DEFAULT_TARGET_MINUTES")
                .unwrap_or(d.default_target_minutes)
                .clamp(MIN_TARGET_MINUTES, MAX_TARGET_MINUTES),
            words_per_minute: env_parse("WORDS_PER_MINUTE").unwrap_or(d.words_per_minute),
            package_audio: env_parse("PACKAGE_AUDIO").unwrap_or(d.package_audio),
            speech_cache_enabled: env_parse("SPEECH_CACHE_ENABLED").unwrap_or(d.speech_cache_enabled),
            scene_prompts,
        }
    }

    /// Age past which a `pending`/`processing` record is considered abandoned.
    pub fn stale_after(&self) -> Duration {
        self.ceiling + self.stale_grace
    }

    /// Requested narration length, or the default, clamped to the allowed range.
    pub fn target_minutes(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_target_minutes)
            .clamp(MIN_TARGET_MINUTES, MAX_TARGET_MINUTES)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_minutes_defaults_and_clamps() {
        let config = PipelineConfig::default();
        assert_eq!(config.target_minutes(None), 5);
        assert_eq!(config.target_minutes(Some(12)), 12);
        assert_eq!(config.target_minutes(Some(0)), MIN_TARGET_MINUTES);
        assert_eq!(config.target_minutes(Some(90)), MAX_TARGET_MINUTES);
    }

    #[test]
    fn stale_after_adds_grace_to_ceiling() {
        let config = PipelineConfig {
            ceiling: Duration::from_secs(100),
            stale_grace: Duration::from_secs(20),
            ..PipelineConfig::default()
        };
        assert_eq!(config.stale_after(), Duration::from_secs(120));
    }
}
