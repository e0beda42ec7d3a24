//! Stage failures and their client-safe descriptions.

use std::fmt;
use std::time::Duration;

use reverie_core::card::CardError;
use reverie_core::ffmpeg::FfmpegError;
use reverie_core::providers::ProviderError;
use tokio::task::JoinError;

/// One step of a generation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Source,
    Transcript,
    Image,
    Speech,
    /// Captioning the picture into a contemplation card.
    Card,
    Encode,
    Upload,
    /// The run as a whole (ceiling timeout, status writes).
    Run,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Transcript => "transcript",
            Self::Image => "image",
            Self::Speech => "speech",
            Self::Card => "card",
            Self::Encode => "encode",
            Self::Upload => "upload",
            Self::Run => "run",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a generation run stopped.
///
/// `Clone` so one coalesced computation can fail every waiting run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StageError {
    /// An external call did not answer within its deadline.
    #[error("{stage} stage timed out after {timeout:?}")]
    Timeout { stage: Stage, timeout: Duration },

    /// An external provider answered with an error.
    #[error("{stage} stage failed: {error}")]
    Upstream {
        stage: Stage,
        #[source]
        error: ProviderError,
    },

    /// The media encoder exited unsuccessfully or produced nothing.
    #[error("encoder failed: {0}")]
    Encoder(String),

    /// A local resource (filesystem, process spawn, status store) failed.
    #[error("{stage} stage resource failure: {message}")]
    Resource { stage: Stage, message: String },
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Timeout { stage, .. }
            | Self::Upstream { stage, .. }
            | Self::Resource { stage, .. } => *stage,
            Self::Encoder(_) => Stage::Encode,
        }
    }

    /// Reason stored on the failed record. Never includes provider bodies.
    pub fn public_message(&self) -> String {
        match self {
            Self::Timeout { stage: Stage::Run, .. } => "Generation took too long and was stopped".to_string(),
            Self::Timeout { stage, .. } => format!("{} step timed out", title(*stage)),
            Self::Upstream {
                stage: Stage::Source,
                error: ProviderError::NotFound(_),
            } => "Conversation or message not found".to_string(),
            Self::Upstream { stage, .. } => format!("{} generation failed", title(*stage)),
            Self::Encoder(_) => "Media encoding failed".to_string(),
            Self::Resource { stage: Stage::Card, .. } => "Image card rendering failed".to_string(),
            Self::Resource { .. } => "Internal error while generating content".to_string(),
        }
    }
}

impl From<FfmpegError> for StageError {
    fn from(err: FfmpegError) -> Self {
        match err {
            FfmpegError::Timeout { elapsed_ms } => StageError::Timeout {
                stage: Stage::Encode,
                timeout: Duration::from_millis(elapsed_ms),
            },
            FfmpegError::ExecutionFailed { .. } | FfmpegError::EmptyOutput => {
                StageError::Encoder(err.to_string())
            }
            FfmpegError::NotFound(_) | FfmpegError::IoError(_) => StageError::Resource {
                stage: Stage::Encode,
                message: err.to_string(),
            },
        }
    }
}

impl From<CardError> for StageError {
    fn from(err: CardError) -> Self {
        StageError::Resource {
            stage: Stage::Card,
            message: err.to_string(),
        }
    }
}

/// A stage task panicked or was cancelled by runtime shutdown.
impl From<JoinError> for StageError {
    fn from(err: JoinError) -> Self {
        StageError::Resource {
            stage: Stage::Run,
            message: err.to_string(),
        }
    }
}

fn title(stage: Stage) -> &'static str {
    match stage {
        Stage::Source => "Source",
        Stage::Transcript => "Transcript",
        Stage::Image => "Image",
        Stage::Speech => "Speech",
        Stage::Card => "Image card",
        Stage::Encode => "Encoding",
        Stage::Upload => "Upload",
        Stage::Run => "Generation",
    }
}

/// Await `fut` with a deadline, tagging failures with `stage`.
pub async fn with_timeout<T, F>(stage: Stage, timeout: Duration, fut: F) -> Result<T, StageError>
where
    F: std::future::Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(StageError::Upstream { stage, error }),
        Err(_) => Err(StageError::Timeout { stage, timeout }),
    }
}
