//! Stage runners. Each wraps one external collaborator with its deadline
//! and, where the output is reusable, the content cache.

pub mod image;
pub mod speech;
pub mod transcript;

pub use image::{GeneratedImage, ImageStage};
pub use speech::SpeechStage;
pub use transcript::{TranscriptGenerator, TranscriptTarget};
