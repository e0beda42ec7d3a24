//! Content-generation pipeline.
//!
//! [`GenerationService`] accepts requests, persists a `pending` record and
//! spawns one [`GenerationOrchestrator`] run per request. The orchestrator
//! drives the stage runners in [`stages`] and is the only writer of a
//! record's status after creation.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod prompts;
pub mod service;
pub mod stages;

pub use config::PipelineConfig;
pub use error::{Stage, StageError};
pub use orchestrator::{Collaborators, GenerationOrchestrator};
pub use service::GenerationService;
