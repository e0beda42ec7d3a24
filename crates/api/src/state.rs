use std::sync::Arc;

use reverie_pipeline::GenerationService;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Generation intake, polling and reconciliation.
    pub generations: GenerationService,
    pub config: Arc<ServerConfig>,
}
