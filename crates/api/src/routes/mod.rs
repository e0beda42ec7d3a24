pub mod generations;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /generations                 POST create
/// /generations/{id}            GET poll
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/generations", generations::router())
}
