use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generations;
use crate::state::AppState;

/// Routes mounted at `/generations`.
///
/// ```text
/// POST   /          create a generation, returns 202 with a pending record
/// GET    /{id}      current status of a generation
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(generations::create))
        .route("/{id}", get(generations::get_by_id))
}
