//! Handlers for the `/generations` resource.
//!
//! Creation only persists a `pending` record and schedules the run; clients
//! poll `GET /generations/{id}` until the status is terminal.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use reverie_core::generation::{CreateGeneration, GenerationRecord, GenerationStatus};
use reverie_core::types::GenerationId;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Body returned by `POST /generations`.
#[derive(Debug, Serialize)]
pub struct CreatedGeneration {
    pub id: GenerationId,
    pub status: GenerationStatus,
}

/// POST /api/v1/generations
///
/// Validates the request and returns 202 with the new record's id. The run
/// continues after the response is sent.
pub async fn create(
    State(state): State<AppState>,
    input: Result<Json<CreateGeneration>, JsonRejection>,
) -> AppResult<(StatusCode, Json<DataResponse<CreatedGeneration>>)> {
    let Json(input) = input?;
    let record = state.generations.create(input).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: CreatedGeneration {
                id: record.id,
                status: record.status,
            },
        }),
    ))
}

/// GET /api/v1/generations/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<DataResponse<GenerationRecord>>> {
    let id = parse_id(&id)?;
    let record = state.generations.get(id).await?;
    Ok(Json(DataResponse { data: record }))
}

fn parse_id(raw: &str) -> Result<GenerationId, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid generation id '{raw}'")))
}
