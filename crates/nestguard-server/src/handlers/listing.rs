//! Listing lookup and write-notification handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::instrument;

use crate::cache::InvalidationResult;
use crate::error::AppError;
use crate::handlers::invalidate::InvalidateResponse;
use crate::state::{AppState, Listing};

/// GET /listings/{id}
#[instrument(skip_all, fields(id = %id))]
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Listing>, AppError> {
    match state.listings().get(&id).await? {
        Some(listing) => Ok(Json(listing)),
        None => Err(AppError::NotFound {
            resource: "listing".to_string(),
            id,
        }),
    }
}

/// PUT /listings/{id}/created
/// Notifica una creacion ya confirmada en el backing store.
#[instrument(skip_all, fields(id = %id))]
pub async fn listing_created(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(listing): Json<Listing>,
) -> Response {
    let result = state.listings().on_created(&id, &listing).await;
    written(result, format!("Listing '{}' registered", id))
}

/// PUT /listings/{id}
/// Notifica una actualizacion ya confirmada en el backing store.
#[instrument(skip_all, fields(id = %id))]
pub async fn listing_updated(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(listing): Json<Listing>,
) -> Response {
    let result = state.listings().on_updated(&id, &listing).await;
    written(result, format!("Listing '{}' refreshed", id))
}

/// DELETE /listings/{id}
/// Notifica un borrado ya confirmado en el backing store.
#[instrument(skip_all, fields(id = %id))]
pub async fn listing_deleted(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let result = state.listings().on_deleted(&id).await;
    written(result, format!("Listing '{}' evicted", id))
}

fn written(result: InvalidationResult, message: String) -> Response {
    (
        StatusCode::OK,
        Json(InvalidateResponse {
            invalidated: result.count,
            message,
        }),
    )
        .into_response()
}
