//! Cache invalidation endpoint handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use nestguard_core::CacheKey;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;

/// Response para operaciones de invalidación.
#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateResponse {
    /// Número de entries invalidadas.
    pub invalidated: usize,
    /// Mensaje descriptivo.
    pub message: String,
}

/// Request body para invalidación por patrones múltiples.
#[derive(Debug, Deserialize)]
pub struct InvalidateByPatternsRequest {
    /// Lista de patrones glob a invalidar.
    pub patterns: Vec<String>,
}

/// DELETE /cache/{namespace}
/// Invalida todas las entries de un namespace.
#[instrument(skip_all, fields(namespace = %namespace))]
pub async fn invalidate_namespace(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Response, AppError> {
    ensure_known(&state, &namespace)?;

    let result = state.listings().cache().invalidate_all(&namespace).await;

    Ok((
        StatusCode::OK,
        Json(InvalidateResponse {
            invalidated: result.count,
            message: format!(
                "Invalidated {} cache entries in '{}'",
                result.count, namespace
            ),
        }),
    )
        .into_response())
}

/// DELETE /cache/{namespace}/{id}
/// Invalida una entry específica.
#[instrument(skip_all, fields(namespace = %path.namespace, id = %path.id))]
pub async fn invalidate_entry(
    State(state): State<AppState>,
    Path(path): Path<EntryPath>,
) -> Result<Response, AppError> {
    ensure_known(&state, &path.namespace)?;

    let key = CacheKey::new(&path.namespace, &path.id);
    let removed = state.listings().cache().invalidate(&key).await;

    Ok((
        StatusCode::OK,
        Json(InvalidateResponse {
            invalidated: usize::from(removed),
            message: format!("Invalidated cache entry '{}'", key),
        }),
    )
        .into_response())
}

/// POST /cache/invalidate
/// Invalida entradas por patrones glob sobre la key completa.
#[instrument(skip_all)]
pub async fn invalidate_patterns(
    State(state): State<AppState>,
    Json(request): Json<InvalidateByPatternsRequest>,
) -> Result<Response, AppError> {
    if request.patterns.is_empty() {
        return Err(AppError::BadRequest("patterns must not be empty".to_string()));
    }

    let patterns: Vec<&str> = request.patterns.iter().map(String::as_str).collect();
    let result = state
        .listings()
        .cache()
        .invalidate_by_patterns(&patterns)
        .await;

    Ok((
        StatusCode::OK,
        Json(InvalidateResponse {
            invalidated: result.count,
            message: format!(
                "Invalidated {} cache entries for {} patterns",
                result.count,
                result.patterns.len()
            ),
        }),
    )
        .into_response())
}

fn ensure_known(state: &AppState, namespace: &str) -> Result<(), AppError> {
    let cache = &state.listings().settings().cache;
    if namespace == cache.namespace || namespace == cache.search_namespace {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!("Unknown namespace '{}'", namespace)))
    }
}

// Path extractors

#[derive(Debug, Deserialize)]
pub struct EntryPath {
    pub namespace: String,
    pub id: String,
}
