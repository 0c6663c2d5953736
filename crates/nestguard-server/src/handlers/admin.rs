//! Filter administration handlers.

use axum::{Json, extract::State};
use serde::Serialize;
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RebuildResponse {
    pub expected_items: usize,
    pub num_bits: u64,
    pub num_hashes: u32,
    pub expected_fpp: f64,
}

/// POST /admin/filter/rebuild
/// Re-enumerates keys and swaps in a freshly sized membership filter.
#[instrument(skip_all)]
pub async fn rebuild_filter(State(state): State<AppState>) -> Result<Json<RebuildResponse>, AppError> {
    let params = state.listings().rebuild_filter().await?;

    Ok(Json(RebuildResponse {
        expected_items: params.expected_items,
        num_bits: params.num_bits,
        num_hashes: params.num_hashes,
        expected_fpp: params.expected_fpp(params.expected_items),
    }))
}
