use axum::{Json, extract::State};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub filter: FilterHealth,
    pub cache: CacheHealth,
}

#[derive(Debug, Serialize)]
pub struct FilterHealth {
    pub expected_items: usize,
    pub inserted: usize,
    pub num_bits: u64,
    pub num_hashes: u32,
    pub current_fpp: f64,
    pub saturated: bool,
}

#[derive(Debug, Serialize)]
pub struct CacheHealth {
    pub hit_rate: f64,
    pub filter_block_rate: f64,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let filter = state.listings().filter_snapshot();
    let params = filter.params();

    Json(HealthResponse {
        status: "UP".to_string(),
        filter: FilterHealth {
            expected_items: params.expected_items,
            inserted: filter.inserted(),
            num_bits: params.num_bits,
            num_hashes: params.num_hashes,
            current_fpp: filter.current_fpp(),
            saturated: filter.is_saturated(),
        },
        cache: CacheHealth {
            hit_rate: state.metrics().hit_rate(),
            filter_block_rate: state.metrics().block_rate(),
        },
    })
}
