//! Application state.

use std::sync::Arc;

use serde_json::Value;

use crate::lookup::ProtectedCache;
use crate::metrics::GuardMetrics;

/// Entities are served as opaque JSON documents.
pub type Listing = Value;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    listings: Arc<ProtectedCache<Listing>>,
    metrics: GuardMetrics,
}

impl AppState {
    pub fn new(listings: Arc<ProtectedCache<Listing>>, metrics: GuardMetrics) -> Self {
        Self { listings, metrics }
    }

    /// Returns the guarded listing cache.
    pub fn listings(&self) -> &ProtectedCache<Listing> {
        self.listings.as_ref()
    }

    pub fn metrics(&self) -> &GuardMetrics {
        &self.metrics
    }
}
