//! NestGuard server binary.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use nestguard_backends::memory::{
    InMemoryLockCoordinator, InMemoryStore, MokaCacheBackend, MokaCacheConfig,
};
use nestguard_server::state::Listing;
use nestguard_server::{AppState, Backends, ProtectedCache, ServerSettings, run_server_with_state};
use nestguard_server::metrics::{GuardMetrics, init_metrics};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = ServerSettings::load().context("loading settings")?;

    tracing::info!(
        "Starting NestGuard Server v{}",
        env!("CARGO_PKG_VERSION")
    );
    tracing::info!("Entity namespace: {}", settings.guard.cache.namespace);
    tracing::info!("Search namespace: {}", settings.guard.cache.search_namespace);

    let prometheus_handle = init_metrics().context("installing metrics recorder")?;

    let store = Arc::new(match &settings.seed_path {
        Some(path) => load_seed(path)?,
        None => InMemoryStore::new(),
    });
    tracing::info!("Backing store seeded with {} listings", store.len());

    let backends = Backends {
        cache: Arc::new(MokaCacheBackend::new(MokaCacheConfig {
            max_capacity: settings.cache_capacity,
        })),
        locks: Arc::new(InMemoryLockCoordinator::new()),
    };

    let metrics = GuardMetrics::new();
    let listings: ProtectedCache<Listing> = ProtectedCache::bootstrap(
        store,
        backends,
        settings.guard.clone(),
        Arc::new(metrics.clone()),
    )
    .await
    .context("building membership filter")?;

    let state = AppState::new(Arc::new(listings), metrics);

    run_server_with_state(settings.socket_addr(), state, prometheus_handle).await?;

    Ok(())
}

fn load_seed(path: &Path) -> anyhow::Result<InMemoryStore<Listing>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let rows: BTreeMap<String, Listing> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing seed file {}", path.display()))?;

    Ok(rows.into_iter().collect())
}
