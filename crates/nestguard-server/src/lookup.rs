//! Guarded lookup path: membership filter → cache → stampede guard → store.

use std::future::Future;
use std::sync::Arc;

use nestguard_backends::{BackingStore, CacheBackend, LockCoordinator, StoreError};
use nestguard_core::{
    CacheKey, FilterParams, GuardSettings, JitterPolicy, MembershipFilter, MetricsSink,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::cache::{CacheLayer, InvalidationResult};
use crate::error::LookupError;
use crate::stampede::StampedeGuard;

/// Cache backend and lock coordinator used by a [`ProtectedCache`].
#[derive(Clone)]
pub struct Backends {
    pub cache: Arc<dyn CacheBackend>,
    pub locks: Arc<dyn LockCoordinator>,
}

/// Read-through cache protected against penetration, breakdown and avalanche.
///
/// Owns the membership filter for the entity namespace. Writes must be
/// reported through [`on_created`](Self::on_created),
/// [`on_updated`](Self::on_updated) and [`on_deleted`](Self::on_deleted)
/// after the backing store has committed them.
pub struct ProtectedCache<V> {
    store: Arc<dyn BackingStore<V>>,
    filter: RwLock<Arc<MembershipFilter>>,
    /// Ids created while a rebuild is enumerating keys.
    pending: Mutex<Option<Vec<String>>>,
    rebuild_lock: tokio::sync::Mutex<()>,
    cache: CacheLayer,
    guard: StampedeGuard,
    settings: GuardSettings,
    metrics: Arc<dyn MetricsSink>,
}

impl<V> ProtectedCache<V>
where
    V: Serialize + DeserializeOwned + Send + 'static,
{
    /// Builds the filter from a full key enumeration and wires the layers.
    ///
    /// # Errors
    ///
    /// Fails if the settings are invalid or the backing store cannot list its
    /// keys. Starting without the filter would silently disable penetration
    /// protection, so there is no degraded mode.
    pub async fn bootstrap(
        store: Arc<dyn BackingStore<V>>,
        backends: Backends,
        settings: GuardSettings,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, LookupError> {
        settings.validate()?;

        let filter = build_filter(store.as_ref(), &settings).await?;

        let cache = CacheLayer::new(
            backends.cache,
            JitterPolicy::new(settings.cache.jitter_fraction),
            settings.cache.negative_ttl(),
            Arc::clone(&metrics),
        );
        let guard = StampedeGuard::new(backends.locks, cache.clone(), settings.lock.clone());

        Ok(Self {
            store,
            filter: RwLock::new(Arc::new(filter)),
            pending: Mutex::new(None),
            rebuild_lock: tokio::sync::Mutex::new(()),
            cache,
            guard,
            settings,
            metrics,
        })
    }

    /// Looks up an entity.
    ///
    /// `Ok(None)` means not found: either the filter ruled the id out, or the
    /// backing store confirmed it is missing (possibly from a cached marker).
    ///
    /// # Errors
    ///
    /// Only backing-store failures are returned.
    pub async fn get(&self, id: &str) -> Result<Option<V>, LookupError> {
        if !self.filter.read().might_contain(id) {
            debug!(id = %id, "Blocked by membership filter");
            self.metrics.filter_block();
            return Ok(None);
        }
        self.metrics.filter_pass();

        let key = self.entity_key(id);
        if let Some(cached) = self.cache.get::<V>(&key).await {
            return Ok(cached.into_option());
        }

        let base_ttl = self.settings.cache.base_ttl();
        let fetch = || self.store.fetch_by_id(id);

        let value = if self.settings.hot_keys.is_hot(id) {
            let (value, _path) = self.guard.fetch_with_guard(&key, base_ttl, fetch).await?;
            value
        } else {
            self.guard.fetch_unguarded(&key, base_ttl, fetch).await?
        };

        Ok(value)
    }

    /// Records a committed create: the id becomes visible to the filter and
    /// the entity is written through to the cache.
    pub async fn on_created(&self, id: &str, value: &V) -> InvalidationResult {
        {
            // Held across both steps so a concurrent rebuild either sees the
            // pending id or has already swapped in the filter we add to.
            let filter = self.filter.read();
            filter.add(id);
            if let Some(pending) = self.pending.lock().as_mut() {
                pending.push(id.to_string());
            }
            if filter.is_saturated() {
                warn!(
                    inserted = filter.inserted(),
                    expected = filter.params().expected_items,
                    "Membership filter past its sizing, consider a rebuild"
                );
            }
        }

        self.cache
            .put(&self.entity_key(id), value, self.settings.cache.base_ttl())
            .await;
        self.invalidate_derived().await
    }

    /// Records a committed update by refreshing the cached entity.
    pub async fn on_updated(&self, id: &str, value: &V) -> InvalidationResult {
        self.cache
            .put(&self.entity_key(id), value, self.settings.cache.base_ttl())
            .await;
        self.invalidate_derived().await
    }

    /// Records a committed delete.
    ///
    /// The id stays in the filter; lookups for it reach the cache and then
    /// the store, which reports it missing.
    pub async fn on_deleted(&self, id: &str) -> InvalidationResult {
        let key = self.entity_key(id);
        let removed = self.cache.invalidate(&key).await;

        let mut result = self.invalidate_derived().await;
        result.count += usize::from(removed);
        result.patterns.insert(0, key.to_string());
        result
    }

    /// Read-through for derived results (search pages, listings by filter).
    ///
    /// Derived keys are not in the membership filter and are not guarded;
    /// they are dropped wholesale on every entity write.
    pub async fn get_derived<D, F, Fut>(&self, query_key: &str, fetch: F) -> Result<D, LookupError>
    where
        D: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<D, StoreError>>,
    {
        let key = CacheKey::new(&self.settings.cache.search_namespace, query_key);

        if let Some(cached) = self.cache.get::<D>(&key).await
            && let Some(value) = cached.into_option()
        {
            return Ok(value);
        }

        let value = fetch().await?;
        self.cache
            .put(&key, &value, self.settings.cache.search_ttl())
            .await;
        Ok(value)
    }

    /// Re-enumerates keys and swaps in a freshly sized filter.
    ///
    /// Lookups keep using the old filter until the swap. Ids created during
    /// the enumeration are replayed into the new filter before it is
    /// published, so no id is lost.
    ///
    /// # Errors
    ///
    /// On a store failure the current filter is kept.
    pub async fn rebuild_filter(&self) -> Result<FilterParams, LookupError> {
        let _rebuilding = self.rebuild_lock.lock().await;
        *self.pending.lock() = Some(Vec::new());

        let built = build_filter(self.store.as_ref(), &self.settings).await;

        let filter = match built {
            Ok(filter) => filter,
            Err(e) => {
                self.pending.lock().take();
                return Err(e.into());
            },
        };

        let params = *filter.params();
        {
            let mut current = self.filter.write();
            if let Some(pending) = self.pending.lock().take() {
                for id in &pending {
                    filter.add(id.as_str());
                }
            }
            *current = Arc::new(filter);
        }

        info!(
            bits = params.num_bits,
            hashes = params.num_hashes,
            "Membership filter rebuilt"
        );
        Ok(params)
    }

    /// The filter currently used by lookups.
    pub fn filter_snapshot(&self) -> Arc<MembershipFilter> {
        Arc::clone(&self.filter.read())
    }

    pub fn cache(&self) -> &CacheLayer {
        &self.cache
    }

    pub fn settings(&self) -> &GuardSettings {
        &self.settings
    }

    /// Cache key of an entity in the entity namespace.
    pub fn entity_key(&self, id: &str) -> CacheKey {
        CacheKey::new(&self.settings.cache.namespace, id)
    }

    async fn invalidate_derived(&self) -> InvalidationResult {
        self.cache
            .invalidate_all(&self.settings.cache.search_namespace)
            .await
    }
}

async fn build_filter<V: Send>(
    store: &dyn BackingStore<V>,
    settings: &GuardSettings,
) -> Result<MembershipFilter, StoreError> {
    let keys = store.list_all_keys().await?;
    let key_count = keys.len();

    let filter = MembershipFilter::initialize_with_capacity(
        keys.iter().map(String::as_str),
        settings.filter.expected_items,
        settings.filter.false_positive_rate,
    );

    let params = filter.params();
    info!(
        store = store.name(),
        keys = key_count,
        bits = params.num_bits,
        hashes = params.num_hashes,
        sized_fpp = params.expected_fpp(params.expected_items),
        current_fpp = params.expected_fpp(key_count),
        "Membership filter initialized"
    );

    Ok(filter)
}
