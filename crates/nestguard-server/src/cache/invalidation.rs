//! Cache invalidation with pattern matching support.

use nestguard_core::CacheKey;
use tracing::{info, warn};

use crate::cache::CacheLayer;

/// Resultado de una operación de invalidación.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationResult {
    /// Número de entries invalidadas.
    pub count: usize,
    /// Patrones aplicados.
    pub patterns: Vec<String>,
}

impl CacheLayer {
    /// Invalida todas las entradas de un namespace.
    ///
    /// Used after every write for namespaces holding derived data (search
    /// results), which cannot be patched entry by entry.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use std::time::Duration;
    /// # use nestguard_core::{JitterPolicy, NoopMetrics};
    /// # use nestguard_backends::memory::MokaCacheBackend;
    /// # use nestguard_server::cache::CacheLayer;
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let layer = CacheLayer::new(
    /// #     Arc::new(MokaCacheBackend::default()),
    /// #     JitterPolicy::default(),
    /// #     Duration::from_secs(60),
    /// #     Arc::new(NoopMetrics),
    /// # );
    /// let result = layer.invalidate_all("housing-search").await;
    /// println!("Invalidated {} entries", result.count);
    /// # }
    /// ```
    pub async fn invalidate_all(&self, namespace: &str) -> InvalidationResult {
        let pattern = CacheKey::namespace_pattern(namespace);
        self.invalidate_by_pattern(&pattern).await
    }

    /// Invalida entradas usando un patrón glob sobre la key completa
    /// (`namespace::id`).
    ///
    /// - `*`: coincide con cualquier secuencia de caracteres
    /// - `?`: coincide con un carácter
    ///
    /// An invalid pattern or a backend failure invalidates nothing; the
    /// entries then age out through their TTL.
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> InvalidationResult {
        let count = match self.backend().delete_matching(pattern).await {
            Ok(count) => count,
            Err(e) => {
                warn!(
                    pattern = %pattern,
                    backend = self.backend().name(),
                    error = %e,
                    "Pattern invalidation failed"
                );
                self.metrics().cache_error("invalidate_pattern");
                0
            },
        };

        info!(pattern = %pattern, count = count, "Cache entries invalidated by pattern");

        InvalidationResult {
            count,
            patterns: vec![pattern.to_string()],
        }
    }

    /// Invalida múltiples patrones a la vez.
    pub async fn invalidate_by_patterns(&self, patterns: &[&str]) -> InvalidationResult {
        let mut total_count = 0;
        let mut all_patterns = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let result = self.invalidate_by_pattern(pattern).await;
            total_count += result.count;
            all_patterns.extend(result.patterns);
        }

        InvalidationResult {
            count: total_count,
            patterns: all_patterns,
        }
    }
}
