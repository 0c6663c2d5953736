//! Tunables for the filter, the cache layer and the stampede guard.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Upper bound for every cache TTL (one year).
pub const MAX_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;

/// All settings of the protected cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardSettings {
    pub filter: FilterSettings,
    pub cache: CacheSettings,
    pub lock: LockSettings,
    pub hot_keys: HotKeyPolicy,
}

impl GuardSettings {
    /// Checks every section and the relations between them.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.filter.validate()?;
        self.cache.validate()?;
        self.lock.validate()?;
        Ok(())
    }
}

/// Membership filter sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Minimum number of keys the filter is sized for (default: 1_000_000).
    /// The actual capacity is the larger of this and the startup key count.
    pub expected_items: usize,
    /// Target false-positive rate (default: 0.01).
    pub false_positive_rate: f64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            expected_items: 1_000_000,
            false_positive_rate: 0.01,
        }
    }
}

impl FilterSettings {
    fn validate(&self) -> Result<(), SettingsError> {
        if !(self.false_positive_rate > 0.0 && self.false_positive_rate < 1.0) {
            return Err(SettingsError::out_of_range(
                "filter.false_positive_rate",
                format!("{} is not in (0, 1)", self.false_positive_rate),
            ));
        }
        Ok(())
    }
}

/// Cache layer TTLs and namespaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Namespace of single-entity entries (default: "housing-listings").
    pub namespace: String,
    /// Namespace of derived search/listing results (default: "housing-search").
    pub search_namespace: String,
    /// Base TTL for entity entries in seconds (default: 600).
    pub base_ttl_seconds: u64,
    /// Base TTL for derived results in seconds (default: 300).
    pub search_ttl_seconds: u64,
    /// TTL for confirmed-absent markers in seconds (default: 60). Capped at
    /// `base_ttl_seconds`.
    pub negative_ttl_seconds: u64,
    /// Jitter fraction applied to every TTL (default: 0.2).
    pub jitter_fraction: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            namespace: "housing-listings".to_string(),
            search_namespace: "housing-search".to_string(),
            base_ttl_seconds: 600,
            search_ttl_seconds: 300,
            negative_ttl_seconds: 60,
            jitter_fraction: 0.2,
        }
    }
}

impl CacheSettings {
    pub fn base_ttl(&self) -> Duration {
        Duration::from_secs(self.base_ttl_seconds)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_seconds)
    }

    pub fn negative_ttl(&self) -> Duration {
        Duration::from_secs(self.negative_ttl_seconds.min(self.base_ttl_seconds))
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.namespace.is_empty() {
            return Err(SettingsError::Empty("cache.namespace"));
        }
        if self.search_namespace.is_empty() {
            return Err(SettingsError::Empty("cache.search_namespace"));
        }
        if self.namespace == self.search_namespace {
            return Err(SettingsError::Inconsistent(
                "cache.namespace and cache.search_namespace must differ".to_string(),
            ));
        }
        if self.base_ttl_seconds == 0 {
            return Err(SettingsError::out_of_range(
                "cache.base_ttl_seconds",
                "must be greater than 0",
            ));
        }
        for (field, value) in [
            ("cache.base_ttl_seconds", self.base_ttl_seconds),
            ("cache.search_ttl_seconds", self.search_ttl_seconds),
            ("cache.negative_ttl_seconds", self.negative_ttl_seconds),
        ] {
            if value > MAX_TTL_SECONDS {
                return Err(SettingsError::out_of_range(
                    field,
                    format!("{} exceeds {}", value, MAX_TTL_SECONDS),
                ));
            }
        }
        if !(0.0..1.0).contains(&self.jitter_fraction) {
            return Err(SettingsError::out_of_range(
                "cache.jitter_fraction",
                format!("{} is not in [0, 1)", self.jitter_fraction),
            ));
        }
        Ok(())
    }
}

/// Stampede guard lock timings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// Maximum time to wait for the per-key lock (default: 5000).
    pub wait_timeout_ms: u64,
    /// Lease after which a held lock expires on its own (default: 10000).
    pub lease_timeout_ms: u64,
    /// Pause before the final cache re-check after a wait timeout (default: 500).
    pub fallback_pause_ms: u64,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 5_000,
            lease_timeout_ms: 10_000,
            fallback_pause_ms: 500,
        }
    }
}

impl LockSettings {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn lease_timeout(&self) -> Duration {
        Duration::from_millis(self.lease_timeout_ms)
    }

    pub fn fallback_pause(&self) -> Duration {
        Duration::from_millis(self.fallback_pause_ms)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.lease_timeout_ms == 0 {
            return Err(SettingsError::out_of_range(
                "lock.lease_timeout_ms",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Which keys get stampede protection on a cache miss.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotKeyPolicy {
    /// Every key is guarded.
    #[default]
    All,
    /// No key is guarded; misses go straight to the backing store.
    None,
    /// Only the listed ids are guarded.
    Listed(BTreeSet<String>),
}

impl HotKeyPolicy {
    /// Builds a `Listed` policy.
    pub fn listed<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        HotKeyPolicy::Listed(ids.into_iter().map(Into::into).collect())
    }

    /// True if misses for `id` go through the stampede guard.
    pub fn is_hot(&self, id: &str) -> bool {
        match self {
            HotKeyPolicy::All => true,
            HotKeyPolicy::None => false,
            HotKeyPolicy::Listed(ids) => ids.contains(id),
        }
    }
}
