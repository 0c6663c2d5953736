//! Error types for the external collaborators.

/// Failures of the cache backend or the lock coordinator.
///
/// These never reach a lookup caller: the cache layer and the stampede guard
/// degrade to a miss or an unguarded fetch instead.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend could not be reached.
    #[error("{backend} unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    /// The backend did not answer in time.
    #[error("{backend} timed out after {millis}ms")]
    Timeout { backend: String, millis: u64 },

    /// A bulk-delete pattern was rejected.
    #[error("invalid key pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The lease expired and the lock now belongs to someone else (or no one).
    #[error("lease on {key} is no longer held")]
    LeaseLost { key: String },
}

impl BackendError {
    /// Creates a new unavailable error.
    pub fn unavailable(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Failures of the backing store. These are the only errors a lookup surfaces.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("backing store unavailable: {reason}")]
    Unavailable { reason: String },

    /// The store did not answer in time.
    #[error("backing store timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The query itself failed.
    #[error("backing store query failed: {0}")]
    Query(String),
}

impl StoreError {
    /// Creates a new unavailable error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BackendError::unavailable("redis", "connection refused");
        assert_eq!(err.to_string(), "redis unavailable: connection refused");

        let err = BackendError::LeaseLost {
            key: "lock:housing-listings:1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "lease on lock:housing-listings:1 is no longer held"
        );

        let err = StoreError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "backing store query failed: syntax error");
    }

    #[test]
    fn test_is_transient() {
        assert!(BackendError::unavailable("moka", "down").is_transient());
        assert!(
            BackendError::Timeout {
                backend: "redis".to_string(),
                millis: 50
            }
            .is_transient()
        );
        assert!(
            !BackendError::LeaseLost {
                key: "k".to_string()
            }
            .is_transient()
        );

        assert!(StoreError::unavailable("network").is_transient());
        assert!(StoreError::Timeout { seconds: 3 }.is_transient());
        assert!(!StoreError::Query("bad".to_string()).is_transient());
    }
}
