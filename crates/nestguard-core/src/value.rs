//! Envelope stored in the cache backend.

use serde::{Deserialize, Serialize};

/// A cached lookup result.
///
/// `Absent` records that the backing store confirmed the key does not exist,
/// so repeated lookups for keys that slip past the membership filter are
/// answered from cache too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Cached<V> {
    /// The entity as last read from the backing store.
    Present(V),
    /// The backing store reported the key as missing.
    Absent,
}

impl<V> Cached<V> {
    /// Wraps a backing-store result.
    pub fn from_option(value: Option<V>) -> Self {
        match value {
            Some(v) => Cached::Present(v),
            None => Cached::Absent,
        }
    }

    /// Unwraps into the lookup result.
    pub fn into_option(self) -> Option<V> {
        match self {
            Cached::Present(v) => Some(v),
            Cached::Absent => None,
        }
    }

    /// True for the confirmed-absent marker.
    pub fn is_absent(&self) -> bool {
        matches!(self, Cached::Absent)
    }
}

impl<V> From<Option<V>> for Cached<V> {
    fn from(value: Option<V>) -> Self {
        Self::from_option(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        let present = Cached::Present(serde_json::json!({"title": "Loft"}));
        let json = serde_json::to_string(&present).unwrap();
        assert_eq!(json, r#"{"state":"present","value":{"title":"Loft"}}"#);

        let absent: Cached<String> = Cached::Absent;
        assert_eq!(serde_json::to_string(&absent).unwrap(), r#"{"state":"absent"}"#);
    }

    #[test]
    fn test_option_conversions() {
        assert_eq!(Cached::from(Some(3)).into_option(), Some(3));
        assert!(Cached::<i32>::from(None).is_absent());
    }
}
