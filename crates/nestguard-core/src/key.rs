//! Cache and lock key derivation.

use std::fmt;

/// Key of a cached entity: a namespace (one per cache region) plus an id.
///
/// Renders as `namespace::id`; the matching distributed lock key is
/// `lock:namespace:id`, so lock keys never collide with cache keys or with
/// locks taken for other namespaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: String,
    id: String,
}

impl CacheKey {
    /// Separator between namespace and id in rendered cache keys.
    pub const SEPARATOR: &'static str = "::";

    /// Creates a key. Namespace and id are kept verbatim.
    ///
    /// # Examples
    ///
    /// ```
    /// use nestguard_core::CacheKey;
    ///
    /// let key = CacheKey::new("housing-listings", 42.to_string());
    /// assert_eq!(key.to_string(), "housing-listings::42");
    /// assert_eq!(key.lock_key(), "lock:housing-listings:42");
    /// ```
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            id: id.into(),
        }
    }

    /// Returns the namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the entity id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Key of the distributed lock protecting this entry during a guarded fetch.
    pub fn lock_key(&self) -> String {
        format!("lock:{}:{}", self.namespace, self.id)
    }

    /// Glob pattern matching every key of `namespace`.
    ///
    /// Glob metacharacters inside the namespace are escaped so they match
    /// literally.
    pub fn namespace_pattern(namespace: &str) -> String {
        let mut pattern = String::with_capacity(namespace.len() + 3);
        for c in namespace.chars() {
            match c {
                '*' | '?' | '[' | ']' => {
                    pattern.push('[');
                    pattern.push(c);
                    pattern.push(']');
                },
                _ => pattern.push(c),
            }
        }
        pattern.push_str(Self::SEPARATOR);
        pattern.push('*');
        pattern
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, Self::SEPARATOR, self.id)
    }
}
