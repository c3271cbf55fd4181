//! Organization-scoped cache
//!
//! Holds values (stream schemas, templates) fetched for the current
//! organization. Entries are only valid for the org they were fetched in,
//! so switching org clears the cache.
//!
//! # Example
//!
//! ```rust
//! use logscope::cache::OrgCache;
//!
//! let mut cache: OrgCache<u32> = OrgCache::new("default");
//! cache.insert("logs", 1);
//! assert_eq!(cache.get("logs"), Some(&1));
//!
//! cache.set_org("other");
//! assert!(cache.get("logs").is_none());
//! ```

use std::collections::HashMap;

/// Values keyed by name within one organization
#[derive(Debug, Clone)]
pub struct OrgCache<V> {
    org: String,
    entries: HashMap<String, V>,
}

impl<V> OrgCache<V> {
    pub fn new(org: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            entries: HashMap::new(),
        }
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    /// Switch organization, dropping every entry if it changed
    ///
    /// Returns whether the cache was invalidated.
    pub fn set_org(&mut self, org: &str) -> bool {
        if self.org == org {
            return false;
        }

        tracing::debug!(
            from = %self.org,
            to = %org,
            evicted = self.entries.len(),
            "Organization changed, clearing cache"
        );
        self.org = org.to_string();
        self.entries.clear();
        true
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        self.entries.insert(key.into(), value)
    }

    /// Cached value, computing and storing it on a miss
    pub fn get_or_insert_with<F>(&mut self, key: &str, f: F) -> &V
    where
        F: FnOnce() -> V,
    {
        self.entries.entry(key.to_string()).or_insert_with(f)
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_org_keeps_entries() {
        let mut cache = OrgCache::new("default");
        cache.insert("logs", vec!["_timestamp"]);

        assert!(!cache.set_org("default"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_org_change_clears() {
        let mut cache = OrgCache::new("a");
        cache.insert("logs", 1);
        cache.insert("traces", 2);

        assert!(cache.set_org("b"));
        assert_eq!(cache.org(), "b");
        assert!(cache.is_empty());
        assert!(cache.get("logs").is_none());
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut cache = OrgCache::new("a");
        let mut calls = 0;

        assert_eq!(*cache.get_or_insert_with("logs", || {
            calls += 1;
            5
        }), 5);
        assert_eq!(*cache.get_or_insert_with("logs", || {
            calls += 1;
            6
        }), 5);
        assert_eq!(calls, 1);

        assert_eq!(cache.remove("logs"), Some(5));
        cache.insert("x", 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
