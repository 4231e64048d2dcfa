//! In-memory metadata cache implementation

use crate::MetadataCache;
use dashmap::DashMap;
use moray_core::{Error, PluginInfo, Result};
use std::sync::Arc;
use tracing::trace;

/// In-memory metadata cache.
///
/// Descriptors are stored serialized, so `get` always hands back an
/// independently owned copy rather than a view into shared state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCache {
    entries: Arc<DashMap<String, Vec<u8>>>,
}

impl InMemoryCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached descriptors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// File names of all cached plugins
    pub fn filenames(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }
}

impl MetadataCache for InMemoryCache {
    fn get(&self, filename: &str) -> Result<Option<PluginInfo>> {
        match self.entries.get(filename) {
            Some(bytes) => {
                let info: PluginInfo = serde_json::from_slice(bytes.value())?;
                trace!(plugin = filename, "Cache hit");
                Ok(Some(info))
            }
            None => {
                trace!(plugin = filename, "Cache miss");
                Ok(None)
            }
        }
    }

    fn add(&self, info: &PluginInfo, filename: &str) -> Result<()> {
        if info.oid.is_none() {
            return Err(Error::InvalidCachedEntry(filename.to_string()));
        }

        let bytes = serde_json::to_vec(info)?;
        self.entries.insert(filename.to_string(), bytes);
        trace!(plugin = filename, "Descriptor cached");
        Ok(())
    }

    fn reset(&self) {
        // The in-memory backend holds no cross-process connection; the
        // worker's call lands here so connection-backed implementations can
        // reconnect without launcher changes.
        trace!("Cache handle reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moray_core::Preference;

    fn descriptor(oid: &str) -> PluginInfo {
        PluginInfo {
            oid: Some(oid.to_string()),
            name: "Test Plugin".to_string(),
            preferences: vec![Preference::new("Timeout", "entry", "5")],
        }
    }

    #[test]
    fn test_add_then_get() {
        let cache = InMemoryCache::new();
        let info = descriptor("1.3.6.1.4.1.25623.1.0.10330");

        cache.add(&info, "test.rhai").unwrap();
        let fetched = cache.get("test.rhai").unwrap().unwrap();
        assert_eq!(fetched, info);
    }

    #[test]
    fn test_miss_returns_none() {
        let cache = InMemoryCache::new();
        assert!(cache.get("absent.rhai").unwrap().is_none());
    }

    #[test]
    fn test_rejects_descriptor_without_oid() {
        let cache = InMemoryCache::new();
        let info = PluginInfo {
            oid: None,
            name: "Broken".to_string(),
            preferences: Vec::new(),
        };

        let result = cache.add(&info, "broken.rhai");
        assert!(matches!(result, Err(Error::InvalidCachedEntry(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_add_replaces_existing_entry() {
        let cache = InMemoryCache::new();
        cache.add(&descriptor("1.0"), "p.rhai").unwrap();
        cache.add(&descriptor("2.0"), "p.rhai").unwrap();

        let fetched = cache.get("p.rhai").unwrap().unwrap();
        assert_eq!(fetched.oid.as_deref(), Some("2.0"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_returns_owned_copy() {
        let cache = InMemoryCache::new();
        cache.add(&descriptor("1.0"), "p.rhai").unwrap();

        let mut first = cache.get("p.rhai").unwrap().unwrap();
        first.name = "mutated".to_string();

        let second = cache.get("p.rhai").unwrap().unwrap();
        assert_eq!(second.name, "Test Plugin");
    }
}
