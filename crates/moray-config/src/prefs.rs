//! Global preference store

use dashmap::DashMap;
use std::sync::Arc;

/// Preference key controlling the plugin signature check bypass
pub const PREF_NO_SIGNATURE_CHECK: &str = "nasl_no_signature_check";

/// Preference key requesting privilege reduction inside workers
pub const PREF_DROP_PRIVILEGES: &str = "drop_privileges";

/// Preference key requesting reduced worker scheduling priority
pub const PREF_BE_NICE: &str = "be_nice";

/// Shared preference store.
///
/// Cloning is cheap; all clones observe the same underlying table. The
/// loader writes plugin preferences here, workers only read.
#[derive(Debug, Clone, Default)]
pub struct Prefs {
    entries: Arc<DashMap<String, String>>,
}

impl Prefs {
    /// Create an empty preference store
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a preference. Last write wins.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Get a preference value
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    /// Interpret a preference as a boolean.
    ///
    /// `"yes"`, `"true"` and `"1"` are true; anything else, including an
    /// absent key, is false.
    pub fn get_bool(&self, key: &str) -> bool {
        matches!(
            self.get(key).as_deref(),
            Some("yes") | Some("true") | Some("1")
        )
    }

    /// Number of stored preferences
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot of all entries, for diagnostics
    pub fn snapshot(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let prefs = Prefs::new();
        prefs.set("plugins_folder", "/var/lib/moray/plugins");
        assert_eq!(
            prefs.get("plugins_folder").as_deref(),
            Some("/var/lib/moray/plugins")
        );
        assert_eq!(prefs.get("missing"), None);
    }

    #[test]
    fn test_get_bool() {
        let prefs = Prefs::new();
        prefs.set(PREF_BE_NICE, "yes");
        prefs.set(PREF_DROP_PRIVILEGES, "no");
        prefs.set("numeric", "1");

        assert!(prefs.get_bool(PREF_BE_NICE));
        assert!(!prefs.get_bool(PREF_DROP_PRIVILEGES));
        assert!(prefs.get_bool("numeric"));
        assert!(!prefs.get_bool("absent"));
    }

    #[test]
    fn test_last_write_wins() {
        let prefs = Prefs::new();
        prefs.set("k", "first");
        prefs.set("k", "second");
        assert_eq!(prefs.get("k").as_deref(), Some("second"));
        assert_eq!(prefs.len(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let prefs = Prefs::new();
        let clone = prefs.clone();
        clone.set("k", "v");
        assert_eq!(prefs.get("k").as_deref(), Some("v"));
    }
}
