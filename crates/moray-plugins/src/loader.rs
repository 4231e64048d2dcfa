//! Plugin metadata loading
//!
//! Resolves a plugin descriptor from the metadata cache, parsing the
//! plugin in describe mode on a miss. Committed descriptors are re-fetched
//! so every consumer sees the canonical cached copy. Declared preferences
//! are merged into the global preference store.

use moray_cache::MetadataCache;
use moray_config::{prefs::PREF_NO_SIGNATURE_CHECK, Prefs};
use moray_core::{Error, PluginInfo, Preference, Result};
use moray_scripting::{ExecMode, ScriptContext, ScriptEngine};
use std::ffi::CString;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Build the composite preference key for one declared preference.
///
/// Format: `"<pluginName>[<kind>]:<name>"`, with trailing whitespace
/// stripped from the preference's own name.
pub fn composite_pref_key(plugin_name: &str, pref: &Preference) -> String {
    format!("{}[{}]:{}", plugin_name, pref.kind, pref.name.trim_end())
}

/// Plugin metadata loader
pub struct PluginLoader {
    cache: Arc<dyn MetadataCache>,
    engine: Arc<dyn ScriptEngine>,
    prefs: Prefs,
}

impl std::fmt::Debug for PluginLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLoader")
            .field("prefs", &self.prefs.len())
            .finish()
    }
}

impl PluginLoader {
    /// Create a loader over a cache, an engine, and the preference store
    pub fn new(cache: Arc<dyn MetadataCache>, engine: Arc<dyn ScriptEngine>, prefs: Prefs) -> Self {
        Self {
            cache,
            engine,
            prefs,
        }
    }

    /// Register one plugin file.
    ///
    /// The descriptor is first looked up in the cache. On a miss the plugin
    /// is parsed in describe mode and, if it assigned itself an OID,
    /// committed to the cache; the canonical cached copy is then re-fetched
    /// and used downstream. Declared preferences are merged into the
    /// preference store under composite keys.
    ///
    /// Side effect: if the plugin file's modification time lies in the
    /// future, both access and modification time are rewritten to one
    /// second before now (best effort, never fatal).
    ///
    /// A failure means the plugin is discarded; the caller continues with
    /// other plugins.
    pub fn load(&self, folder: &Path, filename: &str) -> Result<()> {
        let path = folder.join(filename);
        let always_signed = self.prefs.get_bool(PREF_NO_SIGNATURE_CHECK);

        let fetched = match self.cache.get(filename)? {
            Some(info) => Some(info),
            None => {
                let mode = ExecMode::describe().always_signed(always_signed);
                let mut ctx = ScriptContext::describe(filename);
                if let Err(e) = self.engine.execute(&mut ctx, &path, None, mode) {
                    debug!(plugin = %path.display(), error = %e, "Plugin could not be loaded");
                    return Err(Error::parse(filename, e.to_string()));
                }

                // Check the plugin's mtime before caching it
                fix_future_mtime(&path);

                let parsed = ctx.into_info();
                if parsed.has_oid() {
                    self.cache.add(&parsed, filename)?;
                    // Use the canonical cached copy from here on
                    self.cache.get(filename)?
                } else {
                    // Most likely the script exited before the describe
                    // phase assigned an OID.
                    debug!(
                        plugin = filename,
                        "Plugin could not be cached and will stay invisible to clients"
                    );
                    None
                }
            }
        };

        let Some(info) = fetched else {
            debug!(plugin = filename, "Failed to load");
            return Err(Error::MissingIdentifier(filename.to_string()));
        };

        if !info.has_oid() {
            debug!(plugin = filename, "Failed to load, no OID");
            return Err(Error::InvalidCachedEntry(filename.to_string()));
        }

        self.merge_preferences(&info);
        Ok(())
    }

    /// Register every `.rhai` file in a plugin folder.
    ///
    /// A plugin that fails to load is skipped, never fatal. Returns the
    /// file names that loaded successfully, in name order.
    pub fn load_directory(&self, folder: &Path) -> Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(folder)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "rhai"))
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();

        let mut loaded = Vec::with_capacity(names.len());
        let mut failed = 0usize;
        for name in names {
            match self.load(folder, &name) {
                Ok(()) => loaded.push(name),
                Err(e) => {
                    failed += 1;
                    debug!(plugin = %name, error = %e, "Skipping plugin");
                }
            }
        }

        info!(
            folder = %folder.display(),
            loaded = loaded.len(),
            failed,
            "Plugin folder processed"
        );
        Ok(loaded)
    }

    /// Merge a descriptor's preferences into the preference store, in
    /// declaration order. Last write wins on key collision.
    fn merge_preferences(&self, info: &PluginInfo) {
        for pref in &info.preferences {
            let key = composite_pref_key(&info.name, pref);
            self.prefs.set(key, pref.default.clone());
        }
    }
}

/// Rewrite a plugin file's timestamps to `now - 1s` when its mtime lies in
/// the future, keeping cache invalidation deterministic. Best effort.
fn fix_future_mtime(path: &Path) {
    let Ok(meta) = fs::metadata(path) else {
        return;
    };
    let Ok(mtime) = meta.modified().map(unix_secs) else {
        return;
    };

    let now = unix_secs(SystemTime::now()).saturating_sub(1);
    if mtime <= now {
        return;
    }

    let Ok(cpath) = CString::new(path.as_os_str().as_bytes()) else {
        return;
    };
    let times = libc::utimbuf {
        actime: now as libc::time_t,
        modtime: now as libc::time_t,
    };
    if unsafe { libc::utime(cpath.as_ptr(), &times) } == 0 {
        debug!(plugin = %path.display(), "Timestamp was from the future; fixed");
    } else {
        debug!(plugin = %path.display(), "Timestamp is from the future and could not be fixed");
    }
}

fn unix_secs(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}
