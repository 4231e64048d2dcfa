//! Metadata cache trait definition

use moray_core::{PluginInfo, Result};

/// Metadata cache backend.
///
/// Keys are plugin file names. A descriptor without an OID is invalid and
/// backends must refuse to store it.
pub trait MetadataCache: Send + Sync {
    /// Fetch the cached descriptor for a plugin file name.
    ///
    /// Returns `Ok(None)` on a cache miss.
    fn get(&self, filename: &str) -> Result<Option<PluginInfo>>;

    /// Commit a descriptor to the cache under a plugin file name.
    ///
    /// Replaces any existing entry for the same name. Fails with
    /// [`moray_core::Error::InvalidCachedEntry`] if the descriptor carries
    /// no OID.
    fn add(&self, info: &PluginInfo, filename: &str) -> Result<()>;

    /// Drop any connection state inherited across a process boundary.
    ///
    /// Called exactly once inside each spawned worker before the cache is
    /// touched; connections are not valid across `fork`.
    fn reset(&self);
}
