//! Shared scanner types

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// A preference declared by a plugin: name, type, and default value.
///
/// Preferences are merged into the global preference store under a
/// composite key of the form `"<pluginName>[<kind>]:<name>"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    /// Preference name as declared by the plugin
    pub name: String,

    /// Preference type (`checkbox`, `entry`, `radio`, ...)
    pub kind: String,

    /// Default value
    pub default: String,
}

impl Preference {
    /// Create a new preference declaration
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            default: default.into(),
        }
    }
}

/// A plugin's descriptor: identity plus declared preferences.
///
/// The OID is the plugin's identity. A descriptor whose `oid` is `None` is
/// invalid or incomplete and must never be committed to the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Unique plugin identifier, assigned by the plugin itself during
    /// the describe phase. `None` until parsing completes.
    pub oid: Option<String>,

    /// Human-readable plugin name
    pub name: String,

    /// Preferences in declaration order
    #[serde(default)]
    pub preferences: Vec<Preference>,
}

impl PluginInfo {
    /// Create a fresh, empty descriptor
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether this descriptor carries a valid identity
    pub fn has_oid(&self) -> bool {
        self.oid.is_some()
    }
}

/// Target host descriptor handed to each worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    /// Host name as given by the scan scheduler
    pub name: String,

    /// Resolved address, if known
    pub ip: Option<IpAddr>,
}

impl HostInfo {
    /// Create a host descriptor from a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ip: None,
        }
    }

    /// Create a host descriptor with a resolved address
    pub fn with_ip(name: impl Into<String>, ip: IpAddr) -> Self {
        Self {
            name: name.into(),
            ip: Some(ip),
        }
    }
}
