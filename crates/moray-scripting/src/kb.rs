//! Knowledge-base handle

use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Per-scan knowledge base: a shared key/value store for intermediate
/// results (open ports, banners, detected services).
///
/// The handle is connection-oriented: after a worker is spawned it must
/// call [`Kb::rebind`] before using the store, so the connection is owned
/// by the worker process alone and never shared back to the parent.
#[derive(Debug, Clone, Default)]
pub struct Kb {
    inner: Arc<KbInner>,
}

#[derive(Debug, Default)]
struct KbInner {
    entries: DashMap<String, String>,
    bound_pid: AtomicU32,
}

impl Kb {
    /// Create a fresh knowledge base bound to the calling process
    pub fn new() -> Self {
        let kb = Self::default();
        kb.rebind();
        kb
    }

    /// Re-establish the connection for the calling process.
    ///
    /// Must be called inside a spawned worker before any other access;
    /// connections inherited across a process boundary are not valid.
    pub fn rebind(&self) {
        let pid = std::process::id();
        let previous = self.inner.bound_pid.swap(pid, Ordering::SeqCst);
        if previous != pid {
            trace!(pid, previous, "Knowledge base rebound");
        }
    }

    /// The process id the handle is currently bound to
    pub fn bound_pid(&self) -> u32 {
        self.inner.bound_pid.load(Ordering::SeqCst)
    }

    /// Store a value
    pub fn set_str(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.entries.insert(key.into(), value.into());
    }

    /// Fetch a value
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.inner.entries.get(key).map(|v| v.value().clone())
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}
