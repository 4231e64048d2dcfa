//! # Moray Config
//!
//! Process-wide preference store for the Moray scanner.
//!
//! Preferences are flat `key = value` string pairs. The scheduler creates
//! one [`Prefs`] handle before any plugin is loaded and passes it by handle
//! everywhere; nothing in the scanner reads ambient global state. During
//! the launch phase the store is treated as read-only.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod loader;
pub mod prefs;

pub use loader::load_prefs;
pub use prefs::Prefs;
