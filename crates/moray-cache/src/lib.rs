//! # Moray Cache
//!
//! Plugin metadata cache for the Moray scanner.
//!
//! The cache maps plugin file names to their descriptors so a plugin only
//! has to be parsed once per feed update. Backends are pluggable behind
//! [`MetadataCache`]; the in-memory backend serves single-process
//! deployments and tests, while connection-oriented backends (Redis-style)
//! can slot in without touching the loader or the launcher.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod backend;
pub mod inmemory;

pub use backend::MetadataCache;
pub use inmemory::InMemoryCache;
