//! # Moray Core
//!
//! Core types and error handling for the Moray scanner.
//!
//! This crate provides the foundational abstractions shared by the other
//! scanner crates:
//! - Plugin descriptors and declared preferences
//! - Target host descriptors
//! - Error types

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{HostInfo, PluginInfo, Preference};
