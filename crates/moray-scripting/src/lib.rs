//! # Moray Scripting
//!
//! The interpreter seam of the Moray scanner.
//!
//! [`ScriptEngine`] abstracts over the plugin language. Plugins are executed
//! in two modes: *describe* (metadata only, fills in the descriptor) and
//! *run* (the actual vulnerability test against a target). [`RhaiEngine`]
//! is the built-in implementation.

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod context;
pub mod engine;
pub mod error;
pub mod kb;
pub mod rhai_engine;

pub use context::ScriptContext;
pub use engine::{ExecMode, ScriptEngine};
pub use error::{Result, ScriptError};
pub use kb::Kb;
pub use rhai_engine::RhaiEngine;
