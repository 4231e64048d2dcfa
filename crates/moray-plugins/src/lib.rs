//! # Moray Plugins
//!
//! Plugin resolution and execution for the Moray scanner.
//!
//! Two independent components, composed by the scan scheduler:
//!
//! - [`PluginLoader`] resolves a plugin's descriptor (cache hit or
//!   parse-on-miss), corrects anomalous file timestamps, commits valid
//!   descriptors to the cache, and merges declared preferences into the
//!   global preference store.
//! - [`PluginLauncher`] forks one isolated worker process per plugin
//!   invocation and guarantees exactly one completion marker on the
//!   control channel regardless of how the plugin run ends.
//!
//! The isolation unit is an OS process: a crashing or hanging plugin
//! cannot corrupt the scheduler or sibling plugins. Waiting, timeouts, and
//! termination policy belong to the scheduler, acting on [`WorkerHandle`].

#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod control;
pub mod launch;
pub mod loader;
pub mod process;

pub use control::{control_pair, ControlMessage, MonitorChannel, WorkerChannel};
pub use launch::{ExecutionContext, PluginLauncher, WorkerHandle};
pub use loader::PluginLoader;
pub use process::DropOutcome;
