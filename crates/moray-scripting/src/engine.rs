//! Script engine trait and execution mode flags

use crate::context::ScriptContext;
use crate::error::Result;
use std::fmt;
use std::path::Path;

/// Execution mode flags for one interpreter invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecMode {
    /// Metadata-only run: execute the describe phase and collect the
    /// descriptor instead of running the test body
    pub describe: bool,

    /// Treat the script as signed, bypassing the signature policy
    pub always_signed: bool,
}

impl ExecMode {
    /// Mode for the describe phase
    pub fn describe() -> Self {
        Self {
            describe: true,
            always_signed: false,
        }
    }

    /// Mode for running the plugin body
    pub fn run() -> Self {
        Self::default()
    }

    /// Set the signature bypass flag
    pub fn always_signed(mut self, yes: bool) -> Self {
        self.always_signed = yes;
        self
    }
}

/// Script engine trait.
///
/// Abstracts over the plugin language. Implementations must be callable
/// from a freshly forked worker process, so everything here is synchronous
/// and must not assume a live async runtime.
pub trait ScriptEngine: Send + Sync + fmt::Debug {
    /// Execute the plugin at `path`.
    ///
    /// `oid` is the plugin identifier when running a test body; it is
    /// `None` during the describe phase, where the script assigns its own
    /// identity into the context's descriptor.
    fn execute(
        &self,
        ctx: &mut ScriptContext,
        path: &Path,
        oid: Option<&str>,
        mode: ExecMode,
    ) -> Result<()>;
}
