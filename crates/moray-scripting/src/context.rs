//! Script execution context

use crate::Kb;
use moray_core::{HostInfo, PluginInfo};
use std::os::unix::io::RawFd;

/// Context handed to the engine for one plugin execution.
///
/// In describe mode the engine fills in [`ScriptContext::info`]; in run
/// mode the engine reads the target host and knowledge base and may report
/// through the recorded control-channel descriptor.
#[derive(Debug)]
pub struct ScriptContext {
    /// Plugin name (file name until the describe phase names it)
    pub plugin: String,

    /// Target host, absent in describe mode
    pub host: Option<HostInfo>,

    /// Knowledge-base handle
    pub kb: Kb,

    /// Descriptor under construction (describe mode output)
    pub info: PluginInfo,

    /// Control-channel descriptor recorded by the worker so results can be
    /// relayed out of band
    pub control_fd: Option<RawFd>,
}

impl ScriptContext {
    /// Context for a metadata-only run
    pub fn describe(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            host: None,
            kb: Kb::new(),
            info: PluginInfo::new(),
            control_fd: None,
        }
    }

    /// Context for executing a plugin body against a target
    pub fn run(plugin: impl Into<String>, host: HostInfo, kb: Kb) -> Self {
        Self {
            plugin: plugin.into(),
            host: Some(host),
            kb,
            info: PluginInfo::new(),
            control_fd: None,
        }
    }

    /// Consume the context, yielding the collected descriptor
    pub fn into_info(self) -> PluginInfo {
        self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_context_is_hostless() {
        let ctx = ScriptContext::describe("ssh_detect.rhai");
        assert!(ctx.host.is_none());
        assert!(ctx.info.oid.is_none());
        assert!(ctx.control_fd.is_none());
    }

    #[test]
    fn test_run_context_carries_host() {
        let kb = Kb::new();
        let ctx = ScriptContext::run("ssh_detect.rhai", HostInfo::new("example.org"), kb);
        assert_eq!(ctx.host.as_ref().unwrap().name, "example.org");
    }
}
