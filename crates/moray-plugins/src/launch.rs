//! Isolated plugin execution
//!
//! One forked worker process per plugin invocation. The worker owns a
//! copied execution context; no shared mutable memory survives the spawn
//! boundary. The parent blocks only for the fork itself — completion is
//! observed asynchronously through the control channel and the returned
//! [`WorkerHandle`].

use crate::control::WorkerChannel;
use crate::process::{self, DropOutcome};
use moray_cache::MetadataCache;
use moray_config::prefs::{PREF_BE_NICE, PREF_DROP_PRIVILEGES, PREF_NO_SIGNATURE_CHECK};
use moray_config::Prefs;
use moray_core::{Error, HostInfo, Result};
use moray_scripting::{ExecMode, Kb, ScriptContext, ScriptEngine};
use parking_lot::Mutex;
use std::io;
use std::os::unix::io::AsRawFd;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Everything one worker needs: moved into the spawned process and never
/// shared back.
#[derive(Debug)]
pub struct ExecutionContext {
    /// Global preference store (read-only during the launch phase)
    pub prefs: Prefs,
    /// Target host
    pub host: HostInfo,
    /// Knowledge-base handle; the worker re-binds it after the spawn
    pub kb: Kb,
    /// Plugin name
    pub plugin_name: String,
    /// Plugin identifier
    pub oid: String,
    /// Plugin file to execute
    pub path: PathBuf,
    /// Worker end of the control channel
    pub control: WorkerChannel,
}

/// Handle to one spawned worker, 1:1 with its execution context.
///
/// The launcher never waits for completion; timeout and termination policy
/// belong to the scheduler holding this handle.
#[derive(Debug)]
pub struct WorkerHandle {
    pid: libc::pid_t,
}

impl WorkerHandle {
    /// Worker process id
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Reap the worker, returning its exit code. Workers killed by a
    /// signal report `128 + signo`, shell style.
    pub fn wait(self) -> io::Result<i32> {
        let mut status: libc::c_int = 0;
        loop {
            let rv = unsafe { libc::waitpid(self.pid, &mut status, 0) };
            if rv == -1 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                return Err(err);
            }
            break;
        }

        if libc::WIFEXITED(status) {
            Ok(libc::WEXITSTATUS(status))
        } else if libc::WIFSIGNALED(status) {
            Ok(128 + libc::WTERMSIG(status))
        } else {
            Ok(-1)
        }
    }

    /// Ask the worker to terminate (SIGTERM). Used by the scheduler on
    /// timeout; this core has no cancellation of its own.
    pub fn terminate(&self) -> io::Result<()> {
        if unsafe { libc::kill(self.pid, libc::SIGTERM) } == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

/// Sends the completion marker on every exit path of the worker body,
/// including panics and interpreter errors.
struct CompletionGuard {
    channel: WorkerChannel,
}

impl CompletionGuard {
    fn new(channel: WorkerChannel) -> Self {
        Self { channel }
    }

    fn fd(&self) -> i32 {
        self.channel.as_raw_fd()
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.channel.send_finished() {
            debug!(error = %e, "Could not send completion marker");
        }
    }
}

/// Plugin process launcher
pub struct PluginLauncher {
    cache: Arc<dyn MetadataCache>,
    engine: Arc<dyn ScriptEngine>,
    running: Arc<Mutex<Vec<libc::pid_t>>>,
}

impl std::fmt::Debug for PluginLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginLauncher")
            .field("running", &self.running.lock().len())
            .finish()
    }
}

impl PluginLauncher {
    /// Create a launcher over a cache handle and an engine
    pub fn new(cache: Arc<dyn MetadataCache>, engine: Arc<dyn ScriptEngine>) -> Self {
        Self {
            cache,
            engine,
            running: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Spawn one isolated worker executing the plugin in `ctx`.
    ///
    /// Returns as soon as the fork completes. The worker sends exactly one
    /// completion marker on the context's control channel before exiting,
    /// whatever the interpreter did.
    pub fn launch(&self, ctx: ExecutionContext) -> Result<WorkerHandle> {
        let plugin = ctx.plugin_name.clone();
        match unsafe { libc::fork() } {
            -1 => Err(Error::Spawn(io::Error::last_os_error().to_string())),
            0 => {
                // Worker process. Never unwind back into the parent's
                // stack frames; the guard inside the body still fires.
                let _ = panic::catch_unwind(AssertUnwindSafe(|| self.worker_body(ctx)));
                unsafe { libc::_exit(0) }
            }
            pid => {
                self.running.lock().push(pid);
                debug!(plugin = %plugin, pid, "Worker spawned");
                Ok(WorkerHandle { pid })
            }
        }
    }

    /// Process ids of workers spawned by this launcher
    pub fn running_workers(&self) -> Vec<i32> {
        self.running.lock().clone()
    }

    /// Drop launch bookkeeping inherited from the parent. The worker's
    /// copy of the running table describes the parent's children, not its
    /// own.
    fn child_cleanup(&self) {
        self.running.lock().clear();
    }

    /// Runs entirely inside the spawned worker process.
    fn worker_body(&self, ctx: ExecutionContext) {
        let ExecutionContext {
            prefs,
            host,
            kb,
            plugin_name,
            oid,
            path,
            control,
        } = ctx;

        // Completion must be signalled on every exit path from here on.
        let guard = CompletionGuard::new(control);

        // Connections inherited from the parent are not valid here.
        self.cache.reset();

        if prefs.get_bool(PREF_BE_NICE) {
            process::renice_worker();
        }

        self.child_cleanup();

        kb.rebind();

        let mut sctx = ScriptContext::run(plugin_name.clone(), host.clone(), kb);
        sctx.control_fd = Some(guard.fd());

        process::set_process_title(&format!("moray: testing {} ({plugin_name})", host.name));

        let mode = ExecMode::run().always_signed(prefs.get_bool(PREF_NO_SIGNATURE_CHECK));

        if prefs.get_bool(PREF_DROP_PRIVILEGES) {
            match process::drop_privileges() {
                DropOutcome::Dropped | DropOutcome::NotPrivileged => {}
                DropOutcome::Failed(reason) => {
                    debug!(plugin = %plugin_name, reason, "Failed to drop privileges");
                }
            }
        }

        if let Err(e) = self.engine.execute(&mut sctx, &path, Some(&oid), mode) {
            debug!(plugin = %plugin_name, error = %e, "Plugin execution failed");
        }

        // `guard` drops here and sends the completion marker.
    }
}
