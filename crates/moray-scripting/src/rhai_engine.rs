//! Rhai script engine implementation

use crate::context::ScriptContext;
use crate::engine::{ExecMode, ScriptEngine};
use crate::error::{Result, ScriptError};
use crate::kb::Kb;
use moray_core::{PluginInfo, Preference};
use parking_lot::{Mutex, RwLock};
use rhai::{Engine, Scope, AST};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Rhai script engine with AST caching.
///
/// Compilation is shared across executions; each execution gets its own
/// engine instance so script-visible functions can capture per-run state.
#[derive(Debug, Default)]
pub struct RhaiEngine {
    /// Compiled AST cache (plugin path -> AST)
    ast_cache: RwLock<HashMap<PathBuf, AST>>,
    /// Cache statistics
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

/// Per-execution state captured by the script-visible functions
struct ExecState {
    plugin: String,
    info: Mutex<PluginInfo>,
    kb: Kb,
}

impl RhaiEngine {
    /// Create a new Rhai engine
    pub fn new() -> Self {
        Self::default()
    }

    /// AST cache hit count
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// AST cache miss count
    pub fn cache_misses(&self) -> u64 {
        self.cache_misses.load(Ordering::Relaxed)
    }

    /// Get or compile the AST for a plugin file
    fn get_ast(&self, path: &Path) -> Result<AST> {
        {
            let cache = self.ast_cache.read();
            if let Some(ast) = cache.get(path) {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                trace!(plugin = %path.display(), "AST cache hit");
                return Ok(ast.clone());
            }
        }

        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        let code = fs::read_to_string(path)?;

        let ast = compiler_engine()
            .compile(&code)
            .map_err(|e| ScriptError::Compilation {
                message: e.to_string(),
                line: None,
            })?;

        self.ast_cache
            .write()
            .insert(path.to_path_buf(), ast.clone());
        debug!(plugin = %path.display(), "Script compiled and cached");
        Ok(ast)
    }

    /// Enforce the signature policy for a plugin file.
    ///
    /// Cryptographic verification is delegated to the feed tooling; here a
    /// plugin counts as signed when a non-empty `<file>.asc` sibling exists.
    fn check_signature(path: &Path) -> Result<()> {
        let mut sig: OsString = path.as_os_str().to_owned();
        sig.push(".asc");

        match fs::metadata(&sig) {
            Ok(meta) if meta.len() > 0 => Ok(()),
            _ => Err(ScriptError::Rejected(format!(
                "{} has no valid signature",
                path.display()
            ))),
        }
    }

    /// Register the script-visible API on a per-execution engine
    fn register_api(engine: &mut Engine, state: &Arc<ExecState>) {
        // Describe-phase API
        let s = state.clone();
        engine.register_fn("script_oid", move |oid: &str| {
            s.info.lock().oid = Some(oid.to_string());
        });

        let s = state.clone();
        engine.register_fn("script_name", move |name: &str| {
            s.info.lock().name = name.to_string();
        });

        let s = state.clone();
        engine.register_fn(
            "script_add_preference",
            move |name: &str, kind: &str, value: &str| {
                s.info
                    .lock()
                    .preferences
                    .push(Preference::new(name, kind, value));
            },
        );

        // Knowledge base access
        let s = state.clone();
        engine.register_fn("kb_get", move |key: &str| -> String {
            s.kb.get_str(key).unwrap_or_default()
        });

        let s = state.clone();
        engine.register_fn("kb_set", move |key: &str, value: &str| {
            s.kb.set_str(key, value);
        });

        // Result reporting
        let s = state.clone();
        engine.register_fn("log_message", move |msg: &str| {
            tracing::info!(plugin = %s.plugin, script_log = msg);
        });

        let s = state.clone();
        engine.register_fn("security_message", move |msg: &str| {
            warn!(plugin = %s.plugin, finding = msg);
            s.kb
                .set_str(format!("findings/{}", s.plugin), msg.to_string());
        });
    }
}

/// Engine used only for compilation; no API registration needed since Rhai
/// resolves functions at call time.
fn compiler_engine() -> Engine {
    configured_engine()
}

fn configured_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_max_expr_depths(25, 10);
    engine.set_max_operations(100_000);
    engine.set_max_string_size(1024 * 1024);
    engine.set_max_array_size(10_000);
    engine.set_max_map_size(10_000);
    engine
}

impl ScriptEngine for RhaiEngine {
    fn execute(
        &self,
        ctx: &mut ScriptContext,
        path: &Path,
        oid: Option<&str>,
        mode: ExecMode,
    ) -> Result<()> {
        if !mode.always_signed {
            Self::check_signature(path)?;
        }

        let ast = self.get_ast(path)?;

        let state = Arc::new(ExecState {
            plugin: ctx.plugin.clone(),
            info: Mutex::new(PluginInfo::new()),
            kb: ctx.kb.clone(),
        });

        let mut engine = configured_engine();
        Self::register_api(&mut engine, &state);

        let mut scope = Scope::new();
        scope.push("describe_mode", mode.describe);
        scope.push("oid", oid.unwrap_or_default().to_string());
        scope.push(
            "target",
            ctx.host.as_ref().map(|h| h.name.clone()).unwrap_or_default(),
        );

        engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|e| ScriptError::Runtime {
                message: e.to_string(),
                line: e.position().line(),
            })?;

        if mode.describe {
            ctx.info = state.info.lock().clone();
            trace!(plugin = %ctx.plugin, oid = ?ctx.info.oid, "Describe phase finished");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DESCRIBE_SCRIPT: &str = r#"
        if describe_mode {
            script_oid("1.3.6.1.4.1.25623.1.0.900001");
            script_name("Telnet Banner Check");
            script_add_preference("Timeout", "entry", "5");
        } else {
            kb_set("telnet/banner", "checked " + target);
        }
    "#;

    fn write_plugin(dir: &tempfile::TempDir, name: &str, code: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, code).unwrap();
        path
    }

    #[test]
    fn test_describe_collects_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_plugin(&dir, "telnet.rhai", DESCRIBE_SCRIPT);

        let engine = RhaiEngine::new();
        let mut ctx = ScriptContext::describe("telnet.rhai");
        engine
            .execute(
                &mut ctx,
                &path,
                None,
                ExecMode::describe().always_signed(true),
            )
            .unwrap();

        assert_eq!(
            ctx.info.oid.as_deref(),
            Some("1.3.6.1.4.1.25623.1.0.900001")
        );
        assert_eq!(ctx.info.name, "Telnet Banner Check");
        assert_eq!(ctx.info.preferences.len(), 1);
    }

    #[test]
    fn test_run_mode_touches_kb() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_plugin(&dir, "telnet.rhai", DESCRIBE_SCRIPT);

        let engine = RhaiEngine::new();
        let kb = Kb::new();
        let mut ctx = ScriptContext::run(
            "telnet.rhai",
            moray_core::HostInfo::new("scanme.example"),
            kb.clone(),
        );
        engine
            .execute(
                &mut ctx,
                &path,
                Some("1.3.6.1.4.1.25623.1.0.900001"),
                ExecMode::run().always_signed(true),
            )
            .unwrap();

        assert_eq!(
            kb.get_str("telnet/banner").as_deref(),
            Some("checked scanme.example")
        );
    }

    #[test]
    fn test_unsigned_script_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_plugin(&dir, "telnet.rhai", DESCRIBE_SCRIPT);

        let engine = RhaiEngine::new();
        let mut ctx = ScriptContext::describe("telnet.rhai");
        let result = engine.execute(&mut ctx, &path, None, ExecMode::describe());
        assert!(matches!(result, Err(ScriptError::Rejected(_))));
    }

    #[test]
    fn test_signed_script_passes_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_plugin(&dir, "telnet.rhai", DESCRIBE_SCRIPT);
        let mut sig = fs::File::create(dir.path().join("telnet.rhai.asc")).unwrap();
        writeln!(sig, "-----BEGIN PGP SIGNATURE-----").unwrap();

        let engine = RhaiEngine::new();
        let mut ctx = ScriptContext::describe("telnet.rhai");
        engine
            .execute(&mut ctx, &path, None, ExecMode::describe())
            .unwrap();
        assert!(ctx.info.oid.is_some());
    }

    #[test]
    fn test_compilation_error_surfaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_plugin(&dir, "broken.rhai", "if { this is not rhai");

        let engine = RhaiEngine::new();
        let mut ctx = ScriptContext::describe("broken.rhai");
        let result = engine.execute(
            &mut ctx,
            &path,
            None,
            ExecMode::describe().always_signed(true),
        );
        assert!(matches!(result, Err(ScriptError::Compilation { .. })));
    }

    #[test]
    fn test_ast_cache_hit_on_second_execution() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_plugin(&dir, "telnet.rhai", DESCRIBE_SCRIPT);

        let engine = RhaiEngine::new();
        let mode = ExecMode::describe().always_signed(true);
        let mut ctx = ScriptContext::describe("telnet.rhai");
        engine.execute(&mut ctx, &path, None, mode).unwrap();
        let mut ctx = ScriptContext::describe("telnet.rhai");
        engine.execute(&mut ctx, &path, None, mode).unwrap();

        assert_eq!(engine.cache_misses(), 1);
        assert_eq!(engine.cache_hits(), 1);
    }
}
