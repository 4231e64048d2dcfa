//! Moray CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use moray_cache::{InMemoryCache, MetadataCache};
use moray_config::{load_prefs, Prefs};
use moray_core::HostInfo;
use moray_plugins::{control_pair, ExecutionContext, PluginLauncher, PluginLoader};
use moray_scripting::{Kb, RhaiEngine};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "moray")]
#[command(about = "Moray vulnerability scanner", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a preference file
    Validate {
        /// Path to the preference file
        #[arg(short, long, default_value = "moray.toml")]
        prefs: PathBuf,
    },

    /// Load a plugin folder and report what registered
    Load {
        /// Plugin folder
        folder: PathBuf,

        /// Path to the preference file
        #[arg(short, long)]
        prefs: Option<PathBuf>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(short, long, default_value = "info")]
        log_level: String,
    },

    /// Load a plugin folder and run every plugin against a target
    Scan {
        /// Plugin folder
        folder: PathBuf,

        /// Target host
        #[arg(short, long)]
        target: String,

        /// Path to the preference file
        #[arg(short, long)]
        prefs: Option<PathBuf>,

        /// Per-plugin completion timeout in seconds
        #[arg(long, default_value_t = 60)]
        timeout: u64,

        /// Log level (trace, debug, info, warn, error)
        #[arg(short, long, default_value = "info")]
        log_level: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { prefs } => {
            tracing_subscriber::fmt().with_target(false).init();

            match load_prefs(&prefs) {
                Ok(p) => {
                    tracing::info!("Preference file is valid: {} entries", p.len());
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("Preference file validation failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Load {
            folder,
            prefs,
            log_level,
        } => {
            init_tracing(&log_level)?;

            let prefs = resolve_prefs(prefs)?;
            let cache = Arc::new(InMemoryCache::new());
            let engine = Arc::new(RhaiEngine::new());
            let loader = PluginLoader::new(cache.clone(), engine, prefs.clone());

            let loaded = loader.load_directory(&folder)?;
            for name in &loaded {
                if let Some(info) = cache.get(name)? {
                    tracing::info!(
                        plugin = %name,
                        oid = info.oid.as_deref().unwrap_or("-"),
                        name = %info.name,
                        preferences = info.preferences.len(),
                        "Registered"
                    );
                }
            }
            tracing::info!(
                loaded = loaded.len(),
                preferences = prefs.len(),
                "Plugin load complete"
            );
            Ok(())
        }

        Commands::Scan {
            folder,
            target,
            prefs,
            timeout,
            log_level,
        } => {
            init_tracing(&log_level)?;

            let prefs = resolve_prefs(prefs)?;
            let cache = Arc::new(InMemoryCache::new());
            let engine = Arc::new(RhaiEngine::new());
            let loader = PluginLoader::new(cache.clone(), engine.clone(), prefs.clone());

            let loaded = loader.load_directory(&folder)?;
            if loaded.is_empty() {
                tracing::warn!(folder = %folder.display(), "No plugins registered, nothing to scan");
                return Ok(());
            }

            let host = match target.parse() {
                Ok(ip) => HostInfo::with_ip(&target, ip),
                Err(_) => HostInfo::new(&target),
            };
            let kb = Kb::new();
            let launcher = PluginLauncher::new(cache.clone(), engine);

            let mut workers = Vec::new();
            for name in &loaded {
                let Some(info) = cache.get(name)? else {
                    continue;
                };
                let Some(oid) = info.oid else {
                    continue;
                };

                let (control, monitor) = control_pair()?;
                let ctx = ExecutionContext {
                    prefs: prefs.clone(),
                    host: host.clone(),
                    kb: kb.clone(),
                    plugin_name: name.clone(),
                    oid,
                    path: folder.join(name),
                    control,
                };
                let handle = launcher.launch(ctx)?;
                workers.push((name.clone(), handle, monitor));
            }

            let launched = workers.len();
            let mut finished = 0usize;
            for (name, handle, mut monitor) in workers {
                monitor.set_timeout(Some(Duration::from_secs(timeout)))?;
                match monitor.recv() {
                    Ok(_) => finished += 1,
                    Err(e) => {
                        tracing::warn!(plugin = %name, error = %e, "No completion marker, terminating worker");
                        let _ = handle.terminate();
                    }
                }
                match handle.wait() {
                    Ok(code) => tracing::debug!(plugin = %name, code, "Worker reaped"),
                    Err(e) => tracing::warn!(plugin = %name, error = %e, "Could not reap worker"),
                }
            }

            tracing::info!(
                target = %host.name,
                launched,
                finished,
                "Scan complete"
            );
            Ok(())
        }

        Commands::Version => {
            println!("Moray vulnerability scanner");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

fn resolve_prefs(path: Option<PathBuf>) -> Result<Prefs> {
    match path {
        Some(path) => Ok(load_prefs(path)?),
        None => Ok(Prefs::new()),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_level(true),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(filter.into()))
        .init();

    Ok(())
}
