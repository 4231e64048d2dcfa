//! End-to-end worker launch tests: real fork, real Rhai engine.
//!
//! Kept as a single test function so the test binary never forks from a
//! multi-threaded harness.

use moray_cache::InMemoryCache;
use moray_config::Prefs;
use moray_core::HostInfo;
use moray_plugins::{control_pair, ControlMessage, ExecutionContext, PluginLauncher};
use moray_scripting::{Kb, RhaiEngine};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const OK_PLUGIN: &str = r#"
    if describe_mode {
        script_oid("1.3.6.1.4.1.25623.1.0.1");
        script_name("Worker Test");
    } else {
        kb_set("worker/ran", target);
    }
"#;

const FAILING_PLUGIN: &str = r#"
    if !describe_mode {
        throw "interpreter internal error";
    }
"#;

fn write_plugin(dir: &tempfile::TempDir, name: &str, code: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, code).unwrap();
    path
}

#[test]
fn concurrent_workers_each_signal_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let ok_path = write_plugin(&dir, "ok.rhai", OK_PLUGIN);
    let bad_path = write_plugin(&dir, "bad.rhai", FAILING_PLUGIN);

    let prefs = Prefs::new();
    prefs.set("nasl_no_signature_check", "yes");

    let cache = Arc::new(InMemoryCache::new());
    let launcher = PluginLauncher::new(cache, Arc::new(RhaiEngine::new()));

    // Three healthy workers plus one whose interpreter run fails.
    let plan = [
        ("ok.rhai", &ok_path),
        ("ok.rhai", &ok_path),
        ("ok.rhai", &ok_path),
        ("bad.rhai", &bad_path),
    ];

    let mut monitors = Vec::new();
    let mut handles = Vec::new();
    for (name, path) in plan {
        let (worker, monitor) = control_pair().unwrap();
        let ctx = ExecutionContext {
            prefs: prefs.clone(),
            host: HostInfo::new("localhost"),
            kb: Kb::new(),
            plugin_name: name.to_string(),
            oid: "1.3.6.1.4.1.25623.1.0.1".to_string(),
            path: path.clone(),
            control: worker,
        };
        let handle = launcher.launch(ctx).unwrap();
        handles.push(handle);
        monitors.push(monitor);
    }

    // N launches, N independent handles.
    assert_eq!(handles.len(), 4);
    assert_eq!(launcher.running_workers().len(), 4);
    let mut pids: Vec<i32> = handles.iter().map(|h| h.pid()).collect();
    pids.sort_unstable();
    pids.dedup();
    assert_eq!(pids.len(), 4);

    // Each worker emits exactly one completion marker, the failing one
    // included.
    for monitor in &mut monitors {
        monitor
            .set_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        assert_eq!(monitor.recv().unwrap(), ControlMessage::Finished);
        monitor
            .set_timeout(Some(Duration::from_millis(100)))
            .unwrap();
        assert!(monitor.recv().is_err(), "worker sent a second marker");
    }

    // All workers exited cleanly; a failed plugin run is not a failed
    // worker.
    for handle in handles {
        assert_eq!(handle.wait().unwrap(), 0);
    }
}
