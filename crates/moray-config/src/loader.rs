//! Preference file loading

use crate::Prefs;
use moray_core::{Error, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Load preferences from a TOML file of flat `key = "value"` pairs.
///
/// Unknown keys pass through verbatim; plugins declare their own keys and
/// the store does not police them. Non-string values are rendered with
/// their TOML display form so `be_nice = true` and `be_nice = "yes"` both
/// work.
pub fn load_prefs<P: AsRef<Path>>(path: P) -> Result<Prefs> {
    let path = path.as_ref();

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read prefs file {}: {e}", path.display())))?;

    let table: BTreeMap<String, toml::Value> = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse prefs file {}: {e}", path.display())))?;

    let prefs = Prefs::new();
    for (key, value) in table {
        let rendered = match value {
            toml::Value::String(s) => s,
            toml::Value::Boolean(b) => {
                if b {
                    "yes".to_string()
                } else {
                    "no".to_string()
                }
            }
            other => other.to_string(),
        };
        prefs.set(key, rendered);
    }

    tracing::debug!(path = %path.display(), entries = prefs.len(), "Preferences loaded");
    Ok(prefs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_prefs_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "plugins_folder = \"/opt/plugins\"").unwrap();
        writeln!(file, "be_nice = true").unwrap();
        writeln!(file, "max_checks = 10").unwrap();
        file.flush().unwrap();

        let prefs = load_prefs(file.path()).unwrap();
        assert_eq!(prefs.get("plugins_folder").as_deref(), Some("/opt/plugins"));
        assert!(prefs.get_bool("be_nice"));
        assert_eq!(prefs.get("max_checks").as_deref(), Some("10"));
    }

    #[test]
    fn test_load_prefs_missing_file() {
        let result = load_prefs("/nonexistent/moray.toml");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_load_prefs_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not toml at all [[[").unwrap();
        file.flush().unwrap();

        assert!(load_prefs(file.path()).is_err());
    }
}
