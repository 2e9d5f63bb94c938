// ABOUTME: Optional TOML config for sync runs
// ABOUTME: Carries batch size and per-table key column overrides; CLI flags win over file values

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::rows::KeyColumnPolicy;

/// File-based sync options.
///
/// ```toml
/// batch_size = 500
///
/// [key_columns]
/// sequences = "name"
/// events = "event_uuid"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct MirrorConfig {
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub key_columns: HashMap<String, String>,
}

impl MirrorConfig {
    /// Fold the file's key column overrides into a policy, on top of the
    /// built-in defaults.
    pub fn apply_key_columns(&self, policy: &mut KeyColumnPolicy) {
        for (table, column) in &self.key_columns {
            policy.set_override(table.clone(), column.clone());
        }
    }
}

pub fn load_config(path: &Path) -> Result<MirrorConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: MirrorConfig = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "batch_size = 500\n\n[key_columns]\nsequences = \"seq_name\"\nevents = \"uuid\"\n"
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.batch_size, Some(500));
        assert_eq!(config.key_columns.len(), 2);

        let mut policy = KeyColumnPolicy::default();
        config.apply_key_columns(&mut policy);
        assert_eq!(policy.key_column("sequences"), "seq_name");
        assert_eq!(policy.key_column("events"), "uuid");
        assert_eq!(policy.key_column("locks"), "index");
    }

    #[test]
    fn test_load_config_empty_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.batch_size, None);
        assert!(config.key_columns.is_empty());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/mirror.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_rejects_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "batch_size = [not valid").unwrap();
        assert!(load_config(file.path()).is_err());
    }
}
