//! CLI settings (`~/.config/kforge/config.toml`)

use anyhow::{Context, Result};
use declarative::Lifecycle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "config.toml";

fn default_jobs() -> usize {
    4
}

/// User settings; every field is optional in the file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Parallel workers for plan and apply
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Directory the local provider keeps resources in
    #[serde(default)]
    pub cloud_root: Option<String>,

    /// Lifecycle per task kind, e.g. `Network = "ExistsAndWarnIfChanges"`
    #[serde(default)]
    pub lifecycle_overrides: BTreeMap<String, Lifecycle>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            cloud_root: None,
            lifecycle_overrides: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn path() -> Result<PathBuf> {
        Ok(crate::paths::config_dir()?.join(SETTINGS_FILE))
    }

    /// Load settings, falling back to defaults when the file is absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid settings in {}", path.display()))
    }

    pub fn lifecycle_override(&self, kind: &str) -> Option<Lifecycle> {
        self.lifecycle_overrides.get(kind).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.jobs, 4);
    }

    #[test]
    fn test_lifecycle_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
jobs = 8

[lifecycle_overrides]
Network = "ExistsAndWarnIfChanges"
SecurityGroup = "Ignore"
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.jobs, 8);
        assert_eq!(
            settings.lifecycle_override("Network"),
            Some(Lifecycle::ExistsAndWarnIfChanges)
        );
        assert_eq!(settings.lifecycle_override("SecurityGroup"), Some(Lifecycle::Ignore));
        assert_eq!(settings.lifecycle_override("Subnet"), None);
    }

    #[test]
    fn test_rejects_unknown_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[lifecycle_overrides]\nNetwork = \"Sometimes\"\n").unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid settings"));
    }
}
