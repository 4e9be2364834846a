//! Centralized path resolution for kforge
//!
//! # Environment Variables
//!
//! - `KFORGE_CONFIG_DIR` - Override config directory
//! - `KFORGE_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For both directories:
//! 1. The `KFORGE_*` environment variable
//! 2. `XDG_CONFIG_HOME/kforge` or `XDG_STATE_HOME/kforge`
//! 3. `~/.config/kforge` or `~/.local/state/kforge`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "KFORGE_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "KFORGE_STATE_DIR";

const APP: &str = "kforge";

/// Get the kforge config directory path
pub fn config_dir() -> Result<PathBuf> {
    let path = pick(
        std::env::var(ENV_CONFIG_DIR).ok(),
        std::env::var("XDG_CONFIG_HOME").ok(),
        dirs::home_dir().as_deref(),
        &[".config"],
    )?;
    log::debug!("Using config dir: {}", path.display());
    Ok(path)
}

/// Get the kforge state directory path
pub fn state_dir() -> Result<PathBuf> {
    let path = pick(
        std::env::var(ENV_STATE_DIR).ok(),
        std::env::var("XDG_STATE_HOME").ok(),
        dirs::home_dir().as_deref(),
        &[".local", "state"],
    )?;
    log::debug!("Using state dir: {}", path.display());
    Ok(path)
}

fn pick(
    overridden: Option<String>,
    xdg: Option<String>,
    home: Option<&Path>,
    under_home: &[&str],
) -> Result<PathBuf> {
    if let Some(dir) = overridden.filter(|d| !d.is_empty()) {
        return Ok(expand(&dir));
    }
    if let Some(xdg) = xdg.filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(xdg).join(APP));
    }
    let home = home.context("Could not determine home directory")?;
    let mut path = home.to_path_buf();
    path.extend(under_home);
    Ok(path.join(APP))
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_wins() {
        let path = pick(
            Some("/custom/state".to_string()),
            Some("/xdg".to_string()),
            Some(Path::new("/home/u")),
            &[".local", "state"],
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/custom/state"));
    }

    #[test]
    fn test_xdg_before_home() {
        let path = pick(None, Some("/xdg".to_string()), Some(Path::new("/home/u")), &[".config"]).unwrap();
        assert_eq!(path, PathBuf::from("/xdg/kforge"));
    }

    #[test]
    fn test_home_default() {
        let path = pick(None, None, Some(Path::new("/home/u")), &[".local", "state"]).unwrap();
        assert_eq!(path, PathBuf::from("/home/u/.local/state/kforge"));
    }

    #[test]
    fn test_empty_values_ignored() {
        let path = pick(Some(String::new()), Some(String::new()), Some(Path::new("/h")), &[".config"]).unwrap();
        assert_eq!(path, PathBuf::from("/h/.config/kforge"));
    }

    #[test]
    fn test_no_home_is_an_error() {
        assert!(pick(None, None, None, &[".config"]).is_err());
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/test/path");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("test").join("path"));
    }

    #[test]
    fn test_expand_absolute() {
        assert_eq!(expand("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_VAR_12345/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_VAR_12345/file"));
    }
}
