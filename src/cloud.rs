//! Local provider - cloud resources as JSON documents on disk
//!
//! Layout: `<root>/<cluster>/<Kind>/<name>.json`. A directory the current
//! user cannot read behaves like an API call without permission.

use anyhow::{Context, Result};
use declarative::FindError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Handle to one cluster's resources in the local provider
#[derive(Debug, Clone)]
pub struct LocalCloud {
    root: PathBuf,
}

impl LocalCloud {
    pub fn new(root: &Path, cluster: &str) -> Self {
        Self {
            root: root.join(cluster),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, kind: &str, name: &str) -> PathBuf {
        self.root.join(kind).join(format!("{name}.json"))
    }

    /// Read a stored resource; `None` when it does not exist
    pub fn read<T: DeserializeOwned>(&self, kind: &str, name: &str) -> Result<Option<T>, FindError> {
        let path = self.path(kind, name);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                return Err(FindError::AccessDenied(path.display().to_string()));
            }
            Err(e) => {
                return Err(FindError::Other(
                    anyhow::Error::new(e).context(format!("Could not read {}", path.display())),
                ));
            }
        };
        let value = serde_json::from_str(&content)
            .with_context(|| format!("Corrupt resource document {}", path.display()))?;
        Ok(Some(value))
    }

    /// Create or replace a stored resource
    pub fn write<T: Serialize>(&self, kind: &str, name: &str, value: &T) -> Result<()> {
        let path = self.path(kind, name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(value)?;
        // write-then-rename so readers never see half a document
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path).with_context(|| format!("Failed to replace {}", path.display()))?;
        log::debug!("Wrote {}", path.display());
        Ok(())
    }

    /// Names of every stored resource of `kind`, sorted
    pub fn list(&self, kind: &str) -> Result<Vec<String>> {
        let dir = self.root.join(kind);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("Could not list {}", dir.display())),
        };
        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().into_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        cidr: String,
    }

    #[test]
    fn test_read_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = LocalCloud::new(dir.path(), "dev");
        assert_eq!(cloud.read::<Doc>("Network", "dev").unwrap(), None);
        assert!(cloud.list("Network").unwrap().is_empty());
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = LocalCloud::new(dir.path(), "dev");
        let doc = Doc {
            cidr: "10.0.0.0/16".to_string(),
        };
        cloud.write("Network", "dev", &doc).unwrap();
        assert_eq!(cloud.read::<Doc>("Network", "dev").unwrap(), Some(doc));
        assert_eq!(cloud.list("Network").unwrap(), vec!["dev"]);
        assert!(dir.path().join("dev/Network/dev.json").exists());
    }

    #[test]
    fn test_corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cloud = LocalCloud::new(dir.path(), "dev");
        fs::create_dir_all(dir.path().join("dev/Network")).unwrap();
        fs::write(dir.path().join("dev/Network/dev.json"), "{not json").unwrap();
        let err = cloud.read::<Doc>("Network", "dev").unwrap_err();
        assert!(!err.is_access_denied());
    }
}
