//! Filesystem release discovery and the last-loaded marker

use std::fs;
use std::path::PathBuf;

use walkdir::WalkDir;

use super::{LastLoaded, ReleaseCatalog};
use crate::error::Result;

/// Every non-hidden subdirectory of `root` is a release, newest name first
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ReleaseCatalog for DirectoryCatalog {
    fn releases(&self) -> Result<Vec<String>> {
        let mut releases = Vec::new();

        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            releases.push(name);
        }

        releases.sort_by(|a, b| b.cmp(a));
        Ok(releases)
    }
}

/// Single-line text file holding a release identifier
#[derive(Debug, Clone)]
pub struct MarkerFile {
    path: PathBuf,
}

impl MarkerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LastLoaded for MarkerFile {
    fn load(&self) -> Option<String> {
        let content = fs::read_to_string(&self.path).ok()?;
        let release = content.trim();
        (!release.is_empty()).then(|| release.to_string())
    }

    fn store(&self, release: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, format!("{}\n", release))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_directory_catalog_order() {
        let dir = tempdir().unwrap();
        for name in ["23.10.R1", "25.3.R2", ".git", "24.7.R1"] {
            fs::create_dir_all(dir.path().join(name)).unwrap();
        }
        fs::write(dir.path().join("README.md"), "models").unwrap();

        let releases = DirectoryCatalog::new(dir.path()).releases().unwrap();
        assert_eq!(releases, vec!["25.3.R2", "24.7.R1", "23.10.R1"]);
    }

    #[test]
    fn test_marker_file_roundtrip() {
        let dir = tempdir().unwrap();
        let marker = MarkerFile::new(dir.path().join("state/last-release"));
        assert_eq!(marker.load(), None);

        marker.store("25.3.R2").unwrap();
        assert_eq!(marker.load().as_deref(), Some("25.3.R2"));
    }
}
