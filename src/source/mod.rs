//! Collaborator seams
//!
//! The index engine never walks a models tree on its own. Compiled artifacts,
//! the list of releases and the "last loaded" marker all come through the
//! traits in this module; the filesystem-backed implementations here and in
//! [`pyang`] and [`catalog`] are what the CLI wires in.

pub mod catalog;
pub mod pyang;

pub use catalog::{DirectoryCatalog, MarkerFile};
pub use pyang::PyangCompiler;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IndexError, Result};
use crate::flatten::{ArtifactFormat, CompiledSchema};
use crate::node::Variant;

/// Produces the compiled representation of one (release, variant)
pub trait SchemaSource: Send + Sync {
    fn compile(&self, release: &str, variant: Variant) -> Result<CompiledSchema>;

    /// Label used in flatten error locations
    fn label(&self, release: &str, variant: Variant) -> String {
        format!("{}/{}", release, variant)
    }
}

/// Enumerates known release identifiers
pub trait ReleaseCatalog {
    fn releases(&self) -> Result<Vec<String>>;
}

/// Remembers the last release that finished loading, across restarts
pub trait LastLoaded: Send + Sync {
    fn load(&self) -> Option<String>;
    fn store(&self, release: &str) -> Result<()>;
}

/// Pre-compiled artifacts laid out as `<root>/<release>/<file>`
#[derive(Debug, Clone)]
pub struct ArtifactDir {
    root: PathBuf,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Candidate file names for a variant, in preference order
    pub fn candidates(variant: Variant) -> [String; 4] {
        [
            format!("nokia-{}-pyang.yin", variant),
            format!("nokia-{}.json", variant),
            format!("nokia-{}-flat-paths.txt", variant),
            format!("nokia-{}.outline", variant),
        ]
    }

    /// First existing artifact for the pair
    pub fn artifact_path(&self, release: &str, variant: Variant) -> Option<PathBuf> {
        let dir = self.root.join(release);
        Self::candidates(variant)
            .into_iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    }
}

impl SchemaSource for ArtifactDir {
    fn compile(&self, release: &str, variant: Variant) -> Result<CompiledSchema> {
        let Some(path) = self.artifact_path(release, variant) else {
            return Err(IndexError::Compile {
                release: release.to_string(),
                variant,
                reason: format!("no compiled artifact under {}", self.root.join(release).display()),
            });
        };
        read_artifact(&path)
    }

    fn label(&self, release: &str, variant: Variant) -> String {
        self.artifact_path(release, variant)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| format!("{}/{}", release, variant))
    }
}

/// Read an artifact file, picking the format from its extension
pub fn read_artifact(path: &Path) -> Result<CompiledSchema> {
    let format = ArtifactFormat::from_path(path).ok_or_else(|| {
        IndexError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("unrecognised artifact extension: {}", path.display()),
        ))
    })?;
    let text = fs::read_to_string(path)?;
    Ok(CompiledSchema::parse(format, text, &path.display().to_string())?)
}
