//! `pyang`-backed schema compilation
//!
//! Each release folder carries one combined model per variant. The layouts
//! seen across releases, checked in order:
//!
//! ```text
//! <release>/nokia-combined/nokia-{conf,state}.yang
//! <release>/nokia-combined/nokia-{conf,state}-combined.yang
//! <release>/nokia-{conf,state}.yang
//! ```
//!
//! Both variants must be present at the chosen location.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

use super::SchemaSource;
use crate::error::{IndexError, Result};
use crate::flatten::CompiledSchema;
use crate::node::Variant;

#[derive(Debug, Clone)]
pub struct PyangCompiler {
    models_root: PathBuf,
    binary: String,
    /// Extra search paths, relative to the release folder
    include_dirs: Vec<String>,
    /// Where compiled YIN is kept between runs
    cache_dir: Option<PathBuf>,
}

impl PyangCompiler {
    pub fn new(models_root: impl Into<PathBuf>) -> Self {
        Self {
            models_root: models_root.into(),
            binary: "pyang".to_string(),
            include_dirs: vec!["ietf".to_string(), "nokia-submodule".to_string()],
            cache_dir: None,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_include_dirs(mut self, dirs: Vec<String>) -> Self {
        self.include_dirs = dirs;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    fn compile_error(release: &str, variant: Variant, reason: impl Into<String>) -> IndexError {
        IndexError::Compile {
            release: release.to_string(),
            variant,
            reason: reason.into(),
        }
    }

    fn cached_path(&self, release: &str, variant: Variant) -> Option<PathBuf> {
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(release).join(format!("nokia-{}-pyang.yin", variant)))
    }

    fn run_pyang(&self, release_dir: &Path, model: &Path) -> std::io::Result<std::process::Output> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(["-f", "yin"]).arg("-p").arg(release_dir);
        for dir in &self.include_dirs {
            cmd.arg("-p").arg(release_dir.join(dir));
        }
        cmd.arg(model).output()
    }
}

/// Locate the combined model file for a variant inside a release folder
pub fn combined_model_file(release_dir: &Path, variant: Variant) -> Option<PathBuf> {
    let combined = release_dir.join("nokia-combined");
    let layouts = [
        (combined.clone(), "nokia-conf.yang", "nokia-state.yang"),
        (combined, "nokia-conf-combined.yang", "nokia-state-combined.yang"),
        (release_dir.to_path_buf(), "nokia-conf.yang", "nokia-state.yang"),
    ];

    layouts.into_iter().find_map(|(dir, conf, state)| {
        let conf = dir.join(conf);
        let state = dir.join(state);
        if !(conf.is_file() && state.is_file()) {
            return None;
        }
        Some(match variant {
            Variant::Conf => conf,
            Variant::State => state,
        })
    })
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl SchemaSource for PyangCompiler {
    fn compile(&self, release: &str, variant: Variant) -> Result<CompiledSchema> {
        let release_dir = self.models_root.join(release);
        let model = combined_model_file(&release_dir, variant).ok_or_else(|| {
            Self::compile_error(
                release,
                variant,
                format!("no combined state/conf models in {}", release_dir.display()),
            )
        })?;

        // Reuse cached YIN unless the model changed since it was written
        let cached = self.cached_path(release, variant);
        if let Some(cache) = &cached {
            if let (Some(built), Some(source)) = (modified(cache), modified(&model)) {
                if built >= source {
                    tracing::debug!(release, %variant, path = %cache.display(), "using cached YIN");
                    return Ok(CompiledSchema::Yin(fs::read_to_string(cache)?));
                }
            }
        }

        tracing::info!(release, %variant, model = %model.display(), "compiling with pyang");
        let output = self
            .run_pyang(&release_dir, &model)
            .map_err(|e| Self::compile_error(release, variant, format!("{}: {}", self.binary, e)))?;

        if !output.status.success() {
            return Err(Self::compile_error(
                release,
                variant,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let yin = String::from_utf8_lossy(&output.stdout).into_owned();
        if let Some(cache) = &cached {
            if let Some(parent) = cache.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(cache, &yin)?;
        }
        Ok(CompiledSchema::Yin(yin))
    }

    fn label(&self, release: &str, variant: Variant) -> String {
        format!("{}/nokia-{}.yang", release, variant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "module x {}").unwrap();
    }

    #[test]
    fn test_combined_layout_preferred() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("nokia-combined/nokia-conf.yang"));
        touch(&dir.path().join("nokia-combined/nokia-state.yang"));
        touch(&dir.path().join("nokia-conf.yang"));
        touch(&dir.path().join("nokia-state.yang"));

        assert_eq!(
            combined_model_file(dir.path(), Variant::State).unwrap(),
            dir.path().join("nokia-combined/nokia-state.yang")
        );
    }

    #[test]
    fn test_combined_suffix_and_legacy_layouts() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("nokia-combined/nokia-conf-combined.yang"));
        touch(&dir.path().join("nokia-combined/nokia-state-combined.yang"));
        assert_eq!(
            combined_model_file(dir.path(), Variant::Conf).unwrap(),
            dir.path().join("nokia-combined/nokia-conf-combined.yang")
        );

        let legacy = tempdir().unwrap();
        touch(&legacy.path().join("nokia-conf.yang"));
        touch(&legacy.path().join("nokia-state.yang"));
        assert_eq!(
            combined_model_file(legacy.path(), Variant::Conf).unwrap(),
            legacy.path().join("nokia-conf.yang")
        );
    }

    #[test]
    fn test_half_layout_is_ignored() {
        let dir = tempdir().unwrap();
        touch(&dir.path().join("nokia-combined/nokia-state.yang"));
        assert!(combined_model_file(dir.path(), Variant::State).is_none());
    }

    #[test]
    fn test_missing_models_is_compile_error() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("25.3.R1")).unwrap();
        let compiler = PyangCompiler::new(dir.path());
        assert!(matches!(
            compiler.compile("25.3.R1", Variant::State),
            Err(IndexError::Compile { .. })
        ));
    }

    #[test]
    fn test_fresh_cache_skips_pyang() {
        let dir = tempdir().unwrap();
        let models = dir.path().join("models");
        touch(&models.join("25.3.R1/nokia-state.yang"));
        touch(&models.join("25.3.R1/nokia-conf.yang"));

        let cache = dir.path().join("flat");
        let cached = cache.join("25.3.R1/nokia-state-pyang.yin");
        fs::create_dir_all(cached.parent().unwrap()).unwrap();
        fs::write(&cached, "<module name=\"nokia-state\"/>").unwrap();

        // a binary that cannot exist proves pyang was never spawned
        let compiler = PyangCompiler::new(&models)
            .with_binary("/nonexistent/pyang")
            .with_cache_dir(&cache);
        assert!(matches!(
            compiler.compile("25.3.R1", Variant::State).unwrap(),
            CompiledSchema::Yin(text) if text.contains("nokia-state")
        ));
    }
}
