//! Configuration management for the path index
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (yang-paths.toml)
//! - Environment variables (YANG_PATHS__*)
//!
//! ## Example config file (yang-paths.toml):
//! ```toml
//! [models]
//! root = "./7x50_YangModels"
//! artifacts = "./flat"
//! pyang = "pyang"
//! include_dirs = ["ietf", "nokia-submodule"]
//!
//! [query]
//! search_limit = 200
//!
//! [command]
//! tool = "gnmic"
//! placeholder = "example"
//!
//! [store]
//! default_to_last_loaded = true
//! last_loaded_file = "./flat/.last-release"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::command::{CommandSynthesizer, DEFAULT_PLACEHOLDER, DEFAULT_TOOL};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub command: CommandConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

/// Where release folders and compiled artifacts live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding one folder per release
    #[serde(default = "default_models_root")]
    pub root: PathBuf,

    /// Directory of compiled artifacts (`<release>/nokia-<variant>-pyang.yin`)
    #[serde(default = "default_artifacts_dir")]
    pub artifacts: PathBuf,

    /// pyang executable
    #[serde(default = "default_pyang")]
    pub pyang: String,

    /// Extra pyang search paths, relative to each release folder
    #[serde(default = "default_include_dirs")]
    pub include_dirs: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Cap on free-text search results
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandConfig {
    #[serde(default = "default_tool")]
    pub tool: String,

    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Use the last loaded release when a command names none
    #[serde(default = "default_true")]
    pub default_to_last_loaded: bool,

    /// Marker file; defaults to `<artifacts>/.last-release`
    #[serde(default)]
    pub last_loaded_file: Option<PathBuf>,
}

// Default value functions
fn default_models_root() -> PathBuf {
    PathBuf::from("7x50_YangModels")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("flat")
}

fn default_pyang() -> String {
    "pyang".to_string()
}

fn default_include_dirs() -> Vec<String> {
    vec!["ietf".to_string(), "nokia-submodule".to_string()]
}

fn default_search_limit() -> usize {
    200
}

fn default_tool() -> String {
    DEFAULT_TOOL.to_string()
}

fn default_placeholder() -> String {
    DEFAULT_PLACEHOLDER.to_string()
}

fn default_true() -> bool {
    true
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            root: default_models_root(),
            artifacts: default_artifacts_dir(),
            pyang: default_pyang(),
            include_dirs: default_include_dirs(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            placeholder: default_placeholder(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_to_last_loaded: true,
            last_loaded_file: None,
        }
    }
}

impl PathsConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "yang-paths.toml",
            ".yang-paths.toml",
            "config/yang-paths.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "yang-paths") {
            let xdg_config = config_dir.config_dir().join("yang-paths.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // YANG_PATHS__QUERY__SEARCH_LIMIT=50
        builder = builder.add_source(
            Environment::with_prefix("YANG_PATHS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Render as TOML
    pub fn to_toml(&self) -> std::io::Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save configuration to a file
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, self.to_toml()?)
    }

    /// Marker file for the last loaded release
    pub fn last_loaded_file(&self) -> PathBuf {
        self.store
            .last_loaded_file
            .clone()
            .unwrap_or_else(|| self.models.artifacts.join(".last-release"))
    }

    pub fn synthesizer(&self) -> CommandSynthesizer {
        CommandSynthesizer::new(&self.command.tool, &self.command.placeholder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PathsConfig::default();
        assert_eq!(config.query.search_limit, 200);
        assert_eq!(config.command.tool, "gnmic");
        assert!(config.store.default_to_last_loaded);
        assert_eq!(config.last_loaded_file(), PathBuf::from("flat/.last-release"));
    }

    #[test]
    fn test_serialize_config() {
        let config = PathsConfig::default();
        let toml_str = config.to_toml().unwrap();
        assert!(toml_str.contains("[models]"));
        assert!(toml_str.contains("[query]"));
        assert!(toml_str.contains("default_to_last_loaded = true"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");

        let mut config = PathsConfig::default();
        config.query.search_limit = 7;
        config.store.default_to_last_loaded = false;
        config.store.last_loaded_file = Some(PathBuf::from("/tmp/marker"));
        config.save(&path).unwrap();

        let loaded = PathsConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(loaded.query.search_limit, 7);
        assert!(!loaded.store.default_to_last_loaded);
        assert_eq!(loaded.last_loaded_file(), PathBuf::from("/tmp/marker"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[query]\nsearch_limit = 25\n\n[command]\ntool = \"gnmic -a r1\"\n",
        )
        .unwrap();

        let config = PathsConfig::load_from(Some(path.to_str().unwrap())).unwrap();
        assert_eq!(config.query.search_limit, 25);
        assert_eq!(config.command.tool, "gnmic -a r1");
        assert_eq!(config.command.placeholder, "example");
    }
}
