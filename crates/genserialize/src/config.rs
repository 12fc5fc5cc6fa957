//! Configuration system for genserialize.
//!
//! Loads config from, in increasing precedence:
//! 1. Global: ~/.config/genserialize/config.toml
//! 2. Per-project: .genserialize/config.toml
//! 3. An explicit `--config` file
//!
//! Command-line flags override all of them. Relative paths are taken
//! relative to the working directory.
//!
//! Example config.toml:
//! ```toml
//! log_level = "info"
//!
//! [pipeline]
//! parse_threads = 4
//! generate_threads = 0   # 0 = one per CPU
//!
//! [plugins]
//! directory = "target/plugins"
//! paths = ["vendor/libgenserialize_plugin_xml.so"]
//!
//! [frontend]
//! include_paths = ["schemas"]
//!
//! [output]
//! directory = "build/generated"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Worker pool sizes. 0 means one thread per available CPU.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub parse_threads: usize,
    pub generate_threads: usize,
}

/// Format plugin libraries to load before generating.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PluginsConfig {
    /// Directory scanned (non-recursively) for plugin libraries.
    pub directory: Option<PathBuf>,
    /// Individual plugin libraries.
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Extra directories searched for inputs.
    pub include_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Write every generated header here instead of next to its source.
    pub directory: Option<PathBuf>,
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GenSerializeConfig {
    /// Default log filter, e.g. "info" or "genserialize=debug".
    pub log_level: Option<String>,
    pub pipeline: PipelineConfig,
    pub plugins: PluginsConfig,
    pub frontend: FrontendConfig,
    pub output: OutputConfig,
}

impl GenSerializeConfig {
    /// Load configuration for a project rooted at `root`.
    ///
    /// Missing global or project files are skipped; an explicit file must
    /// exist. A file that exists but does not parse is an error.
    pub fn load(root: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut layers = Vec::new();
        if let Some(global) = Self::global_config_path() {
            layers.push(global);
        }
        layers.push(root.join(".genserialize").join("config.toml"));
        Self::load_layers(&layers, explicit)
    }

    fn load_layers(layers: &[PathBuf], explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        for path in layers {
            if path.is_file() {
                config = config.merge(Self::load_file(path)?);
            }
        }

        if let Some(path) = explicit {
            config = config.merge(Self::load_file(path)?);
        }

        Ok(config)
    }

    /// Get the global config path.
    fn global_config_path() -> Option<PathBuf> {
        let config_home = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))?;
        Some(config_home.join("genserialize").join("config.toml"))
    }

    /// Load config from a file path.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Merge another config into this one.
    ///
    /// Values in `other` win when set: a non-zero thread count, a present
    /// path or level, a non-empty list.
    pub fn merge(self, other: Self) -> Self {
        Self {
            log_level: other.log_level.or(self.log_level),
            pipeline: PipelineConfig {
                parse_threads: nonzero_or(other.pipeline.parse_threads, self.pipeline.parse_threads),
                generate_threads: nonzero_or(
                    other.pipeline.generate_threads,
                    self.pipeline.generate_threads,
                ),
            },
            plugins: PluginsConfig {
                directory: other.plugins.directory.or(self.plugins.directory),
                paths: nonempty_or(other.plugins.paths, self.plugins.paths),
            },
            frontend: FrontendConfig {
                include_paths: nonempty_or(
                    other.frontend.include_paths,
                    self.frontend.include_paths,
                ),
            },
            output: OutputConfig {
                directory: other.output.directory.or(self.output.directory),
            },
        }
    }
}

fn nonzero_or(preferred: usize, fallback: usize) -> usize {
    if preferred != 0 { preferred } else { fallback }
}

fn nonempty_or<T>(preferred: Vec<T>, fallback: Vec<T>) -> Vec<T> {
    if preferred.is_empty() {
        fallback
    } else {
        preferred
    }
}
