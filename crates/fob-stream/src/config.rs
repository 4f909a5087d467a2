//! File-based configuration.
//!
//! A pipeline can keep its bundling options in `fob.toml` under a `[stream]`
//! table, or in `package.json` under a `"fobStream"` field:
//!
//! ```toml
//! [stream]
//! concurrency = 4
//!
//! [stream.build]
//! external = ["react"]
//!
//! [[stream.output]]
//! format = "cjs"
//! file = "app.cjs.js"
//!
//! [[stream.output]]
//! format = "es"
//! file = "app.esm.js"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::options::{BuildOptions, OptionsArg, OutputOptions, OutputSpecArg, resolve_options};
use crate::transform::{BundleTransform, TransformConfig};

/// Name of the table in `fob.toml`.
pub const TOML_TABLE: &str = "stream";

/// Name of the field in `package.json`.
pub const PACKAGE_JSON_FIELD: &str = "fobStream";

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config not found")]
    NotFound,

    #[error("invalid config value for '{field}'{}", .hint.as_ref().map(|h| format!(": {}", h)).unwrap_or_default())]
    InvalidValue { field: String, hint: Option<String> },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bundling options as stored in a config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub build: BuildOptions,
    pub output: Option<OutputSpecArg>,
    /// Number of files processed at once.
    pub concurrency: Option<usize>,
}

impl StreamConfig {
    /// Create from a `serde_json::Value`.
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: TOML_TABLE.to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Output specs in order. A config without outputs renders one output
    /// from the build-level settings.
    pub fn outputs(&self) -> Vec<OutputOptions> {
        self.output
            .clone()
            .map(OutputSpecArg::into_specs)
            .unwrap_or_else(|| vec![OutputOptions::default()])
    }

    /// Build a transform from this config.
    ///
    /// `config.concurrency` is overridden when the file sets one.
    pub fn into_transform(self, mut config: TransformConfig) -> BundleTransform {
        if let Some(concurrency) = self.concurrency {
            config = config.concurrency(concurrency);
        }
        let output = self
            .output
            .unwrap_or_else(|| OutputSpecArg::Single(OutputOptions::default()));
        let resolved = resolve_options(OptionsArg::Build(self.build), Some(output));
        BundleTransform::new(resolved.build, resolved.outputs, config)
    }
}

/// File-based configuration discovery.
///
/// # Example
///
/// ```no_run
/// use fob_stream::ConfigDiscovery;
///
/// let config = ConfigDiscovery::new(".").load().unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a config file in the root directory.
    ///
    /// Searches in this order:
    /// 1. `fob.toml` with a `[stream]` table
    /// 2. `package.json` with a `fobStream` field
    pub fn find(&self) -> Option<PathBuf> {
        let toml_path = self.root.join("fob.toml");
        if toml_path.exists() {
            if let Ok(content) = fs::read_to_string(&toml_path) {
                if let Ok(parsed) = toml::from_str::<toml::Table>(&content) {
                    if parsed.contains_key(TOML_TABLE) {
                        return Some(toml_path);
                    }
                }
            }
        }

        let pkg_path = self.root.join("package.json");
        if pkg_path.exists() {
            if let Ok(content) = fs::read_to_string(&pkg_path) {
                if let Ok(parsed) = serde_json::from_str::<Value>(&content) {
                    if parsed
                        .get(PACKAGE_JSON_FIELD)
                        .is_some_and(|v| !v.is_null())
                    {
                        return Some(pkg_path);
                    }
                }
            }
        }

        None
    }

    /// Load config from the discovered file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> ConfigResult<StreamConfig> {
        let path = self.find().ok_or(ConfigError::NotFound)?;
        self.load_from(&path)
    }

    fn load_from(&self, path: &Path) -> ConfigResult<StreamConfig> {
        let content = fs::read_to_string(path)?;

        if path.file_name() == Some(std::ffi::OsStr::new("package.json")) {
            let parsed: Value =
                serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
                    field: "package.json".to_string(),
                    hint: Some(format!("Invalid JSON: {}", e)),
                })?;
            let value = parsed
                .get(PACKAGE_JSON_FIELD)
                .cloned()
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: PACKAGE_JSON_FIELD.to_string(),
                    hint: Some("Add a 'fobStream' field to your package.json".to_string()),
                })?;
            return StreamConfig::from_value(value);
        }

        let mut table: toml::Table =
            toml::from_str(&content).map_err(|e| ConfigError::InvalidValue {
                field: "toml".to_string(),
                hint: Some(format!("Invalid TOML syntax: {}", e)),
            })?;
        let stream = table.remove(TOML_TABLE).ok_or(ConfigError::NotFound)?;

        let value = serde_json::to_value(stream).map_err(|e| ConfigError::InvalidValue {
            field: "toml".to_string(),
            hint: Some(format!("TOML to JSON conversion failed: {}", e)),
        })?;

        StreamConfig::from_value(value)
    }
}

/// Discover and load config from the current directory.
pub fn discover() -> ConfigResult<StreamConfig> {
    let root = std::env::current_dir()?;
    ConfigDiscovery::new(&root).load()
}
