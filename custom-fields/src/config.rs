//! Engine configuration using Figment
//!
//! Sources are merged in precedence order (later sources win):
//! 1. Built-in defaults
//! 2. A configuration file (`custom-fields.{toml,yaml,yml,json}` in the
//!    working directory, or an explicit path)
//! 3. Environment variables prefixed `CUSTOM_FIELDS_`, with `__` separating
//!    nested keys (`CUSTOM_FIELDS_API__NONCE=abc`)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace};

/// Default quiet period before a remote option query is sent
pub const DEFAULT_DEBOUNCE_MS: u64 = 400;
/// Default interval between editor widget content polls
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;
/// Environment variable prefix
pub const ENV_PREFIX: &str = "CUSTOM_FIELDS_";
/// Base name of discovered configuration files
pub const CONFIG_FILE_STEM: &str = "custom-fields";

const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration parsing failed
    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[source]
        source: Box<figment::Error>,
    },

    /// Configuration file format not supported
    #[error("Unsupported configuration file format: {path}")]
    UnsupportedFormat { path: PathBuf },

    /// Explicit configuration file missing
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        ConfigError::ParseError {
            source: Box::new(error),
        }
    }
}

/// Where remote option queries go and how they authenticate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ApiConfig {
    /// Base URL of the option endpoints, e.g. `https://example.com/wp-json/wcf/v1`
    #[serde(default)]
    pub url: String,
    /// Opaque request token supplied by the host page
    #[serde(default)]
    pub nonce: String,
}

/// Settings shared by every field in a form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldsConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Prefix applied to element ids derived from field ids
    #[serde(default)]
    pub html_id_prefix: String,
    /// Opaque code editor settings keyed by editor mode
    #[serde(default)]
    pub code_editor_settings: BTreeMap<String, Value>,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            html_id_prefix: String::new(),
            code_editor_settings: BTreeMap::new(),
        }
    }
}

impl FieldsConfig {
    /// Load from defaults, the discovered file in the working directory, and
    /// the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::load_from(discover_config_file(&cwd).as_deref())
    }

    /// Load from defaults, an optional explicit file, and the environment.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(FieldsConfig::default()));

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            debug!(path = %path.display(), "loading configuration file");
            figment = figment.merge(file_provider(path)?);
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: FieldsConfig = figment.extract()?;
        trace!(?config, "configuration loaded");
        Ok(config)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Code editor settings for a mode, if configured.
    pub fn code_editor_settings_for(&self, mode: Option<&str>) -> Option<&Value> {
        self.code_editor_settings.get(mode?)
    }
}

fn file_provider(path: &Path) -> Result<Figment, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => Ok(Figment::from(Toml::file(path))),
        Some("yaml") | Some("yml") => Ok(Figment::from(Yaml::file(path))),
        Some("json") => Ok(Figment::from(Json::file(path))),
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// First `custom-fields.<ext>` file found in `dir`.
pub fn discover_config_file(dir: &Path) -> Option<PathBuf> {
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{CONFIG_FILE_STEM}.{ext}")))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_defaults() {
        let config = FieldsConfig::load_from(None).unwrap();
        assert_eq!(config.debounce(), Duration::from_millis(DEFAULT_DEBOUNCE_MS));
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert!(config.api.url.is_empty());
    }

    #[test]
    #[serial]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom-fields.toml");
        fs::write(
            &path,
            r#"
debounce_ms = 300
html_id_prefix = "wcf-"

[api]
url = "https://example.test/wp-json/wcf/v1"
nonce = "n0nce"

[code_editor_settings.css]
codemirror = { mode = "text/css" }
"#,
        )
        .unwrap();

        assert_eq!(discover_config_file(dir.path()), Some(path.clone()));

        let config = FieldsConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.debounce_ms, 300);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.html_id_prefix, "wcf-");
        assert_eq!(config.api.nonce, "n0nce");
        assert!(config.code_editor_settings_for(Some("css")).is_some());
        assert!(config.code_editor_settings_for(Some("js")).is_none());
        assert!(config.code_editor_settings_for(None).is_none());
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom-fields.json");
        fs::write(&path, r#"{"api": {"url": "https://file.test", "nonce": "file"}}"#).unwrap();

        std::env::set_var("CUSTOM_FIELDS_API__NONCE", "env");
        let config = FieldsConfig::load_from(Some(&path));
        std::env::remove_var("CUSTOM_FIELDS_API__NONCE");

        let config = config.unwrap();
        assert_eq!(config.api.url, "https://file.test");
        assert_eq!(config.api.nonce, "env");
    }

    #[test]
    #[serial]
    fn test_missing_and_unsupported_files() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            FieldsConfig::load_from(Some(&missing)),
            Err(ConfigError::FileNotFound { .. })
        ));

        let ini = dir.path().join("custom-fields.ini");
        fs::write(&ini, "debounce_ms=1").unwrap();
        assert!(matches!(
            FieldsConfig::load_from(Some(&ini)),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
    }
}
