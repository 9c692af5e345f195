//! Configuration loading and management
//!
//! Two layers of configuration live here:
//! - [`PluginConfig`]: the host-shaped settings handed to a plugin adapter
//!   (`apiKey`, `projectName`, `options`), validated at construction time
//! - [`Config`]: the operator's file configuration, loaded from
//!   `~/.config/amplitude-plugin/config.toml`
//!
//! File locations follow the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/amplitude-plugin/` (~/.config/amplitude-plugin/)
//! - State/Logs: `$XDG_STATE_HOME/amplitude-plugin/` (~/.local/state/amplitude-plugin/)

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "amplitude-plugin";

/// Environment variable that overrides `amplitude.api_key`
pub const API_KEY_ENV: &str = "AMPLITUDE_API_KEY";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

// ============================================
// Host-facing plugin configuration
// ============================================

/// Settings supplied to a plugin adapter by the host.
///
/// Kept exactly as supplied so the host can introspect it through
/// [`AnalyticsPlugin::config`](crate::plugin::AnalyticsPlugin::config).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginConfig {
    /// Amplitude project API key (required, non-empty)
    #[serde(default)]
    pub api_key: Option<String>,

    /// SDK instance name, for reporting to several projects from one host
    #[serde(default)]
    pub project_name: Option<String>,

    /// Variant-specific options; must be an object when present
    #[serde(default)]
    pub options: Option<Value>,
}

impl PluginConfig {
    /// Create a config with just an API key.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Default::default()
        }
    }

    /// Validate the configuration, returning the API key.
    pub fn validate(&self) -> Result<&str> {
        let api_key = match self.api_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => {
                return Err(Error::Config(
                    "Amplitude project API key is not defined".to_string(),
                ))
            }
        };

        match &self.options {
            None | Some(Value::Null) | Some(Value::Object(_)) => Ok(api_key),
            Some(_) => Err(Error::Config(
                "Amplitude SDK options must be an object".to_string(),
            )),
        }
    }

    /// Options as an object, treating `null` as absent.
    pub fn options_object(&self) -> Option<&Value> {
        self.options.as_ref().filter(|v| v.is_object())
    }
}

/// Options understood by the server adapter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerOptions {
    /// Full URL or bare hostname of the ingestion API
    #[serde(default)]
    pub api_endpoint: Option<String>,

    /// Extra HTTP headers added to every API call
    #[serde(default)]
    pub http_headers: Option<BTreeMap<String, String>>,

    /// Event ingestion options, forwarded verbatim as `options`
    #[serde(default)]
    pub event_options: Option<Value>,
}

impl ServerOptions {
    /// Extract server options from a validated plugin config.
    pub fn from_plugin_config(config: &PluginConfig) -> Result<Self> {
        match config.options_object() {
            None => Ok(Self::default()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| Error::Config(format!("invalid Amplitude options: {}", e))),
        }
    }
}

// ============================================
// File configuration
// ============================================

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Amplitude project settings
    #[serde(default)]
    pub amplitude: AmplitudeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[amplitude]` section of the config file
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AmplitudeConfig {
    /// Project API key (can also use the `AMPLITUDE_API_KEY` env var)
    pub api_key: Option<String>,
    /// SDK instance name
    pub project_name: Option<String>,
    /// Ingestion endpoint, URL or hostname
    pub api_endpoint: Option<String>,
    /// Extra HTTP headers
    pub http_headers: Option<BTreeMap<String, String>>,
    /// Event ingestion options
    pub event_options: Option<Value>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Config::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                self.amplitude.api_key = Some(key);
            }
        }
    }

    /// Build the host-shaped plugin configuration from the file settings.
    pub fn plugin_config(&self) -> PluginConfig {
        let section = &self.amplitude;
        let mut options = serde_json::Map::new();

        if let Some(endpoint) = &section.api_endpoint {
            options.insert("apiEndpoint".to_string(), Value::String(endpoint.clone()));
        }
        if let Some(headers) = &section.http_headers {
            let headers = headers
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect();
            options.insert("httpHeaders".to_string(), Value::Object(headers));
        }
        if let Some(event_options) = &section.event_options {
            options.insert("eventOptions".to_string(), event_options.clone());
        }

        PluginConfig {
            api_key: section.api_key.clone(),
            project_name: section.project_name.clone(),
            options: if options.is_empty() {
                None
            } else {
                Some(Value::Object(options))
            },
        }
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/amplitude-plugin/config.toml`
    pub fn config_path() -> PathBuf {
        xdg_config_home().join(APP_DIR).join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/amplitude-plugin/`
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join(APP_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.amplitude.api_key.is_none());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.max_files, 5);
    }

    #[test]
    fn test_validate_requires_api_key() {
        assert!(PluginConfig::default().validate().is_err());
        assert!(PluginConfig::with_api_key("").validate().is_err());
        assert_eq!(PluginConfig::with_api_key("key").validate().unwrap(), "key");
    }

    #[test]
    fn test_validate_rejects_non_object_options() {
        let mut config = PluginConfig::with_api_key("key");
        config.options = Some(json!("fast"));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must be an object"));

        config.options = Some(json!([1, 2]));
        assert!(config.validate().is_err());

        config.options = Some(Value::Null);
        assert!(config.validate().is_ok());

        config.options = Some(json!({"apiEndpoint": "api.eu.amplitude.com"}));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_plugin_config_from_host_json() {
        let config: PluginConfig = serde_json::from_value(json!({
            "apiKey": "abc",
            "projectName": "Secondary",
            "options": {"apiEndpoint": "api.eu.amplitude.com"}
        }))
        .unwrap();
        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert_eq!(config.project_name.as_deref(), Some("Secondary"));

        let server = ServerOptions::from_plugin_config(&config).unwrap();
        assert_eq!(server.api_endpoint.as_deref(), Some("api.eu.amplitude.com"));
        assert!(server.http_headers.is_none());
    }

    #[test]
    fn test_server_options_reject_bad_shapes() {
        let mut config = PluginConfig::with_api_key("key");
        config.options = Some(json!({"httpHeaders": "not-a-map"}));
        assert!(ServerOptions::from_plugin_config(&config).is_err());
    }

    #[test]
    fn test_parse_config_file() {
        let toml = r#"
[amplitude]
api_key = "file-key"
api_endpoint = "api.eu.amplitude.com"
http_headers = { "X-Trace" = "1" }
event_options = { min_id_length = 1 }

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.amplitude.api_key.as_deref(), Some("file-key"));
        assert_eq!(config.logging.level, "debug");

        let plugin = config.plugin_config();
        assert_eq!(plugin.api_key.as_deref(), Some("file-key"));
        assert_eq!(
            plugin.options,
            Some(json!({
                "apiEndpoint": "api.eu.amplitude.com",
                "httpHeaders": {"X-Trace": "1"},
                "eventOptions": {"min_id_length": 1}
            }))
        );
        assert!(plugin.validate().is_ok());
    }

    #[test]
    fn test_plugin_config_without_options() {
        let config = Config {
            amplitude: AmplitudeConfig {
                api_key: Some("k".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.plugin_config().options.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[amplitude]\napi_key = \"from-disk\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.amplitude.api_key.as_deref(), Some("from-disk"));

        std::fs::write(&path, "[amplitude\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }
}
