//! Configuration management for localshare
//!
//! Handles loading and saving configuration from ~/.config/localshare/config.toml

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::share::ShareDuration;

/// Configuration file name
const CONFIG_FILE: &str = "config.toml";

/// Application name for config directory
const APP_NAME: &str = "localshare";

/// Port used when neither the CLI nor the config file picks one
pub const DEFAULT_PORT: u16 = 8000;

/// Address used when neither the CLI nor the config file picks one
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Storage root used when nothing else is configured
pub const DEFAULT_STORAGE_DIR: &str = "shares";

/// Seconds between reaper sweeps when nothing else is configured
pub const DEFAULT_REAP_INTERVAL_SECS: u64 = 60;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Base URL used to compose share links (e.g. a tunnel URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_base_url: Option<String>,

    /// Directory holding one subdirectory per share
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,

    /// Default port for the web server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_port: Option<u16>,

    /// Address the web server binds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Seconds between sweeps for dead shares
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reap_interval_secs: Option<u64>,

    /// Duration applied to uploads that don't pick one ("manual" or minutes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_duration: Option<String>,
}

/// Keys that can be changed with `localshare config set`
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigKey {
    PublicBaseUrl,
    StorageDir,
    DefaultPort,
    BindAddress,
    ReapIntervalSecs,
    DefaultDuration,
}

impl ConfigKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::PublicBaseUrl => "public_base_url",
            ConfigKey::StorageDir => "storage_dir",
            ConfigKey::DefaultPort => "default_port",
            ConfigKey::BindAddress => "bind_address",
            ConfigKey::ReapIntervalSecs => "reap_interval_secs",
            ConfigKey::DefaultDuration => "default_duration",
        }
    }
}

impl Config {
    /// Create a new empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the config file path
    ///
    /// Returns ~/.config/localshare/config.toml on Linux
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE))
    }

    /// Get the config directory path
    pub fn config_dir() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(APP_NAME))
    }

    /// Load configuration from the default location
    ///
    /// Returns default config if file doesn't exist
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &std::path::Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> ConfigResult<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    ///
    /// Creates the parent directory if it doesn't exist
    pub fn save_to(&self, path: &std::path::Path) -> ConfigResult<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
            }
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Check if any configuration is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Set a key from its textual value
    pub fn set(&mut self, key: ConfigKey, value: &str) -> ConfigResult<()> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.as_str().to_string(),
            message,
        };

        match key {
            ConfigKey::PublicBaseUrl => {
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(invalid("must start with http:// or https://".to_string()));
                }
                self.public_base_url = Some(value.trim_end_matches('/').to_string());
            }
            ConfigKey::StorageDir => self.storage_dir = Some(PathBuf::from(value)),
            ConfigKey::DefaultPort => {
                self.default_port = Some(value.parse().map_err(|e| invalid(format!("{e}")))?)
            }
            ConfigKey::BindAddress => self.bind_address = Some(value.to_string()),
            ConfigKey::ReapIntervalSecs => {
                let secs: u64 = value.parse().map_err(|e| invalid(format!("{e}")))?;
                if secs == 0 {
                    return Err(invalid("must be at least 1".to_string()));
                }
                self.reap_interval_secs = Some(secs);
            }
            ConfigKey::DefaultDuration => {
                self.default_duration = Some(ShareDuration::parse(value).to_string())
            }
        }
        Ok(())
    }

    /// Clear a key back to its default
    pub fn unset(&mut self, key: ConfigKey) {
        match key {
            ConfigKey::PublicBaseUrl => self.public_base_url = None,
            ConfigKey::StorageDir => self.storage_dir = None,
            ConfigKey::DefaultPort => self.default_port = None,
            ConfigKey::BindAddress => self.bind_address = None,
            ConfigKey::ReapIntervalSecs => self.reap_interval_secs = None,
            ConfigKey::DefaultDuration => self.default_duration = None,
        }
    }

    /// Get effective port (CLI, then config, then default)
    pub fn effective_port(&self, cli_port: Option<u16>) -> u16 {
        cli_port.or(self.default_port).unwrap_or(DEFAULT_PORT)
    }

    /// Get effective bind address (CLI, then config, then default)
    pub fn effective_bind_address(&self, cli_bind: Option<&str>) -> String {
        cli_bind
            .map(str::to_string)
            .or_else(|| self.bind_address.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string())
    }

    /// Get effective storage root (CLI or environment, then config, then default)
    pub fn effective_storage_dir(&self, cli_dir: Option<PathBuf>) -> PathBuf {
        cli_dir
            .or_else(|| self.storage_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR))
    }

    /// Get effective public base URL
    ///
    /// Falls back to `http://localhost:<port>` so links work on this machine.
    pub fn effective_base_url(&self, cli_url: Option<&str>, port: u16) -> String {
        cli_url
            .map(str::to_string)
            .or_else(|| self.public_base_url.clone())
            .unwrap_or_else(|| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string()
    }

    /// Get effective reaper interval
    pub fn effective_reap_interval(&self, cli_secs: Option<u64>) -> Duration {
        Duration::from_secs(
            cli_secs
                .or(self.reap_interval_secs)
                .unwrap_or(DEFAULT_REAP_INTERVAL_SECS),
        )
    }

    /// Get the duration applied when an upload does not choose one
    pub fn effective_default_duration(&self) -> ShareDuration {
        self.default_duration
            .as_deref()
            .map(ShareDuration::parse)
            .unwrap_or_default()
    }
}

/// Format the configuration for display
pub fn format_config(config: &Config) -> String {
    let mut lines = Vec::new();

    lines.push("Current configuration:".to_string());
    lines.push(String::new());

    match config.public_base_url {
        Some(ref url) => lines.push(format!("  public_base_url = \"{}\"", url)),
        None => lines.push("  public_base_url = (not set, using http://localhost:<port>)".to_string()),
    }

    match config.storage_dir {
        Some(ref dir) => lines.push(format!("  storage_dir = \"{}\"", dir.display())),
        None => lines.push(format!(
            "  storage_dir = (not set, using {})",
            DEFAULT_STORAGE_DIR
        )),
    }

    match config.default_port {
        Some(port) => lines.push(format!("  default_port = {}", port)),
        None => lines.push(format!("  default_port = (not set, using {})", DEFAULT_PORT)),
    }

    match config.bind_address {
        Some(ref addr) => lines.push(format!("  bind_address = \"{}\"", addr)),
        None => lines.push(format!(
            "  bind_address = (not set, using {})",
            DEFAULT_BIND_ADDRESS
        )),
    }

    match config.reap_interval_secs {
        Some(secs) => lines.push(format!("  reap_interval_secs = {}", secs)),
        None => lines.push(format!(
            "  reap_interval_secs = (not set, using {})",
            DEFAULT_REAP_INTERVAL_SECS
        )),
    }

    match config.default_duration {
        Some(ref duration) => lines.push(format!("  default_duration = \"{}\"", duration)),
        None => lines.push("  default_duration = (not set, using manual)".to_string()),
    }

    if config.is_empty() {
        lines.push(String::new());
        lines.push("No settings saved; every value uses its default.".to_string());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.public_base_url.is_none());
        assert!(config.storage_dir.is_none());
        assert!(config.default_port.is_none());
        assert!(config.is_empty());
    }

    #[test]
    fn test_config_set_values() {
        let mut config = Config::new();

        config
            .set(ConfigKey::PublicBaseUrl, "https://abc.ngrok.app/")
            .unwrap();
        assert_eq!(
            config.public_base_url,
            Some("https://abc.ngrok.app".to_string())
        );

        config.set(ConfigKey::DefaultPort, "8080").unwrap();
        assert_eq!(config.default_port, Some(8080));

        config.set(ConfigKey::DefaultDuration, "30").unwrap();
        assert_eq!(config.default_duration, Some("30".to_string()));

        assert!(!config.is_empty());
    }

    #[test]
    fn test_config_set_rejects_bad_values() {
        let mut config = Config::new();
        assert!(config.set(ConfigKey::PublicBaseUrl, "ftp://x").is_err());
        assert!(config.set(ConfigKey::DefaultPort, "seventy").is_err());
        assert!(config.set(ConfigKey::ReapIntervalSecs, "0").is_err());
        assert!(config.is_empty());
    }

    #[test]
    fn test_config_set_normalizes_duration() {
        let mut config = Config::new();
        config.set(ConfigKey::DefaultDuration, "-3").unwrap();
        assert_eq!(config.default_duration, Some("manual".to_string()));
    }

    #[test]
    fn test_config_unset() {
        let mut config = Config::new();
        config.set(ConfigKey::BindAddress, "127.0.0.1").unwrap();
        config.unset(ConfigKey::BindAddress);
        assert!(config.is_empty());
    }

    #[test]
    fn test_config_serialize_deserialize() {
        let mut config = Config::new();
        config.set(ConfigKey::StorageDir, "/srv/shares").unwrap();
        config.set(ConfigKey::ReapIntervalSecs, "120").unwrap();

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config, parsed);
    }

    #[test]
    fn test_config_serialize_empty() {
        let config = Config::new();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.trim().is_empty());
    }

    #[test]
    fn test_config_deserialize_partial() {
        let toml_str = r#"
            public_base_url = "https://share.example.com"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.public_base_url,
            Some("https://share.example.com".to_string())
        );
        assert!(config.storage_dir.is_none());
    }

    #[test]
    fn test_effective_values_defaults() {
        let config = Config::new();
        assert_eq!(config.effective_port(None), DEFAULT_PORT);
        assert_eq!(config.effective_bind_address(None), DEFAULT_BIND_ADDRESS);
        assert_eq!(
            config.effective_storage_dir(None),
            PathBuf::from(DEFAULT_STORAGE_DIR)
        );
        assert_eq!(
            config.effective_base_url(None, 8000),
            "http://localhost:8000"
        );
        assert_eq!(config.effective_reap_interval(None), Duration::from_secs(60));
        assert_eq!(config.effective_default_duration(), ShareDuration::Manual);
    }

    #[test]
    fn test_effective_values_cli_takes_precedence() {
        let mut config = Config::new();
        config.set(ConfigKey::DefaultPort, "4000").unwrap();
        config
            .set(ConfigKey::PublicBaseUrl, "https://from-config.example")
            .unwrap();

        assert_eq!(config.effective_port(Some(5000)), 5000);
        assert_eq!(config.effective_port(None), 4000);
        assert_eq!(
            config.effective_base_url(Some("https://from-cli.example/"), 4000),
            "https://from-cli.example"
        );
        assert_eq!(
            config.effective_base_url(None, 4000),
            "https://from-config.example"
        );
    }

    #[test]
    fn test_format_config_empty() {
        let output = format_config(&Config::new());
        assert!(output.contains("public_base_url = (not set"));
        assert!(output.contains("default_port = (not set, using 8000)"));
        assert!(output.contains("default_duration = (not set, using manual)"));
        assert!(output.contains("No settings saved"));
    }

    #[test]
    fn test_format_config_with_values() {
        let mut config = Config::new();
        config.set(ConfigKey::DefaultPort, "8080").unwrap();
        config.set(ConfigKey::DefaultDuration, "15").unwrap();

        let output = format_config(&config);
        assert!(output.contains("default_port = 8080"));
        assert!(output.contains("default_duration = \"15\""));
        assert!(!output.contains("No settings saved"));
    }

    #[test]
    fn test_config_path() {
        if let Ok(path) = Config::config_path() {
            assert!(path.to_string_lossy().contains("localshare"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::new();
        config.set(ConfigKey::StorageDir, "/data/shares").unwrap();
        config.set(ConfigKey::DefaultPort, "9000").unwrap();
        config.save_to(&config_path).unwrap();

        let loaded = Config::load_from(&config_path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let loaded = Config::load_from(&temp_dir.path().join("absent.toml")).unwrap();
        assert!(loaded.is_empty());
    }
}
