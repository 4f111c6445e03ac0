//! Configuration for the console.
//!
//! Supports YAML configuration with precedence: CLI > ENV > file > defaults.
//! The `connections` list is the configuration source for
//! [`ConnectionSet::build`](crate::connection::ConnectionSet::build); edits
//! made here only take effect once a new set is built and swapped into the
//! [`AppContext`](crate::context::AppContext).

use crate::error::{BasilError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the configuration file path.
pub const CONFIG_ENV: &str = "BASIL_CONFIG";

/// One connection as written in the configuration file.
///
/// Nothing is validated here; validation happens when the entries are built
/// into a [`ConnectionSet`](crate::connection::ConnectionSet).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    /// Unique connection name. Entries without one are skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Backend URL, e.g. `https://sensu.example.com:8080`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Username for password authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Password for password authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Alternate authentication token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Namespace queried on this backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl ConnectionEntry {
    /// Creates a password-authenticated entry.
    #[must_use]
    pub fn with_password(name: &str, url: &str, username: &str, password: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            url: Some(url.to_string()),
            username: Some(username.to_string()),
            password: Some(password.to_string()),
            ..Self::default()
        }
    }

    /// Creates a token-authenticated entry.
    #[must_use]
    pub fn with_api_key(name: &str, url: &str, api_key: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            url: Some(url.to_string()),
            api_key: Some(api_key.to_string()),
            ..Self::default()
        }
    }

    /// Sets the namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }
}

/// Global configuration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Auto-refresh period in milliseconds.
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,

    /// Overall deadline for one aggregation, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Debounce window between partial flushes, in milliseconds.
    #[serde(default = "default_flush_ms")]
    pub flush_ms: u64,

    /// Enable vim-style navigation keys.
    #[serde(default = "default_vim_keys")]
    pub vim_keys: bool,

    /// Log file for the interactive console.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Console colors.
    #[serde(default)]
    pub theme: Theme,
}

fn default_refresh_ms() -> u64 {
    10_000
}
fn default_timeout_ms() -> u64 {
    8_000
}
fn default_flush_ms() -> u64 {
    150
}
fn default_vim_keys() -> bool {
    true
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            refresh_ms: default_refresh_ms(),
            timeout_ms: default_timeout_ms(),
            flush_ms: default_flush_ms(),
            vim_keys: default_vim_keys(),
            log_file: None,
            theme: Theme::default(),
        }
    }
}

/// Theme configuration. Colors are `#rrggbb` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    /// Theme name.
    #[serde(default = "default_name")]
    pub name: String,

    /// Foreground color.
    #[serde(default = "default_foreground")]
    pub foreground: String,

    /// Borders, active tab and headers.
    #[serde(default = "default_accent")]
    pub accent: String,

    /// Status 0.
    #[serde(default = "default_ok")]
    pub ok: String,

    /// Status 1.
    #[serde(default = "default_warning")]
    pub warning: String,

    /// Status 2.
    #[serde(default = "default_critical")]
    pub critical: String,

    /// Any other status.
    #[serde(default = "default_unknown")]
    pub unknown: String,
}

fn default_name() -> String {
    "default".to_string()
}
fn default_foreground() -> String {
    "#c0caf5".to_string()
}
fn default_accent() -> String {
    "#7aa2f7".to_string()
}
fn default_ok() -> String {
    "#9ece6a".to_string()
}
fn default_warning() -> String {
    "#e0af68".to_string()
}
fn default_critical() -> String {
    "#f7768e".to_string()
}
fn default_unknown() -> String {
    "#565f89".to_string()
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            name: default_name(),
            foreground: default_foreground(),
            accent: default_accent(),
            ok: default_ok(),
            warning: default_warning(),
            critical: default_critical(),
            unknown: default_unknown(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version.
    #[serde(default = "default_version")]
    pub version: u32,

    /// Global settings.
    #[serde(default)]
    pub global: GlobalConfig,

    /// Connection entries in configuration order.
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
}

fn default_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            global: GlobalConfig::default(),
            connections: Vec::new(),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration path (`<config_dir>/basil/config.yaml`).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("basil").join("config.yaml"))
    }

    /// Resolves the configuration path: explicit path, then `BASIL_CONFIG`,
    /// then [`Config::default_path`].
    #[must_use]
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(Self::default_path)
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .map_err(|_| BasilError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error with line number if parsing fails, or
    /// [`BasilError::ConfigInvalid`] for out-of-range values.
    pub fn parse(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml).map_err(|e| {
            let line = e.location().map(|l| l.line()).unwrap_or(0);
            BasilError::ConfigParse {
                line,
                message: e.to_string(),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration with fallback to defaults.
    #[must_use]
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Writes the configuration as YAML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml_ng::to_string(self).map_err(|e| BasilError::ConfigInvalid {
            key: "config".to_string(),
            message: e.to_string(),
        })?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.global.timeout_ms == 0 {
            return Err(BasilError::ConfigInvalid {
                key: "global.timeout_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.global.flush_ms == 0 {
            return Err(BasilError::ConfigInvalid {
                key: "global.flush_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Auto-refresh period.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.global.refresh_ms)
    }

    /// Overall deadline for one aggregation.
    #[must_use]
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.global.timeout_ms)
    }

    /// Debounce window for partial flushes.
    #[must_use]
    pub fn flush_window(&self) -> Duration {
        Duration::from_millis(self.global.flush_ms)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.connections.iter().position(|c| c.name.as_deref() == Some(name))
    }

    /// Appends a new connection entry.
    ///
    /// # Errors
    ///
    /// Returns [`BasilError::ConnectionExists`] if the name is already used,
    /// or [`BasilError::ConfigInvalid`] if the entry has no name.
    pub fn add_connection(&mut self, entry: ConnectionEntry) -> Result<()> {
        let name = entry.name.clone().ok_or_else(|| BasilError::ConfigInvalid {
            key: "connections.name".to_string(),
            message: "a connection needs a name".to_string(),
        })?;
        if self.position(&name).is_some() {
            return Err(BasilError::ConnectionExists(name));
        }
        self.connections.push(entry);
        Ok(())
    }

    /// Replaces the connection entry with the same name.
    ///
    /// # Errors
    ///
    /// Returns [`BasilError::ConnectionNotFound`] if no entry has that name.
    pub fn update_connection(&mut self, entry: ConnectionEntry) -> Result<()> {
        let name = entry.name.clone().unwrap_or_default();
        let idx = self.position(&name).ok_or(BasilError::ConnectionNotFound(name))?;
        self.connections[idx] = entry;
        Ok(())
    }

    /// Removes every entry with the given name; returns whether any was removed.
    pub fn remove_connection(&mut self, name: &str) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c.name.as_deref() != Some(name));
        self.connections.len() < before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::new();

        assert_eq!(config.version, 1);
        assert_eq!(config.global.refresh_ms, 10_000);
        assert_eq!(config.global.timeout_ms, 8_000);
        assert_eq!(config.global.flush_ms, 150);
        assert!(config.global.vim_keys);
        assert!(config.connections.is_empty());
    }

    #[test]
    fn test_config_parse_minimal() {
        let config = Config::parse("version: 1").unwrap();
        assert_eq!(config.version, 1);
    }

    #[test]
    fn test_config_parse_full() {
        let yaml = r#"
version: 1
global:
  refresh_ms: 5000
  timeout_ms: 2000
  vim_keys: false
connections:
  - name: prod
    url: https://sensu.prod.example.com
    username: admin
    password: hunter2
    namespace: ops
  - name: dev
    url: http://sensu.dev:8080
    api_key: abc
"#;

        let config = Config::parse(yaml).unwrap();

        assert_eq!(config.global.refresh_ms, 5000);
        assert_eq!(config.load_timeout(), Duration::from_millis(2000));
        assert!(!config.global.vim_keys);
        assert_eq!(config.connections.len(), 2);
        assert_eq!(config.connections[0].namespace.as_deref(), Some("ops"));
        assert_eq!(config.connections[1].api_key.as_deref(), Some("abc"));
    }

    #[test]
    fn test_config_parse_theme() {
        let yaml = r##"
global:
  theme:
    name: night
    critical: "#ff0000"
"##;

        let config = Config::parse(yaml).unwrap();

        assert_eq!(config.global.theme.name, "night");
        assert_eq!(config.global.theme.critical, "#ff0000");
        assert_eq!(config.global.theme.ok, Theme::default().ok);
    }

    #[test]
    fn test_config_parse_error_includes_line() {
        let yaml = r#"
version: 1
global:
  timeout_ms: not_a_number
"#;

        let err = Config::parse(yaml).unwrap_err();
        assert!(err.to_string().contains("4"), "Error should include line number: {err}");
    }

    #[test]
    fn test_config_rejects_zero_timeout() {
        let err = Config::parse("global:\n  timeout_ms: 0\n").unwrap_err();
        assert!(matches!(
            err,
            BasilError::ConfigInvalid { ref key, .. } if key == "global.timeout_ms"
        ));
    }

    #[test]
    fn test_config_load_or_default() {
        let config = Config::load_or_default("/nonexistent/path");
        assert_eq!(config.version, 1);
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::new();
        config
            .add_connection(ConnectionEntry::with_api_key("prod", "https://a:8080", "k"))
            .unwrap();
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_add_connection_rejects_duplicate() {
        let mut config = Config::new();
        config
            .add_connection(ConnectionEntry::with_api_key("prod", "https://a", "k"))
            .unwrap();

        let err = config
            .add_connection(ConnectionEntry::with_api_key("prod", "https://b", "k"))
            .unwrap_err();
        assert!(matches!(err, BasilError::ConnectionExists(ref n) if n == "prod"));
        assert_eq!(config.connections.len(), 1);
    }

    #[test]
    fn test_update_and_remove_connection() {
        let mut config = Config::new();
        config
            .add_connection(ConnectionEntry::with_api_key("prod", "https://a", "k"))
            .unwrap();

        config
            .update_connection(ConnectionEntry::with_api_key("prod", "https://b", "k"))
            .unwrap();
        assert_eq!(config.connections[0].url.as_deref(), Some("https://b"));

        assert!(config.remove_connection("prod"));
        assert!(!config.remove_connection("prod"));
        assert!(matches!(
            config.update_connection(ConnectionEntry::with_api_key("prod", "https://c", "k")),
            Err(BasilError::ConnectionNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_path_prefers_explicit() {
        let explicit = Path::new("/tmp/explicit.yaml");
        assert_eq!(Config::resolve_path(Some(explicit)), Some(explicit.to_path_buf()));
    }
}
