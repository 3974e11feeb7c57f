//! Configuration types and loading
//!
//! `AppConfig` holds process-level configuration read once from the
//! environment. `Settings` is the runtime-tunable key/value store (the CMS
//! config table), read from a settings file and/or the database.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Server configuration
    pub server: ServerConfig,

    /// Storage configuration
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Connection URL; `None` runs against the in-memory store
    pub url: Option<String>,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_size_bytes: usize,
    /// Hand file delivery to the front-end web server (X-Accel-Redirect / X-Sendfile)
    pub x_sendfile: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Substituted for `:rails_root` in path templates
    pub root: String,
    /// Optional settings file (TOML, YAML or JSON) seeding `Settings`
    pub settings_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: None,
                pool_size: 10,
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                max_body_size_bytes: 100 * 1024 * 1024, // 100MB
                x_sendfile: false,
            },
            storage: StorageConfig {
                root: ".".to_string(),
                settings_file: None,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                config.database.url = Some(url);
            }
        }
        if let Ok(size) = std::env::var("DATABASE_POOL_SIZE") {
            config.database.pool_size = parse_env("DATABASE_POOL_SIZE", &size)?;
        }

        if let Ok(host) = std::env::var("HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("PORT") {
            config.server.port = parse_env("PORT", &port)?;
        }
        if let Ok(size) = std::env::var("MAX_BODY_SIZE") {
            config.server.max_body_size_bytes = parse_env("MAX_BODY_SIZE", &size)?;
        }
        if let Ok(v) = std::env::var("ASSETS_X_SENDFILE") {
            config.server.x_sendfile = v == "true" || v == "1" || v == "yes";
        }

        if let Ok(root) = std::env::var("ASSETS_ROOT") {
            config.storage.root = root;
        }
        if let Ok(file) = std::env::var("ASSETS_SETTINGS_FILE") {
            config.storage.settings_file = Some(file);
        }

        Ok(config)
    }

    /// Get the server address
    pub fn server_addr(&self) -> std::net::SocketAddr {
        use std::net::SocketAddr;
        let ip: std::net::IpAddr = self.server.host.parse().unwrap_or([0, 0, 0, 0].into());
        SocketAddr::new(ip, self.server.port)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Dynamic settings keyed by dotted names such as `assets.max_asset_size`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: HashMap<String, SettingValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Array(Vec<String>),
}

impl SettingValue {
    /// Text rendering, as the config table stores every value as a string
    pub fn as_text(&self) -> String {
        match self {
            SettingValue::String(s) => s.clone(),
            SettingValue::Integer(i) => i.to_string(),
            SettingValue::Float(f) => f.to_string(),
            SettingValue::Boolean(b) => b.to_string(),
            SettingValue::Array(items) => items.join(","),
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build settings from `(key, value)` string pairs
    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut settings = Self::new();
        for (key, value) in pairs {
            settings.set(key, SettingValue::String(value.into()));
        }
        settings
    }

    /// Load settings from a TOML, YAML or JSON file.
    ///
    /// Nested tables are flattened into dotted keys, so `[assets.s3] bucket = "x"`
    /// becomes `assets.s3.bucket`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let cfg = config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .map_err(|e| ConfigError::FileError(format!("{}: {}", path.display(), e)))?;

        let tree: serde_json::Value = cfg
            .try_deserialize()
            .map_err(|e| ConfigError::FileError(format!("{}: {}", path.display(), e)))?;

        let mut settings = Self::new();
        settings.flatten_into(String::new(), tree);
        tracing::debug!(path = %path.display(), keys = settings.len(), "Settings loaded");
        Ok(settings)
    }

    fn flatten_into(&mut self, prefix: String, value: serde_json::Value) {
        use serde_json::Value;

        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let key = if prefix.is_empty() {
                        key
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    self.flatten_into(key, child);
                }
            }
            Value::Null => {}
            Value::Bool(b) => self.set(prefix, SettingValue::Boolean(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => self.set(prefix, SettingValue::Integer(i)),
                None => self.set(prefix, SettingValue::Float(n.as_f64().unwrap_or_default())),
            },
            Value::String(s) => self.set(prefix, SettingValue::String(s)),
            Value::Array(items) => {
                let items = items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect();
                self.set(prefix, SettingValue::Array(items));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(SettingValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Any value rendered as text
    pub fn get_text(&self, key: &str) -> Option<String> {
        self.values.get(key).map(SettingValue::as_text)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(SettingValue::Boolean(b)) => Some(*b),
            Some(SettingValue::String(s)) => match s.trim() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Integer value; string values are parsed leniently from their leading digits
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(SettingValue::Integer(i)) => Some(*i),
            Some(SettingValue::Float(f)) => Some(*f as i64),
            Some(SettingValue::String(s)) => {
                let digits: String = s
                    .trim()
                    .chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect();
                digits.parse().ok()
            }
            _ => None,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: SettingValue) {
        self.values.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<SettingValue> {
        self.values.remove(key)
    }

    /// Overlay `other` on top of these settings
    pub fn merge(&mut self, other: Settings) {
        self.values.extend(other.values);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.pool_size, 10);
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_settings() {
        let mut settings = Settings::default();
        settings.set("key1", SettingValue::String("value1".to_string()));
        settings.set("key2", SettingValue::Boolean(true));
        settings.set("key3", SettingValue::Integer(42));

        assert_eq!(settings.get_string("key1"), Some("value1"));
        assert_eq!(settings.get_bool("key2"), Some(true));
        assert_eq!(settings.get_int("key3"), Some(42));
        assert_eq!(settings.get_text("key3").as_deref(), Some("42"));
    }

    #[test]
    fn test_lenient_integers() {
        let settings = Settings::from_pairs([("a", "5"), ("b", " 12mb"), ("c", "none")]);
        assert_eq!(settings.get_int("a"), Some(5));
        assert_eq!(settings.get_int("b"), Some(12));
        assert_eq!(settings.get_int("c"), None);
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = Settings::from_pairs([("pagination.per_page", "20"), ("assets.storage", "s3")]);
        base.merge(Settings::from_pairs([("pagination.per_page", "50")]));

        assert_eq!(base.get_int("pagination.per_page"), Some(50));
        assert_eq!(base.get_string("assets.storage"), Some("s3"));
        assert_eq!(base.len(), 2);
    }

    #[test]
    fn test_from_file_flattens_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[assets]
storage = "s3"
max_asset_size = 5
additional_thumbnails = "mini=50x50"

[assets.s3]
bucket = "cms-assets"

[pagination]
per_page = 30
"#
        )
        .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert_eq!(settings.get_string("assets.storage"), Some("s3"));
        assert_eq!(settings.get_string("assets.s3.bucket"), Some("cms-assets"));
        assert_eq!(settings.get_int("assets.max_asset_size"), Some(5));
        assert_eq!(settings.get_int("pagination.per_page"), Some(30));
        assert_eq!(
            settings.get_string("assets.additional_thumbnails"),
            Some("mini=50x50")
        );
    }

    #[test]
    fn test_from_missing_file() {
        let result = Settings::from_file("/nonexistent/settings.toml");
        assert!(matches!(result, Err(ConfigError::FileError(_))));
    }

    #[test]
    fn test_server_addr() {
        let config = AppConfig::default();
        let addr = config.server_addr();
        assert_eq!(addr.port(), 8080);
    }
}
