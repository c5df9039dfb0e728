//! Configuration file parser for `config.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged, since they are usually typos.
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// What happens to a feed's poller when the feed is unfollowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnfollowPolicy {
    /// Halt the poller along with the registry removal
    #[default]
    Stop,
    /// Remove the feed from the registry only; its poller keeps running
    LeaveRunning,
}

/// Top-level service configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the HTTP API listens on.
    pub listen_addr: String,

    /// SQLite file holding the feed registry.
    pub database_path: PathBuf,

    /// Base URL of the bundle server used to fetch item content.
    pub bundle_server: String,

    /// Base URL of the bundle inserter; bundles are POSTed to `<base>/insert`.
    pub bundle_inserter: String,

    /// Where the global feed-list artifact is written.
    pub feeds_file: PathBuf,

    /// Directory holding one items artifact per feed.
    pub items_dir: PathBuf,

    /// Refresh interval for feeds that declare no TTL.
    pub default_poll_minutes: u64,

    /// Lower bound on any refresh interval.
    pub min_poll_seconds: u64,

    /// Bound on every outbound HTTP request.
    pub request_timeout_secs: u64,

    pub unfollow_policy: UnfollowPolicy,

    /// Accept follow requests for localhost and private network addresses.
    pub allow_private_hosts: bool,

    /// Message catalog language, e.g. "en-us".
    pub language: String,

    /// Directory searched for `<language>.json` message catalogs.
    pub translations_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3096".to_string(),
            database_path: PathBuf::from("feeds.db"),
            bundle_server: "http://127.0.0.1:3094".to_string(),
            bundle_inserter: "http://127.0.0.1:3095".to_string(),
            feeds_file: PathBuf::from("json-files/feeds.json"),
            items_dir: PathBuf::from("json-files"),
            default_poll_minutes: 5,
            min_poll_seconds: 30,
            request_timeout_secs: 30,
            unfollow_policy: UnfollowPolicy::Stop,
            allow_private_hosts: false,
            language: "en-us".to_string(),
            translations_dir: PathBuf::from("translations"),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 13] = [
        "listen_addr",
        "database_path",
        "bundle_server",
        "bundle_inserter",
        "feeds_file",
        "items_dir",
        "default_poll_minutes",
        "min_poll_seconds",
        "request_timeout_secs",
        "unfollow_policy",
        "allow_private_hosts",
        "language",
        "translations_dir",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Out-of-range values → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(path = %path.display(), listen = %config.listen_addr, "Loaded configuration");
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.listen_addr
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "listen_addr",
                reason: e.to_string(),
            })?;
        for (key, value) in [
            ("bundle_server", &self.bundle_server),
            ("bundle_inserter", &self.bundle_inserter),
        ] {
            url::Url::parse(value).map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            })?;
        }
        if self.default_poll_minutes == 0 {
            return Err(ConfigError::Invalid {
                key: "default_poll_minutes",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn default_poll_interval(&self) -> Duration {
        Duration::from_secs(self.default_poll_minutes.saturating_mul(60))
    }

    pub fn min_poll_interval(&self) -> Duration {
        Duration::from_secs(self.min_poll_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("feedgate_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen_addr, "127.0.0.1:3096");
        assert_eq!(config.default_poll_minutes, 5);
        assert_eq!(config.unfollow_policy, UnfollowPolicy::Stop);
        assert!(!config.allow_private_hosts);
        assert_eq!(config.default_poll_interval(), Duration::from_secs(300));
        assert_eq!(config.language, "en-us");
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedgate_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:3096");
    }

    #[test]
    fn test_empty_file_returns_default() {
        let (dir, path) = write_config("empty", "");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.default_poll_minutes, 5);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let (dir, path) = write_config("partial", "listen_addr = \"0.0.0.0:8080\"\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:8080");
        assert_eq!(config.request_timeout_secs, 30);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let content = r#"
listen_addr = "127.0.0.1:4000"
database_path = "/var/lib/feedgate/feeds.db"
bundle_server = "http://127.0.0.1:3094"
bundle_inserter = "http://127.0.0.1:3096/"
feeds_file = "out/feeds.json"
items_dir = "out/items"
default_poll_minutes = 10
min_poll_seconds = 5
request_timeout_secs = 12
unfollow_policy = "leave_running"
allow_private_hosts = true
language = "fr-fr"
translations_dir = "i18n"
"#;
        let (dir, path) = write_config("full", content);
        let config = Config::load(&path).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/var/lib/feedgate/feeds.db"));
        assert_eq!(config.items_dir, PathBuf::from("out/items"));
        assert_eq!(config.default_poll_interval(), Duration::from_secs(600));
        assert_eq!(config.min_poll_interval(), Duration::from_secs(5));
        assert_eq!(config.request_timeout(), Duration::from_secs(12));
        assert_eq!(config.unfollow_policy, UnfollowPolicy::LeaveRunning);
        assert!(config.allow_private_hosts);
        assert_eq!(config.language, "fr-fr");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = write_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let (dir, path) = write_config("unknown", "language = \"en-us\"\nshiny = 42\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.language, "en-us");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let (dir, path) = write_config("policy", "unfollow_policy = \"pause\"\n");
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_bad_listen_addr_rejected() {
        let (dir, path) = write_config("listen", "listen_addr = \"not an address\"\n");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "listen_addr", .. }));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_poll_minutes_rejected() {
        let (dir, path) = write_config("zero_poll", "default_poll_minutes = 0\n");
        assert!(matches!(
            Config::load(&path),
            Err(ConfigError::Invalid {
                key: "default_poll_minutes",
                ..
            })
        ));
        std::fs::remove_dir_all(&dir).ok();
    }
}
