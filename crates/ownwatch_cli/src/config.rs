//! Configuration file support for ownwatch.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (`OWNWATCH_` prefix, `__` between section and key,
//!    e.g. `OWNWATCH_TRAKT__CLIENT_ID`)
//! 3. Config file (./ownwatch.toml, then ~/.config/ownwatch/config.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/ownwatch/ownwatch.db`
//! on Linux (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite:///var/lib/ownwatch/ownwatch.db?mode=rwc"
//!
//! [trakt]
//! client_id = "..."  # or OWNWATCH_TRAKT__CLIENT_ID
//! api_url = "https://api.trakt.tv"
//! fetch_timeout_secs = 60
//!
//! [micropub]
//! publish_timeout_secs = 600
//!
//! [scheduler]
//! enabled = true
//! interval_minutes = 30
//!
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [sync]
//! unknown_kind = "abort"  # or "skip"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config as ConfigBuilder, ConfigBuilder as Builder, Environment, File, FileFormat};
use directories::ProjectDirs;
use ownwatch::UnknownKindPolicy;
use ownwatch::micropub::DEFAULT_PUBLISH_TIMEOUT;
use ownwatch::trakt::{DEFAULT_API_URL, DEFAULT_FETCH_TIMEOUT};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub trakt: TraktConfig,
    pub micropub: MicropubConfig,
    pub scheduler: SchedulerConfig,
    pub server: ServerConfig,
    pub sync: SyncConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Supports sqlite:// and postgres:// schemes.
    pub url: Option<String>,
}

/// Trakt API configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TraktConfig {
    /// OAuth application client id, sent as `trakt-api-key`.
    pub client_id: Option<String>,
    pub api_url: String,
    pub fetch_timeout_secs: u64,
}

impl Default for TraktConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            api_url: DEFAULT_API_URL.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MicropubConfig {
    pub publish_timeout_secs: u64,
}

impl Default for MicropubConfig {
    fn default() -> Self {
        Self {
            publish_timeout_secs: DEFAULT_PUBLISH_TIMEOUT.as_secs(),
        }
    }
}

/// Background sweep configuration for `ownwatch serve`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 30,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the trigger server listens on.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// What to do with history entries that are neither movies nor episodes.
    pub unknown_kind: UnknownKindPolicy,
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/ownwatch/config.toml)
    /// 3. Local config file (./ownwatch.toml)
    /// 4. Environment variables with OWNWATCH_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("ownwatch.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./ownwatch.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // OWNWATCH_TRAKT__CLIENT_ID -> trakt.client_id
        builder = builder.add_source(
            Environment::with_prefix("OWNWATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        Self::from_builder(builder)
    }

    fn from_builder(builder: Builder<DefaultState>) -> Self {
        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter creates the SQLite file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("ownwatch.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.trakt.fetch_timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.micropub.publish_timeout_secs)
    }

    /// Scheduler interval; never shorter than one minute.
    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.scheduler.interval_minutes.max(1) * 60)
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ownwatch").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/ownwatch` or `~/.local/state/ownwatch`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "ownwatch").map(|dirs| {
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Config {
        Config::from_builder(
            ConfigBuilder::builder().add_source(File::from_str(toml, FileFormat::Toml)),
        )
    }

    #[test]
    fn defaults_match_library_constants() {
        let config = Config::default();

        assert_eq!(config.trakt.api_url, DEFAULT_API_URL);
        assert_eq!(config.fetch_timeout(), DEFAULT_FETCH_TIMEOUT);
        assert_eq!(config.publish_timeout(), DEFAULT_PUBLISH_TIMEOUT);
        assert_eq!(config.schedule_interval(), Duration::from_secs(30 * 60));
        assert!(config.scheduler.enabled);
        assert_eq!(config.sync.unknown_kind, UnknownKindPolicy::Abort);
    }

    #[test]
    fn file_values_override_defaults() {
        let config = from_toml(
            r#"
            [database]
            url = "sqlite::memory:"

            [trakt]
            client_id = "abc"
            fetch_timeout_secs = 5

            [scheduler]
            enabled = false
            interval_minutes = 5

            [sync]
            unknown_kind = "skip"
            "#,
        );

        assert_eq!(config.database_url().as_deref(), Some("sqlite::memory:"));
        assert_eq!(config.trakt.client_id.as_deref(), Some("abc"));
        assert_eq!(config.trakt.api_url, DEFAULT_API_URL);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(5));
        assert!(!config.scheduler.enabled);
        assert_eq!(config.schedule_interval(), Duration::from_secs(300));
        assert_eq!(config.sync.unknown_kind, UnknownKindPolicy::Skip);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let config = from_toml("[scheduler]\ninterval_minutes = 0\n");
        assert_eq!(config.schedule_interval(), Duration::from_secs(60));
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = from_toml("[sync]\nunknown_kind = \"explode\"\n");
        assert_eq!(config.sync.unknown_kind, UnknownKindPolicy::Abort);
    }
}
