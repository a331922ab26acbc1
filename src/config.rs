//! Server configuration loaded from TOML with environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::game::{
    DEFAULT_BOARD_SIZE, DEFAULT_INITIAL_MOVES, MAX_BOARD_SIZE, MAX_INITIAL_MOVES, MatchSettings,
};
use crate::publish::HOF_KEY;

/// Environment variable holding the OAuth app client id.
pub const ENV_CLIENT_ID: &str = "GH_OAUTH_CLIENT_ID";
/// Environment variable holding the OAuth app client secret.
pub const ENV_CLIENT_SECRET: &str = "GH_OAUTH_CLIENT_SECRET";
/// Environment variable overriding the database path.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

/// Configuration of the match server.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind.
    #[serde(default = "default_host")]
    host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    port: u16,

    /// SQLite database file.
    #[serde(default = "default_db_path")]
    db_path: String,

    /// Edge length of new boards.
    #[serde(default = "default_board_size")]
    board_size: usize,

    /// Move budget of new matches.
    #[serde(default = "default_initial_moves")]
    initial_moves: u32,

    /// Directory receiving the hall-of-fame page when no upload URL is set.
    #[serde(default = "default_publish_dir")]
    publish_dir: PathBuf,

    /// Base URL the page is uploaded to with `PUT`; takes precedence over `publish_dir`.
    #[serde(default)]
    publish_url: Option<String>,

    /// Name of the published page.
    #[serde(default = "default_destination_key")]
    destination_key: String,

    /// Upper bound on one publication attempt.
    #[serde(default = "default_publish_timeout_ms")]
    publish_timeout_ms: u64,

    /// OAuth app client id.
    #[serde(default)]
    github_client_id: String,

    /// OAuth app client secret.
    #[serde(default)]
    github_client_secret: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "gridmatch.db".to_string()
}

fn default_board_size() -> usize {
    DEFAULT_BOARD_SIZE
}

fn default_initial_moves() -> u32 {
    DEFAULT_INITIAL_MOVES
}

fn default_publish_dir() -> PathBuf {
    PathBuf::from("site")
}

fn default_destination_key() -> String {
    HOF_KEY.to_string()
}

fn default_publish_timeout_ms() -> u64 {
    2000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            board_size: default_board_size(),
            initial_moves: default_initial_moves(),
            publish_dir: default_publish_dir(),
            publish_url: None,
            destination_key: default_destination_key(),
            publish_timeout_ms: default_publish_timeout_ms(),
            github_client_id: String::new(),
            github_client_secret: String::new(),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from TOML file.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the file if given, otherwise defaults, then applies the process environment.
    #[instrument]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = config.with_overrides(|name| std::env::var(name).ok());
        info!(
            host = %config.host,
            port = config.port,
            db_path = %config.db_path,
            "Config loaded successfully"
        );
        Ok(config)
    }

    /// Applies environment overrides read through `lookup`.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(id) = lookup(ENV_CLIENT_ID) {
            self.github_client_id = id;
        }
        if let Some(secret) = lookup(ENV_CLIENT_SECRET) {
            self.github_client_secret = secret;
        }
        if let Some(url) = lookup(ENV_DATABASE_URL).filter(|u| !u.is_empty()) {
            self.db_path = url;
        }
        self
    }

    /// Overrides the bind address.
    pub fn with_bind(mut self, host: Option<String>, port: Option<u16>) -> Self {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
        self
    }

    /// Settings applied to newly created matches.
    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            board_size: self.board_size,
            initial_moves: self.initial_moves,
        }
    }

    /// Publication timeout as a duration.
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_BOARD_SIZE).contains(&self.board_size) {
            return Err(ConfigError::new(format!(
                "board_size must be between 1 and {}",
                MAX_BOARD_SIZE
            )));
        }
        if !(1..=MAX_INITIAL_MOVES).contains(&self.initial_moves) {
            return Err(ConfigError::new(format!(
                "initial_moves must be between 1 and {}",
                MAX_INITIAL_MOVES
            )));
        }
        if self.destination_key.is_empty() {
            return Err(ConfigError::new(
                "destination_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
