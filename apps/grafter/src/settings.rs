//! # Settings
//!
//! Application settings loaded from a TOML file, with environment overrides.
//!
//! ```toml
//! max_undo_levels = 50
//! log_format = "text"
//!
//! [server]
//! host = "127.0.0.1"
//! port = 8080
//! cors_origins = ["http://localhost:3000"]
//! ```
//!
//! ## Environment Variables
//!
//! - `GRAFTER_MAX_UNDO_LEVELS`: overrides `max_undo_levels` (`0` = unlimited)
//! - `GRAFTER_CORS_ORIGINS`: comma-separated origins, or `*` for all
//! - `GRAFTER_LOG_FORMAT`: `text` or `json`

use grafter_core::{CommandManagerConfig, GrafterError, primitives::DEFAULT_MAX_UNDO_LEVELS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File looked for in the working directory when `--config` is not given.
pub const DEFAULT_SETTINGS_FILE: &str = "grafter.toml";

pub const ENV_MAX_UNDO_LEVELS: &str = "GRAFTER_MAX_UNDO_LEVELS";
pub const ENV_CORS_ORIGINS: &str = "GRAFTER_CORS_ORIGINS";
pub const ENV_LOG_FORMAT: &str = "GRAFTER_LOG_FORMAT";

// =============================================================================
// SETTINGS
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// `[server]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. Empty means localhost only; `["*"]` allows all.
    pub cors_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: Vec::new(),
        }
    }
}

/// Top-level settings. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Undo history cap; `0` keeps every entry.
    pub max_undo_levels: usize,
    pub log_format: LogFormat,
    pub server: ServerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_undo_levels: DEFAULT_MAX_UNDO_LEVELS,
            log_format: LogFormat::default(),
            server: ServerSettings::default(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, GrafterError> {
        toml::from_str(text).map_err(|e| GrafterError::Config(format!("Invalid settings: {}", e)))
    }

    /// Read settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, GrafterError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            GrafterError::Io(format!("Cannot read settings '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Load settings the way the binary does.
    ///
    /// An explicit path must exist. Without one, `grafter.toml` in the working
    /// directory is used if present, defaults otherwise. Environment overrides are
    /// applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, GrafterError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_SETTINGS_FILE);
                if default_path.is_file() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), GrafterError> {
        if let Some(value) = lookup(ENV_MAX_UNDO_LEVELS) {
            self.max_undo_levels = value.trim().parse().map_err(|_| {
                GrafterError::Config(format!(
                    "{} must be a non-negative integer, got '{}'",
                    ENV_MAX_UNDO_LEVELS, value
                ))
            })?;
        }

        if let Some(value) = lookup(ENV_CORS_ORIGINS) {
            self.server.cors_origins = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(value) = lookup(ENV_LOG_FORMAT) {
            match LogFormat::parse(&value) {
                Some(format) => self.log_format = format,
                None => {
                    tracing::warn!("Ignoring unknown {} '{}'", ENV_LOG_FORMAT, value);
                }
            }
        }

        Ok(())
    }

    /// Command engine configuration derived from these settings.
    pub fn command_config(&self) -> CommandManagerConfig {
        CommandManagerConfig {
            max_undo_levels: self.max_undo_levels,
        }
    }

    /// `host:port` for binding the server.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
