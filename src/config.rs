//! Configuration file parser for `rss-merger.toml`.
//!
//! The config file is optional. A missing file yields `Config::default()`,
//! which serves the two Learning English feeds on port 8080.
//! Unknown keys are accepted by serde but logged as warnings.
use crate::merge::{DuplicateMatches, MergeSettings, DEFAULT_LANGUAGE};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level service configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Socket address the HTTP server binds to.
    pub listen_addr: String,

    /// Feed supplying article titles and descriptions.
    pub text_feed_url: String,

    /// Feed supplying audio enclosures, durations and the cover image.
    pub audio_feed_url: String,

    /// Shared deadline for fetching both feeds, in seconds.
    pub fetch_timeout_secs: u64,

    /// Language tag written to the merged feed.
    pub language: String,

    /// Policy for several audio items matching one article.
    pub duplicate_matches: DuplicateMatches,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            text_feed_url: "https://learningenglish.voanews.com/api/zmg_pe$myp".to_string(),
            audio_feed_url: "https://learningenglish.voanews.com/podcast/?zoneId=1579"
                .to_string(),
            fetch_timeout_secs: 5,
            language: DEFAULT_LANGUAGE.to_string(),
            duplicate_matches: DuplicateMatches::Keep,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "listen_addr",
        "text_feed_url",
        "audio_feed_url",
        "fetch_timeout_secs",
        "language",
        "duplicate_matches",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
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
                // Race condition: file deleted between metadata and read
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
        tracing::info!(
            path = %path.display(),
            listen = %config.listen_addr,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Rejects values the server cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_feed_url("text_feed_url", &self.text_feed_url)?;
        validate_feed_url("audio_feed_url", &self.audio_feed_url)?;

        if self.fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fetch_timeout_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.language.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "language",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn merge_settings(&self) -> MergeSettings {
        MergeSettings {
            text_feed_url: self.text_feed_url.clone(),
            audio_feed_url: self.audio_feed_url.clone(),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            language: self.language.clone(),
            duplicate_matches: self.duplicate_matches,
        }
    }
}

fn validate_feed_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidValue {
        field,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::InvalidValue {
            field,
            reason: format!("unsupported scheme {} (only http/https allowed)", scheme),
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================
