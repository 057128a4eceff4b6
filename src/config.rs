//! Configuration management for the election engine
//!
//! Loads settings from environment variables (and a `.env` file when present)
//! with validation.

use crate::types::PublicationMode;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Engine behaviour knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Refuse to close a round until every active candidate has a result row
    pub require_complete_results: bool,

    /// Upper bound on candidates registered for a single position
    pub max_candidates_per_position: usize,

    /// Mode used when a publication does not name one
    pub default_publication_mode: PublicationMode,
}

impl EngineConfig {
    /// Load engine configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build engine configuration from a variable source
    ///
    /// `lookup` returns the value of a variable or `None` when unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let require_complete_results = lookup("RUNOFF_REQUIRE_COMPLETE_RESULTS")
            .unwrap_or_else(|| "false".to_string())
            .parse()
            .map_err(|_| Error::internal("Invalid RUNOFF_REQUIRE_COMPLETE_RESULTS"))?;

        let max_candidates_per_position: usize = lookup("RUNOFF_MAX_CANDIDATES")
            .unwrap_or_else(|| "64".to_string())
            .parse()
            .map_err(|_| Error::internal("Invalid RUNOFF_MAX_CANDIDATES"))?;

        if max_candidates_per_position == 0 {
            return Err(Error::internal("RUNOFF_MAX_CANDIDATES must be at least 1"));
        }

        let default_publication_mode = lookup("RUNOFF_PUBLICATION_MODE")
            .unwrap_or_else(|| "PROJECTOR".to_string())
            .parse()
            .map_err(|_| Error::internal("Invalid RUNOFF_PUBLICATION_MODE"))?;

        Ok(Self {
            require_complete_results,
            max_candidates_per_position,
            default_publication_mode,
        })
    }

    /// Create configuration for testing
    pub fn for_testing() -> Self {
        Self {
            require_complete_results: false,
            max_candidates_per_position: 16,
            default_publication_mode: PublicationMode::Projector,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            require_complete_results: false,
            max_candidates_per_position: 64,
            default_publication_mode: PublicationMode::Projector,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from environment
    pub fn from_env() -> Result<Self> {
        let engine = EngineConfig::from_env()?;

        let logging = LoggingConfig {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        };

        Ok(Self { engine, logging })
    }

    /// Create configuration for testing
    pub fn for_testing() -> Result<Self> {
        let engine = EngineConfig::for_testing();

        let logging = LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        };

        Ok(Self { engine, logging })
    }
}
