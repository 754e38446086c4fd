//! Error types for the Panopticon load generator

use std::path::PathBuf;
use thiserror::Error;

use crate::registry::ResourceId;

/// Result type alias for load test operations
pub type Result<T> = std::result::Result<T, LoadTestError>;

/// Top-level errors surfaced to the driver and the CLI
#[derive(Error, Debug)]
pub enum LoadTestError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Failed to render config: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),
}

/// Invalid session or pool configuration.
///
/// Always raised at construction time, before any session reaches `Running`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Action set is empty")]
    EmptyActionSet,

    #[error("Action '{action}' has non-positive weight {weight}")]
    NonPositiveWeight { action: String, weight: i64 },

    #[error("Invalid think time bounds: min={min}s max={max}s")]
    InvalidThinkTime { min: f64, max: f64 },

    #[error("Invalid success status for {action}: {status}")]
    InvalidStatus { action: String, status: u16 },

    #[error("Invalid pool settings: {0}")]
    InvalidPool(String),
}

/// Resource registry bookkeeping errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Resource id already recorded: {0}")]
    DuplicateId(ResourceId),
}

/// Transport-level failure of a single API call.
///
/// Never propagated out of a session; the engine folds it into the outcome
/// of the action that issued the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Failed to read response body: {0}")]
    Body(String),
}

impl TransportError {
    /// Short label used as the error key in counters
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect(_) => "connect",
            Self::Request(_) => "request",
            Self::Body(_) => "body",
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}
