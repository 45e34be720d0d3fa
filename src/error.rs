// src/error.rs

//! Unified error handling for the ingestion pipeline.

use std::fmt;

use thiserror::Error;

/// Result type alias for import operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Byte stream is not well-formed structured markup
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// Well-formed document missing fields the federal schema requires
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Page fetched but its structure was not understood by the adapter
    #[error("unrecognized layout ({adapter}): {message}")]
    UnrecognizedLayout { adapter: String, message: String },

    /// Page did not reach a stable, content-complete state in time
    #[error("fetch of {url} timed out after {timeout_ms}ms")]
    FetchTimeout { url: String, timeout_ms: u64 },

    /// Browser automation engine could not be initialized
    #[error("browser automation unavailable: {0}")]
    AutomationUnavailable(String),

    /// A note with this access key is already stored
    #[error("document already imported (access key {access_key})")]
    DuplicateDocument { access_key: String },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// CSS selector or regex pattern failed to compile
    #[error("invalid pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Create a malformed-document error.
    pub fn malformed(message: impl fmt::Display) -> Self {
        Self::MalformedDocument(message.to_string())
    }

    /// Create a schema-mismatch error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaMismatch(message.into())
    }

    /// Create an unrecognized-layout error tagged with the adapter name.
    pub fn layout(adapter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnrecognizedLayout {
            adapter: adapter.into(),
            message: message.into(),
        }
    }

    /// Create a fetch-timeout error.
    pub fn timeout(url: impl Into<String>, timeout_ms: u64) -> Self {
        Self::FetchTimeout {
            url: url.into(),
            timeout_ms,
        }
    }

    /// Create an automation-unavailable error.
    pub fn automation(message: impl fmt::Display) -> Self {
        Self::AutomationUnavailable(message.to_string())
    }

    /// Create a duplicate-document error.
    pub fn duplicate(access_key: impl Into<String>) -> Self {
        Self::DuplicateDocument {
            access_key: access_key.into(),
        }
    }

    /// Create a pattern compilation error.
    pub fn pattern(pattern: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this is the expected "already imported" outcome rather than a
    /// genuine fault. Callers present it as a conflict, not an error page.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateDocument { .. })
    }
}
