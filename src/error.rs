// src/error.rs

//! Unified error handling for the harvester.
//!
//! `AppError` covers pipeline-level failures (configuration, store, I/O).
//! Per-document failures use the narrower `FetchError`, `RenderError` and
//! `DocumentError` types so the batch can classify them without matching on
//! message text.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction or request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization failed
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// SQLite operation failed
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// State store is unusable (e.g. poisoned lock)
    #[error("Store error: {0}")]
    Store(String),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Page could not be fetched
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a store error.
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}

/// Failure of a single HTTP GET.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Timeout, connection reset, DNS failure and the like
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    /// Non-success HTTP status
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// URL could not be parsed or has no usable scheme
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
}

impl FetchError {
    pub fn network(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Network failures and 5xx responses are transient; 4xx responses and
    /// malformed URLs are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidUrl { .. } => false,
        }
    }
}

/// Failure of a headless browser session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Browser support not compiled in or no executable found
    #[error("browser unavailable: {0}")]
    Unavailable(String),

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    /// DevTools protocol error after the page loaded
    #[error("browser protocol error: {0}")]
    Protocol(String),
}

/// Terminal failure of one document extraction.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error(transparent)]
    Network(#[from] FetchError),

    /// Page was reached but a required field did not match any selector
    #[error("parse error: {0}")]
    Parse(String),

    /// Fields were found but fail the quality thresholds
    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("store error: {0}")]
    Store(#[from] AppError),

    /// The output sink rejected the record
    #[error("output error: {0}")]
    Output(String),

    #[error("timed out after {secs}s")]
    TimedOut { secs: u64 },
}

impl DocumentError {
    /// Stable label written into the processing log.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Parse(_) => "parse",
            Self::Validation(_) => "validation",
            Self::Render(_) => "render",
            Self::Store(_) => "store",
            Self::Output(_) => "output",
            Self::TimedOut { .. } => "timeout",
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
