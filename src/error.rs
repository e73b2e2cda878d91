// src/error.rs

//! Unified error handling for the discovery engine.

use std::fmt;

use thiserror::Error;

/// Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Page retrieval failed after all fallbacks
    #[error("Fetch failed for {url}: {message}")]
    Fetch {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a fetch error without an HTTP status.
    pub fn fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            status: None,
            message: message.to_string(),
        }
    }

    /// Create a fetch error carrying the HTTP status code.
    pub fn fetch_status(url: impl Into<String>, status: u16, message: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.into(),
            status: Some(status),
            message: message.to_string(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Fetch { status, .. } => *status,
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
