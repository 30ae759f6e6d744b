//! Core error types.

use std::fmt;

/// Errors surfaced by routing, registration, and response handling.
#[derive(Debug)]
pub enum Error {
    /// Route pattern failed validation at registration time.
    MalformedPattern { pattern: String, reason: String },

    /// Registration collided with an existing route.
    RouteConflict { method: String, pattern: String },

    /// Response payload could not be serialized.
    Serialization(serde_json::Error),

    /// Template rendering failed or no engine is configured.
    Render(String),

    /// Session lookup or storage failure.
    Session(String),

    /// Configuration loading failure.
    Config { key: String, message: String },

    /// I/O error.
    Io(std::io::Error),

    /// HTTP error.
    Http(http::Error),

    /// Custom error with message.
    Custom(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedPattern { pattern, reason } => {
                write!(f, "malformed pattern '{}': {}", pattern, reason)
            }
            Error::RouteConflict { method, pattern } => {
                write!(
                    f,
                    "route conflict: {} '{}' collides with an existing registration",
                    method, pattern
                )
            }
            Error::Serialization(e) => write!(f, "serialization error: {}", e),
            Error::Render(msg) => write!(f, "render error: {}", msg),
            Error::Session(msg) => write!(f, "session error: {}", msg),
            Error::Config { key, message } => {
                write!(f, "invalid configuration for {}: {}", key, message)
            }
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Http(e) => write!(f, "HTTP error: {}", e),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Serialization(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<http::Error> for Error {
    fn from(e: http::Error) -> Self {
        Error::Http(e)
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Custom(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Custom(msg.to_string())
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
