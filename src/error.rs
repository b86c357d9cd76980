//! Custom error types for episode-renamer.
//!
//! Every fallible operation in the crate returns [`AppError`]. Parse misses in
//! the filename parser are not errors; they surface as absent fields instead.

use crate::pattern::{PatternError, RenderFailure};
use crate::plan::Collision;
use std::error::Error;
use std::fmt;
use std::io;

/// Application error types.
#[derive(Debug)]
pub enum AppError {
    /// Network/HTTP errors
    Network(String),
    /// API response parsing errors
    Parse(String),
    /// Configuration errors
    Config(String),
    /// File I/O errors
    Io(io::Error),
    /// Rejected credentials or token
    Auth(String),
    /// Remote path does not exist
    NotFound(String),
    /// Any other non-200 envelope from the service
    Api { code: i64, message: String },
    /// Invalid input from user
    InvalidInput(String),
    /// Malformed naming pattern or search expression
    Pattern(String),
    /// One or more files could not be rendered with the chosen pattern
    Render(Vec<RenderFailure>),
    /// The rename plan maps two files onto one name, or onto an untouched sibling
    Collision(Vec<Collision>),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Network(msg) => write!(f, "Network error: {}", msg),
            AppError::Parse(msg) => write!(f, "Parse error: {}", msg),
            AppError::Config(msg) => write!(f, "Config error: {}", msg),
            AppError::Io(err) => write!(f, "I/O error: {}", err),
            AppError::Auth(msg) => write!(f, "Authentication failed: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Api { code, message } => write!(f, "Server error {}: {}", code, message),
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::Pattern(msg) => write!(f, "Pattern error: {}", msg),
            AppError::Render(failures) => {
                write!(f, "Could not build names for {} file(s): ", failures.len())?;
                let parts: Vec<String> = failures.iter().map(|x| x.to_string()).collect();
                write!(f, "{}", parts.join("; "))
            }
            AppError::Collision(collisions) => {
                write!(f, "Rename plan has {} name collision(s): ", collisions.len())?;
                let parts: Vec<String> = collisions.iter().map(|c| c.to_string()).collect();
                write!(f, "{}", parts.join("; "))
            }
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Io(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AppError::Parse(err.to_string())
        } else {
            AppError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AppError {
    fn from(err: toml::ser::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<regex::Error> for AppError {
    fn from(err: regex::Error) -> Self {
        AppError::Pattern(err.to_string())
    }
}

impl From<PatternError> for AppError {
    fn from(err: PatternError) -> Self {
        AppError::Pattern(err.to_string())
    }
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;
