//! Error handling for the burp2api conversion library.
//!
//! This module defines the main error type `Error` used throughout the library,
//! along with a convenient `Result` type alias. It uses `thiserror` for easy
//! error handling and implements conversions from common error types.
//!
//! Only unrecoverable problems surface here. Undecodable request bytes and
//! parameter strings that fail JSON parsing are handled in place and never
//! become an `Error`.
//!
//! # Examples
//!
//! ```
//! use burp2api_core::error::{Error, Result};
//!
//! fn might_fail() -> Result<()> {
//!     Err(Error::missing_field(0, "method"))
//! }
//!
//! assert!(might_fail().is_err());
//! ```

use thiserror::Error;

/// Result type for burp2api operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for burp2api operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed or unserializable Burp XML document
    #[error("XML error: {0}")]
    Xml(String),

    /// A traffic record is missing a field the pipeline cannot do without
    #[error("record {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    /// A record URL has no authority component to derive the server from
    #[error("cannot derive host from URL '{0}'")]
    InvalidUrl(String),
}

impl Error {
    /// Create a new XML error
    pub fn xml<S: Into<String>>(msg: S) -> Self {
        Self::Xml(msg.into())
    }

    /// Create a new missing-field error for the record at `index`
    pub fn missing_field(index: usize, field: &'static str) -> Self {
        Self::MissingField { index, field }
    }
}
