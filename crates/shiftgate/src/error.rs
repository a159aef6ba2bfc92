//! Error types for shiftgate.
//!
//! This module defines all error types used throughout the shiftgate crate.
//! "Not found" for single-record lookups is not an error: those operations
//! return `Ok(None)`.

use thiserror::Error;

/// The main error type for shiftgate operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Gateway Errors ===
    /// The gateway has no usable credentials. Raised before any network I/O.
    #[error("gateway not configured: {message}")]
    Configuration {
        /// Which credential is missing or still a placeholder.
        message: String,
    },

    /// The backend answered with a non-2xx status, or the request never
    /// completed.
    #[error("{}", connection_message(.status, .message))]
    Connection {
        /// HTTP status, absent for transport-level failures.
        status: Option<u16>,
        /// Raw response body or transport error text.
        message: String,
    },

    /// A required record does not exist.
    #[error("not found: {what}")]
    NotFound {
        /// What was being looked up.
        what: String,
    },

    /// Input or stored data violates a local rule.
    #[error("validation failed: {message}")]
    Validation {
        /// Description of the violation.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for shiftgate operations.
pub type Result<T> = std::result::Result<T, Error>;

fn connection_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("backend request failed with status {status}: {message}"),
        None => format!("backend unreachable: {message}"),
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Connection {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl Error {
    /// Create a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection error for a non-2xx response.
    #[must_use]
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Connection {
            status: Some(status),
            message: body.into(),
        }
    }

    /// Create a connection error for a request that never got a response.
    #[must_use]
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Connection {
            status: None,
            message: message.into(),
        }
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status carried by a connection error.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Connection { status, .. } => *status,
            _ => None,
        }
    }

    /// Check if this error comes from an unconfigured gateway.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Check if this error is a backend or transport failure.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Check if this error reports a missing record.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
