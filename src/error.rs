//! Error types for http-testbed
//!
//! This module defines the error hierarchy used throughout the crate.
//! Every failure is either a configuration problem caught before a server
//! starts, a server lifecycle failure, or a client execution failure; each
//! wraps the underlying library error in exactly one typed layer.

use thiserror::Error;

/// Top-level crate error
#[derive(Error, Debug)]
pub enum TestbedError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {field}")]
    Missing { field: String },

    #[error("Invalid route descriptor: {0}")]
    Descriptor(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }
}

/// Embedded server lifecycle errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP client execution errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP transport error: {0}")]
    Transport(String),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Client has been destroyed")]
    Destroyed,
}

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, TestbedError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for server lifecycle operations
pub type ServerResult<T> = std::result::Result<T, ServerError>;

/// Result type alias for client operations
pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::invalid("path must start with '/'");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: path must start with '/'"
        );

        let err = ConfigError::Missing {
            field: "static_root".to_string(),
        };
        assert!(err.to_string().contains("static_root"));
    }

    #[test]
    fn test_error_conversions() {
        let err: TestbedError = ConfigError::invalid("boom").into();
        assert!(matches!(err, TestbedError::Config(_)));

        let err: TestbedError = ClientError::Destroyed.into();
        assert!(matches!(err, TestbedError::Client(_)));

        let io = std::io::Error::new(std::io::ErrorKind::AddrInUse, "taken");
        let err: ServerError = io.into();
        assert!(matches!(err, ServerError::Io(_)));
    }
}
