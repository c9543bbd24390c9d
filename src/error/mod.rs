//! Error types for Parley.

use std::sync::Arc;

use thiserror::Error;

/// Primary error type for all Parley operations.
#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        /// Leading part of the outgoing request body, kept for diagnosis.
        payload_excerpt: Option<String>,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Provider error: {provider}: {message}")]
    Provider { provider: String, message: String },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Function execution error: {function_name}: {message}")]
    FunctionExecution {
        function_name: String,
        message: String,
    },

    #[error("Execution exceeded {max_rounds} rounds")]
    RoundLimitExceeded { max_rounds: usize },

    #[error("Execution canceled")]
    Canceled,
}

impl ParleyError {
    /// Create an API error without a payload excerpt.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
            payload_excerpt: None,
        }
    }

    /// Create a protocol violation error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a function execution error.
    pub fn function(function_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FunctionExecution {
            function_name: function_name.into(),
            message: message.into(),
        }
    }

    /// Whether this error is the expected outcome of a cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

/// Error shared between the two output streams of one execution.
pub type SharedError = Arc<ParleyError>;

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ParleyError>;
