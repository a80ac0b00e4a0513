//! Error types for palaver.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all palaver operations.
#[derive(Error, Debug)]
pub enum PalaverError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Checkpoint {operation} failed: {message}")]
    Persistence { operation: String, message: String },

    #[error("Checkpoint store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Agent loop exceeded max steps (max_steps={max_steps})")]
    StepLimitExceeded { max_steps: usize },

    #[error("Relay error on channel {channel}: {message}")]
    Relay { channel: String, message: String },
}

impl PalaverError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a persistence error for a named store operation.
    pub fn persistence(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a relay error for a channel.
    pub fn relay(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Relay {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::InvalidInput(_) => ErrorCategory::InvalidInput,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Backend,
            },
            Self::Network(_) => ErrorCategory::Network,
            Self::Model(_) | Self::Stream(_) => ErrorCategory::Backend,
            Self::ToolExecution { .. } => ErrorCategory::ToolExecution,
            Self::Persistence { .. } | Self::StoreUnavailable(_) => ErrorCategory::Persistence,
            Self::StepLimitExceeded { .. } => ErrorCategory::Limit,
            Self::Relay { .. } => ErrorCategory::Relay,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Io(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit | ErrorCategory::Network | ErrorCategory::Server
        ) || matches!(self, Self::Persistence { .. })
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit | ErrorCategory::Network | ErrorCategory::Server => {
                RecoverySuggestion::RetryWithBackoff
            }
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::InvalidInput => RecoverySuggestion::FixRequest,
            ErrorCategory::Persistence => RecoverySuggestion::CheckStorage,
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolImplementation,
            ErrorCategory::Limit => RecoverySuggestion::RaiseStepLimit,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, PalaverError>;
