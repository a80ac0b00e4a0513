//! Error classification and recovery hints.

use serde::{Deserialize, Serialize};

/// Broad error category, used by hosts to map failures onto their transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Configuration,
    InvalidInput,
    Authentication,
    RateLimit,
    Network,
    Server,
    Backend,
    ToolExecution,
    Persistence,
    Limit,
    Relay,
    Serialization,
    Unknown,
}

impl ErrorCategory {
    /// Whether the failure was caused by the request rather than the system.
    pub fn is_client_error(self) -> bool {
        matches!(self, Self::InvalidInput)
    }
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    CheckCredentials,
    CheckConfiguration,
    CheckStorage,
    FixRequest,
    RaiseStepLimit,
    CheckToolImplementation,
    ContactSupport,
}
