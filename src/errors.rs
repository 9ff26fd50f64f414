//! Error types for cyclekeeper
//!
//! Two layers: `ControllerError` for failures of the controller itself, and
//! `OperationError` for failures reported by the operation layer it paces.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for the pacing and recovery controller
#[derive(Error, Debug)]
pub enum ControllerError {
    /// State machine transition errors
    #[error("Invalid state transition from {from:?} to {to:?}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    /// Health probe execution errors
    #[error("Probe '{name}' failed: {reason}")]
    Probe { name: String, reason: String },

    /// Operational target action errors
    #[error("Recovery action '{action}' failed: {reason}")]
    TargetAction { action: String, reason: String },

    /// Escalation ladder and emergency recovery both exhausted
    #[error("Recovery exhausted after {consecutive_failures} consecutive failures: {reason}")]
    RecoveryExhausted {
        consecutive_failures: u32,
        reason: String,
    },

    /// Shutdown requested while waiting or recovering
    #[error("Cancelled by shutdown signal")]
    Cancelled,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Timeout errors
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic errors with context
    #[error("Controller error: {0}")]
    Generic(String),
}

impl ControllerError {
    /// Whether this error must stop the scheduler and be surfaced to an operator
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ControllerError::RecoveryExhausted { .. } | ControllerError::ConfigError(_)
        )
    }
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;

/// Convert anyhow errors to ControllerError
impl From<anyhow::Error> for ControllerError {
    fn from(err: anyhow::Error) -> Self {
        ControllerError::Generic(err.to_string())
    }
}

/// Error taxonomy for failures reported by the operation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Connectivity problems (DNS, resets, timeouts)
    Network,
    /// Memory, disk or cpu exhaustion
    Resource,
    /// The remote service refused or is in maintenance
    ServiceUnavailable,
    /// Generic operational failure of the driven subsystem
    Browser,
    /// No hint available
    Unknown,
}

impl ErrorKind {
    /// Taxonomy name as reported to collaborators
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network_error",
            ErrorKind::Resource => "resource_error",
            ErrorKind::ServiceUnavailable => "service_unavailable",
            ErrorKind::Browser => "browser_error",
            ErrorKind::Unknown => "unknown_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure reported by one operation cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationError {
    /// Classification hint supplied by the operation layer
    pub kind: ErrorKind,

    /// Free-form error message
    pub message: String,
}

impl OperationError {
    /// Create an error with an explicit classification hint
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create an error without a classification hint
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }
}

impl fmt::Display for OperationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for OperationError {}
