//! Error types for telemon.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for telemon operations.
pub type Result<T> = std::result::Result<T, TelemonError>;

/// Main error type for telemon.
#[derive(Error, Debug)]
pub enum TelemonError {
    // Transport errors
    #[error("Subscription to {topic} failed: {reason}")]
    SubscribeFailed { topic: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Observability errors
    #[error("Observability setup failed: {reason}")]
    ObservabilitySetup { reason: String },

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while turning a raw broker payload into a sample.
///
/// These never leave the supervisor: they are logged, counted and dropped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("Malformed payload: {reason}")]
    MalformedPayload { reason: String },
}

impl IngestError {
    /// Short, stable label used for metric dimensions.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::MalformedPayload { .. } => "malformed_payload",
        }
    }
}
