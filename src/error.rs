//! Unified error hierarchy for SlopeTrack
//!
//! Only conditions a caller has to act on are errors. Data gaps in the sample
//! stream (missing altitude or speed, zero-length segments, a descent that never
//! clears the run threshold) are absorbed by the engine and never surface here.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for all SlopeTrack operations
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The sample source reported that location access was not granted
    #[error("Location permission denied")]
    PermissionDenied,

    /// Stop was requested before enough samples were collected to form a session
    #[error("Session too short: {samples} sample(s) recorded, at least 2 required")]
    SessionTooShort { samples: usize },

    /// The underlying subscription failed to start or terminated with an error
    #[error("Sample source failure: {0}")]
    SampleSourceFailure(String),

    /// Operation requires an active (tracking or paused) session
    #[error("Session is not tracking")]
    NotTracking,

    /// Session store errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Errors raised by session store implementations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying file access failed
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored data could not be decoded
    #[error("Corrupted session data in {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    /// A session could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Track import errors
#[derive(Debug, Error)]
pub enum ImportError {
    /// No importer handles this file
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// Format-specific parsing error
    #[error("Parse error in {format}: {reason}")]
    ParseError { format: String, reason: String },

    /// A required column or field is absent
    #[error("Missing required data: {field}")]
    MissingData { field: String },
}

/// Result type alias for SlopeTrack operations
pub type Result<T> = std::result::Result<T, TrackerError>;

impl TrackerError {
    /// Check if the caller may simply try the operation again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrackerError::PermissionDenied | TrackerError::SampleSourceFailure(_)
        )
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TrackerError::SessionTooShort { .. } => ErrorSeverity::Info,
            TrackerError::PermissionDenied | TrackerError::NotTracking => ErrorSeverity::Warning,
            TrackerError::SampleSourceFailure(_) => ErrorSeverity::Error,
            TrackerError::Storage(StorageError::Corrupted { .. }) => ErrorSeverity::Critical,
            TrackerError::Storage(_) => ErrorSeverity::Error,
            TrackerError::Configuration(_) => ErrorSeverity::Error,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            TrackerError::PermissionDenied => {
                "Location access is required to track a session. Enable it in your device settings and try again."
                    .to_string()
            }
            TrackerError::SessionTooShort { .. } => {
                "Please track for a longer duration to save the session.".to_string()
            }
            TrackerError::SampleSourceFailure(reason) => {
                format!("Lost the location signal: {}", reason)
            }
            _ => self.to_string(),
        }
    }
}

/// Error severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical error, stored data may be lost
    Critical,
    /// Error that prevents operation but system can continue
    Error,
    /// Warning that doesn't prevent operation
    Warning,
    /// Informational message
    Info,
}

impl ErrorSeverity {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            ErrorSeverity::Critical => tracing::Level::ERROR,
            ErrorSeverity::Error => tracing::Level::ERROR,
            ErrorSeverity::Warning => tracing::Level::WARN,
            ErrorSeverity::Info => tracing::Level::INFO,
        }
    }
}
