//! Tracestore Error - Unified Error Types
//!
//! Error handling for all storage engine operations. Distinguishes caller
//! mistakes (bad indices, non-monotonic time, queries on empty rows) from
//! resource exhaustion and data corruption, so that the presentation layer
//! can substitute placeholders while operators still see real failures.
//!
//! @version 0.1.0
//! @author Tracestore Development Team

use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Unified error type for all tracestore operations.
#[derive(Error, Debug)]
pub enum TraceError {
    // Query errors
    #[error("empty range: {0}")]
    EmptyRange(String),

    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("average calculation not defined for row {0}")]
    AverageNotDefined(usize),

    // Write errors
    #[error("inconsistent write: {0}")]
    InconsistentWrite(String),

    #[error("non-monotonic time: {given} does not follow {previous}")]
    NonMonotonicTime { previous: f64, given: f64 },

    #[error("invalid state: {0}")]
    InvalidState(String),

    // Storage errors
    #[error("out of resources: {0}")]
    OutOfResources(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("corruption detected: {0}")]
    Corruption(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Type Aliases
// =============================================================================

/// Result type alias for tracestore operations.
pub type Result<T> = std::result::Result<T, TraceError>;

// =============================================================================
// Error Classification
// =============================================================================

impl TraceError {
    /// Returns true if the operation may succeed when retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TraceError::OutOfResources(_))
    }

    /// Returns true if this is a caller error (vs engine error).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            TraceError::EmptyRange(_)
                | TraceError::IndexOutOfRange { .. }
                | TraceError::AverageNotDefined(_)
                | TraceError::InconsistentWrite(_)
                | TraceError::NonMonotonicTime { .. }
                | TraceError::InvalidState(_)
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
