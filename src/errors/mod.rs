//! Error types for the timestamp transport.
//!
//! Every failure surfaced to the protocol layer collapses into one of three
//! kinds: rejected input, allocation failure, or a fatal network failure.
//! HTTP status failures are not errors; they are recorded on the
//! [`RequestHandle`](crate::transport::RequestHandle) instead.

use std::fmt;
use thiserror::Error;

/// Result type alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Stable error codes exposed to callers that branch on codes rather than
/// on error values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Operation completed.
    Ok,
    /// An argument or the object state was rejected before any mutation.
    InvalidArgument,
    /// A buffer could not be allocated or would exceed its size limit.
    OutOfMemory,
    /// The transfer failed below the HTTP status level.
    NetworkError,
}

impl ErrorCode {
    /// Returns the stable upper-case name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Ok => "OK",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::OutOfMemory => "OUT_OF_MEMORY",
            ErrorCode::NetworkError => "NETWORK_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for transport operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Invalid argument or misuse of a handle/environment.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message describing the rejected input.
        message: String,
    },

    /// Allocation failure or size overflow.
    #[error("Out of memory: {message}")]
    OutOfMemory {
        /// Error message describing what could not be allocated.
        message: String,
    },

    /// Fatal network failure (resolution, connect, TLS, timeout, ...).
    #[error("Network error: {message}")]
    Network {
        /// Diagnostic text reported by the engine.
        message: String,
    },
}

impl TransportError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        TransportError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an out of memory error.
    pub fn out_of_memory(message: impl Into<String>) -> Self {
        TransportError::OutOfMemory {
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        TransportError::Network {
            message: message.into(),
        }
    }

    /// Returns the stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            TransportError::InvalidArgument { .. } => ErrorCode::InvalidArgument,
            TransportError::OutOfMemory { .. } => ErrorCode::OutOfMemory,
            TransportError::Network { .. } => ErrorCode::NetworkError,
        }
    }

    /// Returns the diagnostic text, if any.
    pub fn diagnostic(&self) -> Option<&str> {
        let message = match self {
            TransportError::InvalidArgument { message }
            | TransportError::OutOfMemory { message }
            | TransportError::Network { message } => message,
        };
        if message.is_empty() {
            None
        } else {
            Some(message)
        }
    }
}

impl From<std::collections::TryReserveError> for TransportError {
    fn from(err: std::collections::TryReserveError) -> Self {
        TransportError::OutOfMemory {
            message: err.to_string(),
        }
    }
}
