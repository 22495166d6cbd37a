//! Error types for CallBridge
//!
//! Errors that stay inside the bridge. Everything that reaches the remote caller
//! is a [`Status`]; these types describe transport, queue and configuration
//! failures and convert into a status where one has to be reported.

use crate::status::Status;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Failures reported by a `ServerCall` implementation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Call already closed")]
    AlreadyClosed,
    #[error("Response headers already sent")]
    HeadersAlreadySent,
    #[error("Transport closed the call: {reason}")]
    Closed { reason: String },
    #[error("Transport error: {0}")]
    Other(String),
}

/// Producer-side failures of the inbound queue
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Inbound queue is closed")]
    Closed,
    #[error("Inbound queue capacity exceeded (capacity: {capacity})")]
    CapacityExceeded { capacity: usize },
}

/// Invalid driver configuration
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("unary_request_credit must be at least 2 to detect extra requests, got {0}")]
    UnaryCreditTooLow(usize),
    #[error("{field} must be at least 1")]
    ZeroCredit { field: &'static str },
    #[error("Bounded inbound queue capacity must be at least 1")]
    ZeroQueueCapacity,
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Call failed: {0}")]
    Status(#[from] Status),
}

// ----------------------------------------------------------------------------
// Status Conversions
// ----------------------------------------------------------------------------

impl From<TransportError> for Status {
    fn from(err: TransportError) -> Self {
        Status::internal(err.to_string())
    }
}

impl From<QueueError> for Status {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Closed => Status::internal(err.to_string()),
            QueueError::CapacityExceeded { .. } => Status::resource_exhausted(err.to_string()),
        }
    }
}

impl From<BridgeError> for Status {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::Status(status) => status,
            BridgeError::Transport(err) => err.into(),
            BridgeError::Queue(err) => err.into(),
            BridgeError::Config(err) => Status::failed_precondition(err.to_string()),
        }
    }
}
