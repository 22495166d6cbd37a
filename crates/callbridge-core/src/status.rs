//! Call status codes and outcome mapping
//!
//! A `Status` is the single terminal result sent to the transport for every call.
//! `Exit` classifies how the unit of work serving a call ended, and
//! [`Exit::to_status`] turns that classification into the status put on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;

// ----------------------------------------------------------------------------
// Status Codes
// ----------------------------------------------------------------------------

/// Canonical RPC status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Code {
    Ok = 0,
    Cancelled = 1,
    Unknown = 2,
    InvalidArgument = 3,
    DeadlineExceeded = 4,
    NotFound = 5,
    AlreadyExists = 6,
    PermissionDenied = 7,
    ResourceExhausted = 8,
    FailedPrecondition = 9,
    Aborted = 10,
    OutOfRange = 11,
    Unimplemented = 12,
    Internal = 13,
    Unavailable = 14,
    DataLoss = 15,
    Unauthenticated = 16,
}

impl Code {
    /// Convert a wire value into a code. Unrecognized values map to `Unknown`.
    pub fn from_i32(value: i32) -> Code {
        match value {
            0 => Code::Ok,
            1 => Code::Cancelled,
            2 => Code::Unknown,
            3 => Code::InvalidArgument,
            4 => Code::DeadlineExceeded,
            5 => Code::NotFound,
            6 => Code::AlreadyExists,
            7 => Code::PermissionDenied,
            8 => Code::ResourceExhausted,
            9 => Code::FailedPrecondition,
            10 => Code::Aborted,
            11 => Code::OutOfRange,
            12 => Code::Unimplemented,
            13 => Code::Internal,
            14 => Code::Unavailable,
            15 => Code::DataLoss,
            16 => Code::Unauthenticated,
            _ => Code::Unknown,
        }
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    fn name(self) -> &'static str {
        match self {
            Code::Ok => "OK",
            Code::Cancelled => "CANCELLED",
            Code::Unknown => "UNKNOWN",
            Code::InvalidArgument => "INVALID_ARGUMENT",
            Code::DeadlineExceeded => "DEADLINE_EXCEEDED",
            Code::NotFound => "NOT_FOUND",
            Code::AlreadyExists => "ALREADY_EXISTS",
            Code::PermissionDenied => "PERMISSION_DENIED",
            Code::ResourceExhausted => "RESOURCE_EXHAUSTED",
            Code::FailedPrecondition => "FAILED_PRECONDITION",
            Code::Aborted => "ABORTED",
            Code::OutOfRange => "OUT_OF_RANGE",
            Code::Unimplemented => "UNIMPLEMENTED",
            Code::Internal => "INTERNAL",
            Code::Unavailable => "UNAVAILABLE",
            Code::DataLoss => "DATA_LOSS",
            Code::Unauthenticated => "UNAUTHENTICATED",
        }
    }
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ----------------------------------------------------------------------------
// Status
// ----------------------------------------------------------------------------

/// Terminal result of a call: a code plus an optional description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    code: Code,
    description: Option<String>,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{}: {}", self.code, description),
            None => write!(f, "{}", self.code),
        }
    }
}

impl std::error::Error for Status {}

impl Status {
    pub fn new(code: Code) -> Self {
        Self {
            code,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn code(&self) -> Code {
        self.code
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }

    pub fn ok() -> Self {
        Self::new(Code::Ok)
    }

    pub fn cancelled(description: impl Into<String>) -> Self {
        Self::new(Code::Cancelled).with_description(description)
    }

    pub fn unknown(description: impl Into<String>) -> Self {
        Self::new(Code::Unknown).with_description(description)
    }

    pub fn invalid_argument(description: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument).with_description(description)
    }

    pub fn not_found(description: impl Into<String>) -> Self {
        Self::new(Code::NotFound).with_description(description)
    }

    pub fn failed_precondition(description: impl Into<String>) -> Self {
        Self::new(Code::FailedPrecondition).with_description(description)
    }

    pub fn resource_exhausted(description: impl Into<String>) -> Self {
        Self::new(Code::ResourceExhausted).with_description(description)
    }

    pub fn unimplemented(description: impl Into<String>) -> Self {
        Self::new(Code::Unimplemented).with_description(description)
    }

    pub fn internal(description: impl Into<String>) -> Self {
        Self::new(Code::Internal).with_description(description)
    }

    pub fn unavailable(description: impl Into<String>) -> Self {
        Self::new(Code::Unavailable).with_description(description)
    }
}

// ----------------------------------------------------------------------------
// Exit Classification
// ----------------------------------------------------------------------------

/// How the unit of work serving a call ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    /// Ran to completion without error
    Completed,
    /// Failed with an explicit status
    Failed(Status),
    /// Failed without a status (a panic inside the handler). The message is
    /// kept for logging only and never reaches the wire.
    Defect(String),
    /// Stopped before it could finish
    Interrupted,
}

impl Exit {
    /// Map this outcome to the status sent to the transport.
    ///
    /// Pure and total: interruption is `CANCELLED`, an explicit failure keeps
    /// its status, a defect is a bare `INTERNAL`, and completion is `OK`.
    pub fn to_status(&self) -> Status {
        match self {
            Exit::Interrupted => Status::new(Code::Cancelled),
            Exit::Failed(status) => status.clone(),
            Exit::Defect(_) => Status::new(Code::Internal),
            Exit::Completed => Status::ok(),
        }
    }

    /// Result reported by a run unit for this outcome
    pub fn into_result(self) -> Result<(), Status> {
        match self {
            Exit::Completed | Exit::Interrupted => Ok(()),
            other => Err(other.to_status()),
        }
    }

    pub fn from_result(result: Result<(), Status>) -> Self {
        match result {
            Ok(()) => Exit::Completed,
            Err(status) => Exit::Failed(status),
        }
    }
}
