//! Error types for the domain layer.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' exceeds maximum length of {max}")]
    TooLong { field: String, max: usize },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField {
            field: field.into(),
        }
    }

    /// Creates a too-long validation error.
    pub fn too_long(field: impl Into<String>, max: usize) -> Self {
        ValidationError::TooLong {
            field: field.into(),
            max,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error codes for the voting subsystem.
///
/// Each code has a stable wire name and a numeric code in the 4000-4999
/// range reserved for this subsystem; the numeric form doubles as the
/// WebSocket close code where a close frame is warranted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Token missing, malformed, or expired.
    Unauthorized,
    /// The target room does not exist or the caller is not a member.
    RoomNotFound,
    /// Vote payload malformed or reveal attempted with zero votes.
    InvalidVote,
    /// Round-lifecycle violation (wrong status, stale round id, lost race).
    InvalidState,
    /// Caller's role does not permit the operation.
    ForbiddenRole,
    /// Inbound envelope type not in the dispatch table.
    UnknownMessageType,
    /// Payload failed shape validation.
    InvalidPayload,
    /// Storage or event bus unavailable after retries.
    ServiceUnavailable,
    /// Anything unexpected; detail stays in the logs.
    Internal,
}

impl ErrorCode {
    /// Stable wire identifier used in `error.v1` payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::RoomNotFound => "room_not_found",
            ErrorCode::InvalidVote => "invalid_vote",
            ErrorCode::InvalidState => "invalid_state",
            ErrorCode::ForbiddenRole => "forbidden_role",
            ErrorCode::UnknownMessageType => "unknown_message_type",
            ErrorCode::InvalidPayload => "invalid_payload",
            ErrorCode::ServiceUnavailable => "service_unavailable",
            ErrorCode::Internal => "internal_error",
        }
    }

    /// Numeric code in the subsystem's reserved 4000-4999 namespace.
    pub fn wire_code(&self) -> u16 {
        match self {
            ErrorCode::Unauthorized => 4000,
            ErrorCode::RoomNotFound => 4001,
            ErrorCode::InvalidVote => 4002,
            ErrorCode::InvalidState => 4003,
            ErrorCode::ForbiddenRole => 4004,
            ErrorCode::UnknownMessageType => 4005,
            ErrorCode::InvalidPayload => 4006,
            ErrorCode::ServiceUnavailable => 4007,
            ErrorCode::Internal => 4008,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Standard domain error with code, message, and optional details.
#[derive(Debug, Clone)]
pub struct DomainError {
    pub code: ErrorCode,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Creates a round-lifecycle violation error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, message)
    }

    /// Creates a role-authorization error.
    pub fn forbidden_role(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ForbiddenRole, message)
    }

    /// Creates a payload validation error for a specific field.
    pub fn invalid_payload(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPayload, message).with_detail("field", field.into())
    }

    /// Creates a storage/bus availability error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Adds a detail to the error.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for DomainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl Error for DomainError {}

impl From<ValidationError> for DomainError {
    fn from(err: ValidationError) -> Self {
        DomainError::new(ErrorCode::InvalidPayload, err.to_string())
    }
}
