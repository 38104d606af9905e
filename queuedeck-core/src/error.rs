//! Queue service error types

use thiserror::Error;

/// Error codes reported by the queue service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Common
    AuthenticationFailed,
    AuthorizationFailure,
    InvalidResourceName,
    OutOfRangeQueryParameterValue,
    InternalError,
    ServerBusy,

    // Queue specific
    QueueNotFound,
    QueueAlreadyExists,
    QueueBeingDeleted,

    // Message specific
    MessageNotFound,
    MessageTooLarge,
    PopReceiptMismatch,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "AuthenticationFailed",
            Self::AuthorizationFailure => "AuthorizationFailure",
            Self::InvalidResourceName => "InvalidResourceName",
            Self::OutOfRangeQueryParameterValue => "OutOfRangeQueryParameterValue",
            Self::InternalError => "InternalError",
            Self::ServerBusy => "ServerBusy",
            Self::QueueNotFound => "QueueNotFound",
            Self::QueueAlreadyExists => "QueueAlreadyExists",
            Self::QueueBeingDeleted => "QueueBeingDeleted",
            Self::MessageNotFound => "MessageNotFound",
            Self::MessageTooLarge => "MessageTooLarge",
            Self::PopReceiptMismatch => "PopReceiptMismatch",
        }
    }

    /// Look up a code from the string the service sends back
    pub fn parse(code: &str) -> Option<Self> {
        let code = match code {
            "AuthenticationFailed" => Self::AuthenticationFailed,
            "AuthorizationFailure" => Self::AuthorizationFailure,
            "InvalidResourceName" => Self::InvalidResourceName,
            "OutOfRangeQueryParameterValue" => Self::OutOfRangeQueryParameterValue,
            "InternalError" => Self::InternalError,
            "ServerBusy" => Self::ServerBusy,
            "QueueNotFound" => Self::QueueNotFound,
            "QueueAlreadyExists" => Self::QueueAlreadyExists,
            "QueueBeingDeleted" => Self::QueueBeingDeleted,
            "MessageNotFound" => Self::MessageNotFound,
            "MessageTooLarge" => Self::MessageTooLarge,
            "PopReceiptMismatch" => Self::PopReceiptMismatch,
            _ => return None,
        };
        Some(code)
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::AuthenticationFailed | Self::AuthorizationFailure => 403,
            Self::InvalidResourceName
            | Self::OutOfRangeQueryParameterValue
            | Self::MessageTooLarge
            | Self::PopReceiptMismatch => 400,
            Self::QueueNotFound | Self::MessageNotFound => 404,
            Self::QueueAlreadyExists | Self::QueueBeingDeleted => 409,
            Self::InternalError => 500,
            Self::ServerBusy => 503,
        }
    }
}

/// Errors from queue backends
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue does not exist: {0}")]
    QueueNotFound(String),

    #[error("Invalid queue name: {0}")]
    InvalidQueueName(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Pop receipt does not match message: {0}")]
    PopReceiptMismatch(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Service error {status} ({code}): {message}")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl QueueError {
    /// Build an error from a service error code, falling back to a generic
    /// service error for codes that have no dedicated variant.
    pub fn from_service(status: u16, code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match ErrorCode::parse(code) {
            Some(ErrorCode::QueueNotFound) => Self::QueueNotFound(message),
            Some(ErrorCode::InvalidResourceName) => Self::InvalidQueueName(message),
            Some(ErrorCode::MessageNotFound) => Self::MessageNotFound(message),
            Some(ErrorCode::PopReceiptMismatch) => Self::PopReceiptMismatch(message),
            Some(ErrorCode::AuthenticationFailed | ErrorCode::AuthorizationFailure) => {
                Self::Authentication(message)
            }
            _ => Self::Service {
                status,
                code: code.to_string(),
                message,
            },
        }
    }

    /// The service error code this error corresponds to, if any
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::QueueNotFound(_) => Some(ErrorCode::QueueNotFound),
            Self::InvalidQueueName(_) => Some(ErrorCode::InvalidResourceName),
            Self::MessageNotFound(_) => Some(ErrorCode::MessageNotFound),
            Self::PopReceiptMismatch(_) => Some(ErrorCode::PopReceiptMismatch),
            Self::Authentication(_) => Some(ErrorCode::AuthenticationFailed),
            Self::Service { code, .. } => ErrorCode::parse(code),
            Self::Connection(_) | Self::InvalidResponse(_) => None,
        }
    }
}
