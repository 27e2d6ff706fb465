//! Error types for the chat service
//!
//! Defines the core operation errors (`ChatError`) with their stable wire
//! codes, configuration errors, and transport-level errors for the
//! WebSocket adapter. Uses thiserror for ergonomic error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core operation errors
///
/// Every failure is scoped to a single operation and leaves the registry
/// untouched. `Display` yields the human-readable detail; the stable short
/// code is available through [`ChatError::code`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Empty client identifier
    #[error("user ID is required")]
    MissingIdentifier,

    /// Empty sender or message body
    #[error("from and message are required")]
    MissingField,

    /// Identifier already registered
    #[error("user already joined")]
    AlreadyJoined,

    /// Sender of a broadcast is not registered
    #[error("sender not connected")]
    SenderNotFound,

    /// Client is not registered
    #[error("user not connected")]
    NotFound,

    /// Message body exceeds the configured length cap
    #[error("message must be at most {limit} characters")]
    MessageTooLong { limit: usize },

    /// Sender has no rate-limit token left
    #[error("too many messages")]
    RateLimited,

    /// No other client was registered to receive the broadcast
    #[error("no clients received the message")]
    NoReceivers,

    /// Mailbox was closed while (or before) waiting on it
    #[error("user stream closed")]
    Disconnected,

    /// Receive wait elapsed without a message
    #[error("no messages received")]
    NoMessages,

    /// The registry task is no longer running
    #[error("chat service is not running")]
    Unavailable,
}

impl ChatError {
    /// Stable code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            ChatError::MissingIdentifier => ErrorCode::MissingUserId,
            ChatError::MissingField => ErrorCode::MissingField,
            ChatError::AlreadyJoined => ErrorCode::AlreadyJoined,
            ChatError::SenderNotFound => ErrorCode::SenderNotFound,
            ChatError::NotFound => ErrorCode::UserNotFound,
            ChatError::MessageTooLong { .. } => ErrorCode::MessageTooLong,
            ChatError::RateLimited => ErrorCode::RateLimit,
            ChatError::NoReceivers => ErrorCode::NoReceivers,
            ChatError::Disconnected => ErrorCode::UserDisconnected,
            ChatError::NoMessages => ErrorCode::NoMessages,
            ChatError::Unavailable => ErrorCode::ServiceUnavailable,
        }
    }
}

/// Stable error codes surfaced to transport adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "ERR_MISSING_USER_ID")]
    MissingUserId,
    #[serde(rename = "ERR_MISSING_FIELD")]
    MissingField,
    #[serde(rename = "ERR_ALREADY_JOINED")]
    AlreadyJoined,
    #[serde(rename = "ERR_SENDER_NOT_FOUND")]
    SenderNotFound,
    #[serde(rename = "ERR_USER_NOT_FOUND")]
    UserNotFound,
    #[serde(rename = "ERR_MESSAGE_TOO_LONG")]
    MessageTooLong,
    #[serde(rename = "ERR_RATE_LIMIT")]
    RateLimit,
    #[serde(rename = "ERR_NO_RECEIVERS")]
    NoReceivers,
    #[serde(rename = "ERR_USER_DISCONNECTED")]
    UserDisconnected,
    #[serde(rename = "ERR_NO_MESSAGES")]
    NoMessages,
    #[serde(rename = "ERR_SERVICE_UNAVAILABLE")]
    ServiceUnavailable,
    /// Malformed request frame (adapter only)
    #[serde(rename = "ERR_INVALID_REQUEST")]
    InvalidRequest,
    /// Too many requests in flight on one connection (adapter only)
    #[serde(rename = "ERR_TOO_MANY_REQUESTS")]
    TooManyRequests,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingUserId => "ERR_MISSING_USER_ID",
            ErrorCode::MissingField => "ERR_MISSING_FIELD",
            ErrorCode::AlreadyJoined => "ERR_ALREADY_JOINED",
            ErrorCode::SenderNotFound => "ERR_SENDER_NOT_FOUND",
            ErrorCode::UserNotFound => "ERR_USER_NOT_FOUND",
            ErrorCode::MessageTooLong => "ERR_MESSAGE_TOO_LONG",
            ErrorCode::RateLimit => "ERR_RATE_LIMIT",
            ErrorCode::NoReceivers => "ERR_NO_RECEIVERS",
            ErrorCode::UserDisconnected => "ERR_USER_DISCONNECTED",
            ErrorCode::NoMessages => "ERR_NO_MESSAGES",
            ErrorCode::ServiceUnavailable => "ERR_SERVICE_UNAVAILABLE",
            ErrorCode::InvalidRequest => "ERR_INVALID_REQUEST",
            ErrorCode::TooManyRequests => "ERR_TOO_MANY_REQUESTS",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Invalid configuration values
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Environment variable present but not parsable
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    /// Value parsed but outside the accepted range
    #[error("{key} {reason}")]
    OutOfRange {
        key: &'static str,
        reason: &'static str,
    },
}

/// Transport-level errors in the WebSocket adapter
///
/// These terminate a single connection; they never reach the registry.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(ChatError::MissingIdentifier.code().as_str(), "ERR_MISSING_USER_ID");
        assert_eq!(ChatError::SenderNotFound.code().as_str(), "ERR_SENDER_NOT_FOUND");
        assert_eq!(ChatError::NotFound.code().as_str(), "ERR_USER_NOT_FOUND");
        assert_eq!(ChatError::RateLimited.code().as_str(), "ERR_RATE_LIMIT");
        assert_eq!(ChatError::Disconnected.code().as_str(), "ERR_USER_DISCONNECTED");
    }

    #[test]
    fn test_code_serializes_as_string() {
        let json = serde_json::to_string(&ErrorCode::NoReceivers).unwrap();
        assert_eq!(json, "\"ERR_NO_RECEIVERS\"");
        let code: ErrorCode = serde_json::from_str("\"ERR_NO_MESSAGES\"").unwrap();
        assert_eq!(code, ErrorCode::NoMessages);
    }

    #[test]
    fn test_detail_excludes_code() {
        let err = ChatError::MessageTooLong { limit: 500 };
        assert_eq!(err.to_string(), "message must be at most 500 characters");
        assert_eq!(err.code(), ErrorCode::MessageTooLong);
    }
}
