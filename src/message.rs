//! Request, response and wire message definitions
//!
//! The request/response structs are the inputs and outputs of the four core
//! operations. `ClientMessage`/`ServerMessage` wrap them into a JSON protocol
//! for the WebSocket adapter using Serde's tagged enum.

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, ErrorCode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Client → Server message
///
/// One variant per core operation. Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Register an identity
    Join(JoinRequest),
    /// Broadcast a message to everyone else
    Send(SendMessageRequest),
    /// Unregister an identity
    Leave(LeaveRequest),
    /// Long-poll for the next message
    Receive(MessageRequest),
}

/// Server → Client message
///
/// Uses tagged enum with snake_case naming.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection accepted
    Connected { connection_id: String },
    /// Join succeeded
    Joined(JoinResponse),
    /// Broadcast accepted
    Sent(SendMessageResponse),
    /// Leave succeeded
    Left(LeaveResponse),
    /// A message from another client
    Message(MessageResponse),
    /// Operation failed
    Error { code: ErrorCode, message: String },
}

/// Convert ChatError to ServerMessage for client notification
impl From<ChatError> for ServerMessage {
    fn from(err: ChatError) -> Self {
        ServerMessage::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}
