//! Basic type definitions for the chat service
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: caller-supplied, non-empty client identifier
//! - `ConnectionId`: UUID-based identifier for a transport connection

use std::borrow::Borrow;

use uuid::Uuid;

use crate::error::ChatError;

/// Client identifier (newtype pattern)
///
/// Wraps the caller-supplied identity. Construction through [`ClientId::parse`]
/// guarantees the value is non-empty, so the registry never stores an
/// anonymous entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Validate and wrap a client identifier
    pub fn parse(id: impl Into<String>) -> Result<Self, ChatError> {
        let id = id.into();
        if id.is_empty() {
            return Err(ChatError::MissingIdentifier);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ClientId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport connection identifier
///
/// Wraps a UUID v4; only used to correlate log lines for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_rejects_empty() {
        assert_eq!(ClientId::parse(""), Err(ChatError::MissingIdentifier));
    }

    #[test]
    fn test_client_id_keeps_value() {
        let id = ClientId::parse("alice").unwrap();
        assert_eq!(id.as_str(), "alice");
        assert_eq!(id.to_string(), "alice");
    }

    #[test]
    fn test_connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }
}
