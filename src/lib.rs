//! In-memory chat fan-out service
//!
//! Clients join under a caller-chosen identity, broadcast short text
//! messages to every other client, and long-poll for messages addressed to
//! them. Idle clients are evicted automatically.
//!
//! # Features
//! - Join / leave with unique identities
//! - Best-effort broadcast into bounded per-client mailboxes (full mailboxes drop)
//! - Per-client token-bucket rate limiting
//! - Bounded, cancellable receive wait
//! - Periodic idle eviction
//! - WebSocket JSON adapter
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatServer` (internal) is the registry actor owning every client; the
//!   idle sweep runs inside the same loop
//! - `ChatService` is the cloneable handle callers use; receive waits happen
//!   in the caller's task, outside the actor
//! - `handler` translates WebSocket frames into `ChatService` calls
//!
//! # Example
//! ```ignore
//! use chat_fanout::{ChatConfig, ChatService, JoinRequest, SendMessageRequest, MessageRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let chat = ChatService::spawn(ChatConfig::default()).unwrap();
//!     chat.join(JoinRequest { id: "alice".into() }).await.unwrap();
//!     chat.join(JoinRequest { id: "bob".into() }).await.unwrap();
//!
//!     chat.send_message(SendMessageRequest {
//!         from: "alice".into(),
//!         message: "hi".into(),
//!     }).await.unwrap();
//!
//!     let got = chat.get_message(MessageRequest { id: "bob".into() }).await.unwrap();
//!     assert_eq!(got.message, "alice: hi");
//! }
//! ```
//!
//! The registry actor is only reachable through `ChatService::spawn`, which
//! validates the configuration first:
//!
//! ```compile_fail
//! use chat_fanout::ChatServer;
//! ```
//!
//! ```compile_fail
//! use chat_fanout::server::ServerCommand;
//! ```

mod client;
pub mod config;
pub mod error;
pub mod handler;
mod mailbox;
pub mod message;
mod rate_limit;
mod server;
pub mod service;
pub mod types;

// Re-export main types for convenience
pub use config::ChatConfig;
pub use error::{AppError, ChatError, ConfigError, ErrorCode};
pub use handler::{handle_connection, serve_until};
pub use message::{
    ClientMessage, JoinRequest, JoinResponse, LeaveRequest, LeaveResponse, MessageRequest,
    MessageResponse, SendMessageRequest, SendMessageResponse, ServerMessage,
};
pub use service::ChatService;
pub use types::{ClientId, ConnectionId};
