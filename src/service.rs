//! Client-facing handle to the chat registry
//!
//! `ChatService` is a cheap-to-clone handle that validates requests, talks to
//! the `ChatServer` actor over its command channel, and performs the
//! receive wait in the caller's own task.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::config::ChatConfig;
use crate::error::{ChatError, ConfigError};
use crate::message::{
    JoinRequest, JoinResponse, LeaveRequest, LeaveResponse, MessageRequest, MessageResponse,
    SendMessageRequest, SendMessageResponse,
};
use crate::server::{ChatServer, ServerCommand};
use crate::types::ClientId;

/// Handle to a running chat registry
///
/// Every clone talks to the same registry. The registry stops when
/// [`ChatService::shutdown`] is called or the last handle is dropped.
#[derive(Clone)]
pub struct ChatService {
    sender: mpsc::Sender<ServerCommand>,
    config: Arc<ChatConfig>,
}

impl ChatService {
    /// Validate the configuration and start the registry actor
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(config: ChatConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let (sender, receiver) = mpsc::channel(config.command_buffer);
        tokio::spawn(ChatServer::new(config.clone(), receiver).run());

        Ok(Self {
            sender,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Register a new client
    ///
    /// # Errors
    /// - `MissingIdentifier` if `id` is empty
    /// - `AlreadyJoined` if `id` is already registered
    pub async fn join(&self, req: JoinRequest) -> Result<JoinResponse, ChatError> {
        let id = ClientId::parse(req.id)?;
        self.request(|respond_to| ServerCommand::Join { id, respond_to })
            .await??;

        Ok(JoinResponse {
            success: true,
            message: "User joined successfully".to_string(),
        })
    }

    /// Broadcast a message to every other registered client
    ///
    /// Delivery is best-effort: recipients with a full mailbox silently miss
    /// the message.
    ///
    /// # Errors
    /// - `MissingField` if `from` or `message` is empty
    /// - `MessageTooLong` if `message` exceeds the configured length
    /// - `SenderNotFound` if `from` is not registered
    /// - `RateLimited` if the sender is out of tokens
    /// - `NoReceivers` if nobody else is registered
    pub async fn send_message(
        &self,
        req: SendMessageRequest,
    ) -> Result<SendMessageResponse, ChatError> {
        if req.from.is_empty() || req.message.is_empty() {
            return Err(ChatError::MissingField);
        }

        let limit = self.config.max_message_len;
        if req.message.chars().count() > limit {
            return Err(ChatError::MessageTooLong { limit });
        }

        let line = format!("{}: {}", req.from, req.message);
        let from = ClientId::parse(req.from)?;
        let receivers = self
            .request(|respond_to| ServerCommand::Broadcast {
                from,
                line,
                respond_to,
            })
            .await??;
        debug!("Message offered to {} clients", receivers);

        Ok(SendMessageResponse {
            success: true,
            message: "Message broadcasted to clients".to_string(),
        })
    }

    /// Unregister a client and close its mailbox
    ///
    /// # Errors
    /// - `MissingIdentifier` if `id` is empty
    /// - `NotFound` if `id` is not registered
    pub async fn leave(&self, req: LeaveRequest) -> Result<LeaveResponse, ChatError> {
        let id = ClientId::parse(req.id)?;
        self.request(|respond_to| ServerCommand::Leave { id, respond_to })
            .await??;

        Ok(LeaveResponse {
            success: true,
            message: "User disconnected successfully".to_string(),
        })
    }

    /// Wait for the next message addressed to `id`
    ///
    /// Counts as activity for idle eviction. Waits at most the configured
    /// receive timeout; dropping the future cancels the wait.
    ///
    /// # Errors
    /// - `MissingIdentifier` if `id` is empty
    /// - `NotFound` if `id` is not registered
    /// - `Disconnected` if the client is removed while waiting
    /// - `NoMessages` if the timeout elapses first
    pub async fn get_message(&self, req: MessageRequest) -> Result<MessageResponse, ChatError> {
        let id = ClientId::parse(req.id)?;
        let inbox = self
            .request(|respond_to| ServerCommand::Poll { id, respond_to })
            .await??;

        let message = inbox.recv_timeout(self.config.receive_timeout).await?;
        Ok(MessageResponse { message })
    }

    /// Number of currently registered clients
    pub async fn connected_clients(&self) -> Result<usize, ChatError> {
        self.request(|respond_to| ServerCommand::ClientCount { respond_to })
            .await
    }

    /// Evict every client and stop the registry
    ///
    /// Blocked receivers observe `Disconnected`; later calls on any handle
    /// fail with `Unavailable`. Calling this twice is harmless.
    pub async fn shutdown(&self) {
        let _ = self
            .request(|respond_to| ServerCommand::Shutdown { respond_to })
            .await;
    }

    /// Send a command and wait for the actor's reply
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ServerCommand,
    ) -> Result<T, ChatError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .await
            .map_err(|_| ChatError::Unavailable)?;
        rx.await.map_err(|_| ChatError::Unavailable)
    }
}
