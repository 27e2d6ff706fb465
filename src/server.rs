//! ChatServer Actor implementation
//!
//! The registry of connected clients. All membership changes, sender lookups
//! and receive lookups go through this single task, so the client map needs
//! no lock. The idle sweep runs as another arm of the same loop and evicts
//! through the same removal path as an explicit leave.
//!
//! Work done inside the actor is kept short: messages arrive pre-formatted,
//! delivery is a non-blocking `try_send` per recipient, and receivers wait on
//! their inbox outside the actor.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::mailbox::{Delivery, Inbox};
use crate::types::ClientId;

/// Commands sent from [`ChatService`](crate::ChatService) handles to the actor
///
/// Each command carries a oneshot channel for its reply.
#[derive(Debug)]
pub enum ServerCommand {
    /// Register a new client
    Join {
        id: ClientId,
        respond_to: oneshot::Sender<Result<(), ChatError>>,
    },
    /// Remove a client and close its mailbox
    Leave {
        id: ClientId,
        respond_to: oneshot::Sender<Result<(), ChatError>>,
    },
    /// Fan a formatted line out to every client except `from`
    ///
    /// Replies with the number of recipients the line was offered to.
    Broadcast {
        from: ClientId,
        line: String,
        respond_to: oneshot::Sender<Result<usize, ChatError>>,
    },
    /// Mark a client active and hand out its inbox
    Poll {
        id: ClientId,
        respond_to: oneshot::Sender<Result<Inbox, ChatError>>,
    },
    /// Number of registered clients
    ClientCount { respond_to: oneshot::Sender<usize> },
    /// Evict every client and stop the actor
    Shutdown { respond_to: oneshot::Sender<()> },
}

/// Why a client left the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Left,
    Idle,
    Shutdown,
}

impl std::fmt::Display for Removal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Removal::Left => "left",
            Removal::Idle => "idle",
            Removal::Shutdown => "shutdown",
        };
        f.write_str(reason)
    }
}

/// The registry actor
pub struct ChatServer {
    /// All registered clients: ClientId -> Client
    clients: HashMap<ClientId, Client>,
    config: ChatConfig,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl ChatServer {
    /// Create a new ChatServer with the given command receiver
    pub fn new(config: ChatConfig, receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            clients: HashMap::new(),
            config,
            receiver,
        }
    }

    /// Run the ChatServer event loop
    ///
    /// Processes commands and idle sweeps until a shutdown command arrives or
    /// every handle is dropped. All remaining clients are evicted on exit.
    pub async fn run(mut self) {
        info!(
            reap_interval = ?self.config.reap_interval,
            idle_timeout = ?self.config.idle_timeout,
            "ChatServer started"
        );

        let period = self.config.reap_interval;
        let now = Instant::now();
        let first_sweep = now.checked_add(period).unwrap_or(now);
        let mut reaper = time::interval_at(first_sweep, period);
        reaper.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut shutdown_ack = None;
        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(ServerCommand::Shutdown { respond_to }) => {
                        shutdown_ack = Some(respond_to);
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                _ = reaper.tick() => {
                    self.reap_idle(Instant::now());
                }
            }
        }

        self.evict_all();
        if let Some(ack) = shutdown_ack {
            let _ = ack.send(());
        }
        info!("ChatServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Join { id, respond_to } => {
                let _ = respond_to.send(self.handle_join(id));
            }
            ServerCommand::Leave { id, respond_to } => {
                let _ = respond_to.send(self.handle_leave(&id));
            }
            ServerCommand::Broadcast {
                from,
                line,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_broadcast(&from, line));
            }
            ServerCommand::Poll { id, respond_to } => {
                let _ = respond_to.send(self.handle_poll(&id));
            }
            ServerCommand::ClientCount { respond_to } => {
                let _ = respond_to.send(self.clients.len());
            }
            // intercepted by the run loop
            ServerCommand::Shutdown { respond_to } => {
                let _ = respond_to.send(());
            }
        }
    }

    fn handle_join(&mut self, id: ClientId) -> Result<(), ChatError> {
        if self.clients.contains_key(&id) {
            debug!("Join rejected, {} already registered", id);
            return Err(ChatError::AlreadyJoined);
        }

        let client = Client::new(id.clone(), &self.config, Instant::now());
        self.clients.insert(id.clone(), client);
        info!("Client {} joined", id);
        debug!("Total clients: {}", self.clients.len());
        Ok(())
    }

    fn handle_leave(&mut self, id: &ClientId) -> Result<(), ChatError> {
        if self.remove_client(id, Removal::Left) {
            Ok(())
        } else {
            Err(ChatError::NotFound)
        }
    }

    fn handle_broadcast(&mut self, from: &ClientId, line: String) -> Result<usize, ChatError> {
        let sender = self
            .clients
            .get_mut(from)
            .ok_or(ChatError::SenderNotFound)?;

        // the token stays consumed even if nobody else is registered
        if !sender.try_send_token(Instant::now()) {
            debug!("Client {} rate limited", from);
            return Err(ChatError::RateLimited);
        }

        let mut receivers = 0;
        let mut dropped = 0;
        for (id, client) in &self.clients {
            if id == from {
                continue;
            }
            receivers += 1;
            match client.deliver(line.clone()) {
                Delivery::Queued => {}
                Delivery::Dropped => {
                    dropped += 1;
                    debug!("Mailbox of {} full, dropping message from {}", id, from);
                }
                Delivery::Closed => {
                    dropped += 1;
                    warn!("Mailbox of {} closed while registered, dropping message from {}", id, from);
                }
            }
        }

        if receivers == 0 {
            return Err(ChatError::NoReceivers);
        }

        debug!(
            from = %from,
            receivers,
            dropped,
            "Message broadcast"
        );
        Ok(receivers)
    }

    fn handle_poll(&mut self, id: &ClientId) -> Result<Inbox, ChatError> {
        let client = self.clients.get_mut(id).ok_or(ChatError::NotFound)?;
        Ok(client.poll(Instant::now()))
    }

    /// Evict every client idle for longer than the configured threshold
    ///
    /// Returns the number of evicted clients.
    fn reap_idle(&mut self, now: Instant) -> usize {
        let idle_timeout = self.config.idle_timeout;
        let idle: Vec<ClientId> = self
            .clients
            .values()
            .filter(|client| client.is_idle(now, idle_timeout))
            .map(|client| client.id.clone())
            .collect();

        for id in &idle {
            self.remove_client(id, Removal::Idle);
        }

        if !idle.is_empty() {
            info!(
                evicted = idle.len(),
                remaining = self.clients.len(),
                "Idle sweep finished"
            );
        }
        idle.len()
    }

    fn evict_all(&mut self) {
        let ids: Vec<ClientId> = self.clients.keys().cloned().collect();
        for id in &ids {
            self.remove_client(id, Removal::Shutdown);
        }
    }

    /// Helper: remove a client and close its mailbox
    ///
    /// Shared by leave, idle eviction and shutdown. Returns false if the
    /// client was not registered.
    fn remove_client(&mut self, id: &ClientId, reason: Removal) -> bool {
        let Some(client) = self.clients.remove(id) else {
            return false;
        };

        let lifetime = client.joined_at.elapsed();
        client.close();
        info!(
            client = %id,
            reason = %reason,
            lifetime = ?lifetime,
            "Client removed"
        );
        debug!("Total clients: {}", self.clients.len());
        true
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn server() -> ChatServer {
        let (_tx, rx) = mpsc::channel(1);
        ChatServer::new(ChatConfig::default(), rx)
    }

    fn id(s: &str) -> ClientId {
        ClientId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_join_and_leave() {
        let mut server = server();

        assert!(server.handle_join(id("a")).is_ok());
        assert_eq!(server.handle_join(id("a")), Err(ChatError::AlreadyJoined));
        assert_eq!(server.clients.len(), 1);

        assert!(server.handle_leave(&id("a")).is_ok());
        assert_eq!(server.handle_leave(&id("a")), Err(ChatError::NotFound));
        assert!(server.clients.is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let mut server = server();
        server.handle_join(id("a")).unwrap();
        server.handle_join(id("b")).unwrap();
        server.handle_join(id("c")).unwrap();

        let receivers = server.handle_broadcast(&id("a"), "a: hi".into()).unwrap();
        assert_eq!(receivers, 2);

        let wait = Duration::from_millis(10);
        let b = server.handle_poll(&id("b")).unwrap();
        let a = server.handle_poll(&id("a")).unwrap();
        assert_eq!(b.recv_timeout(wait).await.unwrap(), "a: hi");
        assert_eq!(a.recv_timeout(wait).await, Err(ChatError::NoMessages));
    }

    #[tokio::test]
    async fn test_full_recipient_still_counts_as_receiver() {
        let (_tx, rx) = mpsc::channel(1);
        let config = ChatConfig {
            mailbox_capacity: 1,
            ..ChatConfig::default()
        };
        let mut server = ChatServer::new(config, rx);
        server.handle_join(id("a")).unwrap();
        server.handle_join(id("b")).unwrap();
        server.handle_join(id("c")).unwrap();

        assert_eq!(server.handle_broadcast(&id("a"), "a: one".into()), Ok(2));
        let c = server.handle_poll(&id("c")).unwrap();
        let wait = Duration::from_millis(10);
        assert_eq!(c.recv_timeout(wait).await.unwrap(), "a: one");

        // b is full, c has room again
        assert_eq!(server.handle_broadcast(&id("a"), "a: two".into()), Ok(2));
        assert_eq!(c.recv_timeout(wait).await.unwrap(), "a: two");

        let b = server.handle_poll(&id("b")).unwrap();
        assert_eq!(b.recv_timeout(wait).await.unwrap(), "a: one");
        assert_eq!(b.recv_timeout(wait).await, Err(ChatError::NoMessages));
    }

    #[tokio::test]
    async fn test_broadcast_unknown_sender() {
        let mut server = server();
        server.handle_join(id("b")).unwrap();
        assert_eq!(
            server.handle_broadcast(&id("a"), "a: hi".into()),
            Err(ChatError::SenderNotFound)
        );
    }

    #[tokio::test]
    async fn test_poll_unknown_client() {
        let mut server = server();
        assert!(matches!(server.handle_poll(&id("ghost")), Err(ChatError::NotFound)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_only_idle_clients() {
        let mut server = server();
        server.handle_join(id("quiet")).unwrap();
        server.handle_join(id("busy")).unwrap();

        time::advance(Duration::from_secs(200)).await;
        server.handle_poll(&id("busy")).unwrap();
        time::advance(Duration::from_secs(200)).await;

        assert_eq!(server.reap_idle(Instant::now()), 1);
        assert!(server.clients.contains_key("busy"));
        assert!(!server.clients.contains_key("quiet"));
    }

    #[tokio::test]
    async fn test_evict_all_closes_mailboxes() {
        let mut server = server();
        server.handle_join(id("a")).unwrap();
        let inbox = server.handle_poll(&id("a")).unwrap();

        server.evict_all();
        assert!(server.clients.is_empty());
        assert_eq!(
            inbox.recv_timeout(Duration::from_millis(10)).await,
            Err(ChatError::Disconnected)
        );
    }
}
