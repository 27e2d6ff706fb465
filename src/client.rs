//! Client struct definition
//!
//! Represents a registered client: its mailbox halves, rate limiter and
//! activity timestamps.

use tokio::time::{Duration, Instant};

use crate::config::ChatConfig;
use crate::mailbox::{self, Delivery, Inbox, Mailbox};
use crate::rate_limit::TokenBucket;
use crate::types::ClientId;

/// Registered client state
///
/// Owned by the registry. The mailbox producer lives here and nowhere else,
/// so dropping the client closes its mailbox.
#[derive(Debug)]
pub struct Client {
    /// Identity this client joined with
    pub id: ClientId,
    /// Producer half of the mailbox
    mailbox: Mailbox,
    /// Consumer half handed out to receivers
    inbox: Inbox,
    /// Outbound message limiter
    rate_limiter: TokenBucket,
    /// Last receive poll (or join)
    pub last_seen: Instant,
    /// Join time
    pub joined_at: Instant,
}

impl Client {
    /// Create a client with an empty mailbox and a full token bucket
    pub fn new(id: ClientId, config: &ChatConfig, now: Instant) -> Self {
        let (mailbox, inbox) = mailbox::mailbox(config.mailbox_capacity);
        Self {
            id,
            mailbox,
            inbox,
            rate_limiter: TokenBucket::new(config.rate_limit_per_sec, config.rate_limit_burst, now),
            last_seen: now,
            joined_at: now,
        }
    }

    /// Record receive activity and hand out the consumer half
    pub fn poll(&mut self, now: Instant) -> Inbox {
        self.last_seen = now;
        self.inbox.clone()
    }

    /// Non-blocking delivery of one message
    pub fn deliver(&self, msg: String) -> Delivery {
        self.mailbox.offer(msg)
    }

    /// Check-and-consume one send token
    pub fn try_send_token(&mut self, now: Instant) -> bool {
        self.rate_limiter.try_acquire(now)
    }

    /// Whether the client has been silent for longer than `idle_timeout`
    pub fn is_idle(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > idle_timeout
    }

    /// Close the mailbox, consuming the client
    pub fn close(self) {
        self.mailbox.close();
    }
}
