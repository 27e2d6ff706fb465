//! Bounded per-client mailbox
//!
//! A mailbox is split into two halves:
//! - [`Mailbox`]: the producer side, owned by the registry. Delivery is a
//!   non-blocking `try_send`; a full mailbox drops the message.
//! - [`Inbox`]: the consumer side, shared with receivers. Waiting is bounded
//!   by a timeout and ends early when the mailbox is closed.
//!
//! Closing is done by dropping the `Mailbox`. After that the inbox drains any
//! leftover messages and then reports `Disconnected`, which is distinct from
//! the `NoMessages` of an empty but live mailbox.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::{timeout_at, Instant};

use crate::error::ChatError;

/// Outcome of a single delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Message enqueued
    Queued,
    /// Mailbox full, message dropped
    Dropped,
    /// Consumer side gone, message dropped
    Closed,
}

/// Create a mailbox with room for `capacity` pending messages
pub fn mailbox(capacity: usize) -> (Mailbox, Inbox) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        Mailbox { tx },
        Inbox {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Producer half of a client mailbox
#[derive(Debug)]
pub struct Mailbox {
    tx: mpsc::Sender<String>,
}

impl Mailbox {
    /// Try to enqueue without waiting
    pub fn offer(&self, msg: String) -> Delivery {
        match self.tx.try_send(msg) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Dropped,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Close the mailbox; waiting receivers wake up with `Disconnected`
    pub fn close(self) {
        drop(self.tx);
    }
}

/// Consumer half of a client mailbox
///
/// Cheap to clone. Concurrent receivers take turns on the single underlying
/// receiver, each within its own deadline.
#[derive(Debug, Clone)]
pub struct Inbox {
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
}

impl Inbox {
    /// Wait up to `wait` for the next message
    ///
    /// Returns `NoMessages` when the wait elapses and `Disconnected` once the
    /// mailbox is closed and drained. Dropping the returned future cancels
    /// the wait.
    pub async fn recv_timeout(&self, wait: Duration) -> Result<String, ChatError> {
        // a wait too long to represent is a wait without deadline
        let Some(deadline) = Instant::now().checked_add(wait) else {
            return self.recv().await;
        };

        let mut rx = match timeout_at(deadline, self.rx.lock()).await {
            Ok(rx) => rx,
            Err(_) => return Err(ChatError::NoMessages),
        };

        match timeout_at(deadline, rx.recv()).await {
            Ok(Some(msg)) => Ok(msg),
            Ok(None) => Err(ChatError::Disconnected),
            Err(_) => Err(ChatError::NoMessages),
        }
    }

    async fn recv(&self) -> Result<String, ChatError> {
        self.rx.lock().await.recv().await.ok_or(ChatError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let (mailbox, inbox) = mailbox(4);
        assert_eq!(mailbox.offer("one".into()), Delivery::Queued);
        assert_eq!(mailbox.offer("two".into()), Delivery::Queued);

        let wait = Duration::from_millis(50);
        assert_eq!(inbox.recv_timeout(wait).await.unwrap(), "one");
        assert_eq!(inbox.recv_timeout(wait).await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_full_mailbox_drops() {
        let (mailbox, inbox) = mailbox(2);
        assert_eq!(mailbox.offer("a".into()), Delivery::Queued);
        assert_eq!(mailbox.offer("b".into()), Delivery::Queued);
        assert_eq!(mailbox.offer("c".into()), Delivery::Dropped);

        let wait = Duration::from_millis(50);
        assert_eq!(inbox.recv_timeout(wait).await.unwrap(), "a");
        assert_eq!(inbox.recv_timeout(wait).await.unwrap(), "b");
        assert_eq!(inbox.recv_timeout(wait).await, Err(ChatError::NoMessages));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_mailbox_times_out() {
        let (_mailbox, inbox) = mailbox(1);
        let started = Instant::now();
        let result = inbox.recv_timeout(Duration::from_secs(10)).await;
        assert_eq!(result, Err(ChatError::NoMessages));
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_wakes_waiter() {
        let (mailbox, inbox) = mailbox(1);
        let waiter = {
            let inbox = inbox.clone();
            tokio::spawn(async move { inbox.recv_timeout(Duration::from_secs(10)).await })
        };
        tokio::task::yield_now().await;

        mailbox.close();
        let result = waiter.await.unwrap();
        assert_eq!(result, Err(ChatError::Disconnected));
    }

    #[tokio::test]
    async fn test_closed_mailbox_drains_first() {
        let (mailbox, inbox) = mailbox(2);
        mailbox.offer("last words".into());
        mailbox.close();

        let wait = Duration::from_millis(50);
        assert_eq!(inbox.recv_timeout(wait).await.unwrap(), "last words");
        assert_eq!(inbox.recv_timeout(wait).await, Err(ChatError::Disconnected));
    }

    #[tokio::test]
    async fn test_unrepresentable_wait_still_returns() {
        let (mailbox, inbox) = mailbox(1);
        mailbox.offer("hello".into());
        assert_eq!(inbox.recv_timeout(Duration::MAX).await.unwrap(), "hello");

        mailbox.close();
        assert_eq!(inbox.recv_timeout(Duration::MAX).await, Err(ChatError::Disconnected));
    }

    #[tokio::test]
    async fn test_offer_after_inbox_dropped() {
        let (mailbox, inbox) = mailbox(1);
        drop(inbox);
        assert_eq!(mailbox.offer("lost".into()), Delivery::Closed);
    }
}
