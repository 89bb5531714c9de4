//! Capacity-1 message queue between one player's inbound loop and the
//! opponent's outbound loop.
//!
//! The single slot is what gives the relay its backpressure: a sender that
//! wants to push a second message must wait until the receiver has popped
//! the first one.

use gambit_protocol::Message;
use tokio::sync::mpsc;

use crate::SessionError;

/// Constructor for the queue halves.
pub struct Mailbox;

impl Mailbox {
    /// Number of undelivered messages a mailbox can hold.
    pub const CAPACITY: usize = 1;

    /// Creates a new, empty mailbox.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (MailboxSender, MailboxReceiver) {
        let (tx, rx) = mpsc::channel(Self::CAPACITY);
        (MailboxSender { tx }, MailboxReceiver { rx })
    }
}

/// Producer half, held by the opponent's inbound loop.
#[derive(Debug)]
pub struct MailboxSender {
    tx: mpsc::Sender<Message>,
}

/// A reserved slot. Pushing through it never waits.
pub struct Permit<'a> {
    inner: mpsc::Permit<'a, Message>,
}

impl Permit<'_> {
    pub fn push(self, msg: Message) {
        self.inner.send(msg);
    }
}

impl MailboxSender {
    /// Waits until the slot is free and reserves it.
    ///
    /// Cancel-safe: dropping the future gives up the place in line but
    /// loses nothing.
    ///
    /// # Errors
    /// [`SessionError::ChannelClosed`] if the receiver is gone.
    pub async fn reserve(&self) -> Result<Permit<'_>, SessionError> {
        let inner = self
            .tx
            .reserve()
            .await
            .map_err(|_| SessionError::ChannelClosed)?;
        Ok(Permit { inner })
    }

    /// Waits for the slot and pushes `msg` into it.
    pub async fn push(&self, msg: Message) -> Result<(), SessionError> {
        self.reserve().await?.push(msg);
        Ok(())
    }

    /// `true` once the receiving half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, held by the owning player's outbound loop.
#[derive(Debug)]
pub struct MailboxReceiver {
    rx: mpsc::Receiver<Message>,
}

impl MailboxReceiver {
    /// Waits for the next message. `None` once the sender is gone and the
    /// slot is empty.
    ///
    /// Cancel-safe.
    pub async fn pop(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Takes the queued message, if any, without waiting.
    pub fn try_pop(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gambit_protocol::Flag;

    use super::*;

    #[tokio::test]
    async fn test_push_then_pop_returns_message() {
        let (tx, mut rx) = Mailbox::new();
        tx.push(Message::new(1, 5, Flag::None)).await.unwrap();
        assert_eq!(rx.pop().await, Some(Message::new(1, 5, Flag::None)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_reserve_waits_for_pop() {
        let (tx, mut rx) = Mailbox::new();
        tx.push(Message::new(1, 2, Flag::None)).await.unwrap();

        let blocked =
            tokio::time::timeout(Duration::from_millis(50), tx.reserve()).await;
        assert!(blocked.is_err(), "slot should still be taken");

        assert!(rx.try_pop().is_some());
        let permit =
            tokio::time::timeout(Duration::from_millis(50), tx.reserve())
                .await
                .expect("slot freed by pop")
                .unwrap();
        permit.push(Message::new(3, 4, Flag::None));
        assert_eq!(rx.try_pop(), Some(Message::new(3, 4, Flag::None)));
    }

    #[tokio::test]
    async fn test_try_pop_on_empty_returns_none() {
        let (_tx, mut rx) = Mailbox::new();
        assert_eq!(rx.try_pop(), None);
    }

    #[tokio::test]
    async fn test_reserve_after_receiver_dropped_returns_closed() {
        let (tx, rx) = Mailbox::new();
        drop(rx);
        assert!(tx.is_closed());
        assert!(matches!(tx.reserve().await, Err(SessionError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_pop_after_sender_dropped_drains_then_none() {
        let (tx, mut rx) = Mailbox::new();
        tx.push(Message::timeout()).await.unwrap();
        drop(tx);
        assert_eq!(rx.pop().await, Some(Message::timeout()));
        assert_eq!(rx.pop().await, None);
    }
}
