//! The message channel a relay loop talks to.
//!
//! [`Endpoint`] is the seam between the relay and the network: the loops
//! only ever `receive` a [`Message`] and `send` an [`Outbound`]. Two
//! implementations ship with the crate:
//!
//! - [`MessageChannel`]: a transport [`Connection`] plus a [`Codec`].
//! - [`MemoryEndpoint`]: an in-process endpoint backed by tokio channels,
//!   driven from the other side through a [`MemoryPeer`].

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use gambit_protocol::{Codec, ErrorCode, Message, Outbound};
use gambit_transport::Connection;
use tokio::sync::{Mutex, mpsc};

use crate::SessionError;

/// A bidirectional message channel to one player.
///
/// `receive` and `send` may be called concurrently from different tasks
/// (the inbound and outbound loops share one endpoint).
pub trait Endpoint: Send + Sync + 'static {
    /// Waits for the next message from the player.
    ///
    /// # Errors
    /// [`SessionError::ChannelClosed`] on an orderly close; any other
    /// variant for a failure.
    fn receive(
        &self,
    ) -> impl Future<Output = Result<Message, SessionError>> + Send;

    /// Sends a payload to the player.
    fn send(
        &self,
        payload: &Outbound,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Closes the channel. Idempotent; errors are logged, not returned.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

// ---------------------------------------------------------------------------
// MessageChannel
// ---------------------------------------------------------------------------

/// [`Endpoint`] over a transport connection.
///
/// Once the peer has closed (or any I/O on the connection failed) the
/// channel is marked closed and every later `send` fails fast with
/// [`SessionError::ChannelClosed`] without touching the connection.
pub struct MessageChannel<C, K> {
    conn: C,
    codec: K,
    closed: AtomicBool,
}

impl<C: Connection, K: Codec> MessageChannel<C, K> {
    pub fn new(conn: C, codec: K) -> Self {
        Self {
            conn,
            codec,
            closed: AtomicBool::new(false),
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn mark_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl<C: Connection, K: Codec> Endpoint for MessageChannel<C, K> {
    async fn receive(&self) -> Result<Message, SessionError> {
        if self.is_closed() {
            return Err(SessionError::ChannelClosed);
        }
        let bytes = match self.conn.recv().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.mark_closed();
                return Err(SessionError::ChannelClosed);
            }
            Err(e) => {
                self.mark_closed();
                return Err(SessionError::transport(e));
            }
        };

        match self.codec.decode::<Message>(&bytes) {
            Ok(msg) => Ok(msg),
            Err(e) => {
                let conn = self.conn.id();
                tracing::warn!(%conn, error = %e, "undecodable message");
                let reply = Outbound::from(ErrorCode::BAD_REQUEST);
                if let Err(send_err) = self.send(&reply).await {
                    tracing::debug!(
                        %conn,
                        error = %send_err,
                        "could not report bad request"
                    );
                }
                Err(e.into())
            }
        }
    }

    async fn send(&self, payload: &Outbound) -> Result<(), SessionError> {
        if self.is_closed() {
            return Err(SessionError::ChannelClosed);
        }
        let bytes = self.codec.encode(payload)?;
        self.conn.send(&bytes).await.map_err(|e| {
            self.mark_closed();
            SessionError::transport(e)
        })
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.conn.close().await {
            tracing::debug!(conn = %self.conn.id(), error = %e, "close failed");
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryEndpoint
// ---------------------------------------------------------------------------

/// Creates a connected in-memory endpoint and the handle that plays the
/// remote player.
///
/// `capacity` bounds how many payloads can sit undelivered on the way to
/// the peer; a full buffer makes [`Endpoint::send`] wait, like a slow
/// socket would.
pub fn memory_pair(capacity: usize) -> (MemoryEndpoint, MemoryPeer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::channel(capacity.max(1));
    let endpoint = MemoryEndpoint {
        incoming: Mutex::new(in_rx),
        outgoing: out_tx,
        received: AtomicUsize::new(0),
        closed: AtomicBool::new(false),
    };
    let peer = MemoryPeer {
        tx: Some(in_tx),
        rx: out_rx,
    };
    (endpoint, peer)
}

/// Server side of an in-memory channel.
pub struct MemoryEndpoint {
    incoming: Mutex<mpsc::UnboundedReceiver<Message>>,
    outgoing: mpsc::Sender<Outbound>,
    received: AtomicUsize,
    closed: AtomicBool,
}

impl MemoryEndpoint {
    /// How many messages `receive` has handed out so far.
    pub fn received(&self) -> usize {
        self.received.load(Ordering::Acquire)
    }
}

impl Endpoint for MemoryEndpoint {
    async fn receive(&self) -> Result<Message, SessionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::ChannelClosed);
        }
        let msg = self
            .incoming
            .lock()
            .await
            .recv()
            .await
            .ok_or(SessionError::ChannelClosed)?;
        self.received.fetch_add(1, Ordering::AcqRel);
        Ok(msg)
    }

    async fn send(&self, payload: &Outbound) -> Result<(), SessionError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SessionError::ChannelClosed);
        }
        self.outgoing
            .send(payload.clone())
            .await
            .map_err(|_| SessionError::ChannelClosed)
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Remote side of an in-memory channel: what a connected player would do.
pub struct MemoryPeer {
    tx: Option<mpsc::UnboundedSender<Message>>,
    rx: mpsc::Receiver<Outbound>,
}

impl MemoryPeer {
    /// Sends a message to the server. Returns `false` if the server side
    /// is gone or [`hang_up`](Self::hang_up) was called.
    pub fn send(&self, msg: Message) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.send(msg).is_ok())
    }

    /// Waits for the next payload from the server. `None` once the
    /// server side is dropped and everything has been read.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.rx.recv().await
    }

    /// Takes a payload if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Outbound> {
        self.rx.try_recv().ok()
    }

    /// Closes the player-to-server direction; the server's next
    /// `receive` reports [`SessionError::ChannelClosed`].
    pub fn hang_up(&mut self) {
        self.tx = None;
    }
}
