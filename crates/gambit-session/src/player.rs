//! Players and their relay pipelines.
//!
//! Each [`Player`] is split into an [`InboundRelay`] and an
//! [`OutboundRelay`], which the game session spawns as two tasks:
//!
//! ```text
//!  White endpoint ──receive──▶ InboundRelay(White) ──push──▶ Black mailbox
//!                                                              │
//!  Black endpoint ◀──send──── OutboundRelay(Black) ◀──pop──────┘
//!                                   ▲
//!                       clock status (watch, latest value)
//! ```
//!
//! and the mirror image for Black → White.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use gambit_clock::{ChessClock, ClockSnapshot};
use gambit_protocol::{Color, Flag, Message, Notice, Outbound};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{Endpoint, Mailbox, MailboxReceiver, MailboxSender, SessionError};

/// How long a relayed message may still take to reach a player once the
/// game is over.
pub const QUIT_GRACE: Duration = Duration::from_millis(250);

// ---------------------------------------------------------------------------
// Loop results
// ---------------------------------------------------------------------------

/// Which relay loop of a player a report comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Why a relay loop returned.
#[derive(Debug)]
pub enum LoopExit {
    /// Inbound: this player's terminal message was relayed to the opponent.
    Relayed(Flag),
    /// Outbound: a terminal message was delivered to this player.
    Delivered(Flag),
    /// The quit signal fired.
    Quit,
    /// The player closed the channel.
    Closed,
    /// The opposite end of a mailbox went away.
    PeerGone,
    /// The endpoint failed.
    Failed(SessionError),
}

impl fmt::Display for LoopExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relayed(flag) => write!(f, "relayed {flag}"),
            Self::Delivered(flag) => write!(f, "delivered {flag}"),
            Self::Quit => f.write_str("quit"),
            Self::Closed => f.write_str("channel closed"),
            Self::PeerGone => f.write_str("peer gone"),
            Self::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// What a finished relay task hands back to the game session.
#[derive(Debug)]
pub struct RelayReport {
    pub color: Color,
    pub direction: Direction,
    pub exit: LoopExit,
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// One side of a game, ready to be split into its two relay loops.
pub struct Player<E> {
    color: Color,
    endpoint: Arc<E>,
    inbox: MailboxReceiver,
    opponent: MailboxSender,
    synthetic: mpsc::Receiver<Message>,
    status: watch::Receiver<Notice>,
    clocks: Arc<ChessClock>,
    quit: CancellationToken,
    terminated: CancellationToken,
}

/// The game session's handle on a seated player: how it publishes clock
/// status and injects session-synthesised messages.
#[derive(Debug)]
pub struct PlayerHandle {
    color: Color,
    status: watch::Sender<Notice>,
    synthetic: mpsc::Sender<Message>,
    terminated: CancellationToken,
}

/// A [`Player`] together with its [`PlayerHandle`].
pub struct Seat<E> {
    pub player: Player<E>,
    pub handle: PlayerHandle,
}

/// Wires two endpoints into a pair of players whose mailboxes feed each
/// other. Returns `[white, black]`.
pub fn seat_players<E: Endpoint>(
    white: Arc<E>,
    black: Arc<E>,
    clocks: Arc<ChessClock>,
    quit: &CancellationToken,
) -> [Seat<E>; 2] {
    let (to_white, white_inbox) = Mailbox::new();
    let (to_black, black_inbox) = Mailbox::new();
    let snapshot = clocks.snapshot();

    let seat = |color: Color,
                endpoint: Arc<E>,
                inbox: MailboxReceiver,
                opponent: MailboxSender| {
        let (own, opp) = snapshot.perspective(color);
        let (status_tx, status_rx) = watch::channel(Notice::clock(own, opp));
        let (synthetic_tx, synthetic_rx) = mpsc::channel(1);
        let terminated = CancellationToken::new();
        Seat {
            player: Player {
                color,
                endpoint,
                inbox,
                opponent,
                synthetic: synthetic_rx,
                status: status_rx,
                clocks: Arc::clone(&clocks),
                quit: quit.clone(),
                terminated: terminated.clone(),
            },
            handle: PlayerHandle {
                color,
                status: status_tx,
                synthetic: synthetic_tx,
                terminated,
            },
        }
    };

    [
        seat(Color::White, white, white_inbox, to_black),
        seat(Color::Black, black, black_inbox, to_white),
    ]
}

impl<E: Endpoint> Player<E> {
    pub fn color(&self) -> Color {
        self.color
    }

    /// Splits the player into its two loops.
    pub fn into_relays(self) -> (InboundRelay<E>, OutboundRelay<E>) {
        let inbound = InboundRelay {
            color: self.color,
            endpoint: Arc::clone(&self.endpoint),
            opponent: self.opponent,
            synthetic: self.synthetic,
            clocks: self.clocks,
            quit: self.quit.clone(),
            terminated: self.terminated.clone(),
        };
        let outbound = OutboundRelay {
            color: self.color,
            endpoint: self.endpoint,
            inbox: self.inbox,
            status: self.status,
            quit: self.quit,
            terminated: self.terminated,
        };
        (inbound, outbound)
    }
}

impl PlayerHandle {
    pub fn color(&self) -> Color {
        self.color
    }

    /// Publishes the current clocks, labeled from this player's side.
    pub fn publish_clock(&self, snapshot: &ClockSnapshot) {
        let (own, opponent) = snapshot.perspective(self.color);
        self.status.send_replace(Notice::clock(own, opponent));
    }

    /// Hands a message to this player's inbound loop as if the player had
    /// sent it. Returns `false` if the lane is full or the loop is gone.
    pub fn inject(&self, msg: Message) -> bool {
        self.synthetic.try_send(msg).is_ok()
    }

    /// `true` once either of this player's loops has returned.
    pub fn is_terminated(&self) -> bool {
        self.terminated.is_cancelled()
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Receives from a player and forwards to the opponent's mailbox.
pub struct InboundRelay<E> {
    color: Color,
    endpoint: Arc<E>,
    opponent: MailboxSender,
    synthetic: mpsc::Receiver<Message>,
    clocks: Arc<ChessClock>,
    quit: CancellationToken,
    terminated: CancellationToken,
}

impl<E: Endpoint> InboundRelay<E> {
    /// Runs until a terminal flag is relayed, the endpoint fails, or quit
    /// fires. Fires quit on the way out.
    pub async fn run(mut self) -> RelayReport {
        let exit = self.relay().await;
        log_exit(self.color, Direction::Inbound, &exit);
        self.terminated.cancel();
        self.quit.cancel();
        RelayReport {
            color: self.color,
            direction: Direction::Inbound,
            exit,
        }
    }

    async fn relay(&mut self) -> LoopExit {
        loop {
            // Claim the opponent's slot before reading, so a second message
            // is never taken off the wire while the first is undelivered.
            let permit = tokio::select! {
                biased;
                _ = self.quit.cancelled() => return LoopExit::Quit,
                permit = self.opponent.reserve() => match permit {
                    Ok(permit) => permit,
                    Err(_) => return LoopExit::PeerGone,
                },
            };

            let msg = tokio::select! {
                biased;
                _ = self.quit.cancelled() => return LoopExit::Quit,
                Some(msg) = self.synthetic.recv() => msg,
                received = self.endpoint.receive() => match received {
                    Ok(msg) => msg,
                    Err(SessionError::ChannelClosed) => return LoopExit::Closed,
                    Err(e) => return LoopExit::Failed(e),
                },
            };

            // Push and hand the clock over with no await in between: the
            // opponent's status can only show its clock running after the
            // move is already queued for it. A game-ending move leaves the
            // clocks alone.
            permit.push(msg);
            if msg.is_move() && !msg.is_terminal() {
                self.clocks.hand_over(self.color);
            }
            debug!(color = %self.color, %msg, "relayed");

            if msg.is_terminal() {
                return LoopExit::Relayed(msg.flag);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Drains a player's mailbox onto its endpoint, interleaving clock status.
pub struct OutboundRelay<E> {
    color: Color,
    endpoint: Arc<E>,
    inbox: MailboxReceiver,
    status: watch::Receiver<Notice>,
    quit: CancellationToken,
    terminated: CancellationToken,
}

impl<E: Endpoint> OutboundRelay<E> {
    /// Runs until a terminal flag is delivered, a send fails, or quit
    /// fires. Fires quit on the way out.
    pub async fn run(mut self) -> RelayReport {
        let exit = self.deliver().await;
        log_exit(self.color, Direction::Outbound, &exit);
        self.terminated.cancel();
        self.quit.cancel();
        RelayReport {
            color: self.color,
            direction: Direction::Outbound,
            exit,
        }
    }

    async fn deliver(&mut self) -> LoopExit {
        let mut status_open = true;
        loop {
            tokio::select! {
                biased;
                popped = self.inbox.pop() => {
                    // The mailbox closes only once the opponent's inbound
                    // loop has returned, which fires quit first.
                    let Some(msg) = popped else {
                        return if self.quit.is_cancelled() {
                            LoopExit::Quit
                        } else {
                            LoopExit::PeerGone
                        };
                    };
                    if let Some(exit) = self.send_relayed(msg).await {
                        return exit;
                    }
                }
                _ = self.quit.cancelled() => return self.drain().await,
                changed = self.status.changed(), if status_open => {
                    if changed.is_err() {
                        status_open = false;
                        continue;
                    }
                    let notice = self.status.borrow_and_update().clone();
                    let payload = Outbound::from(notice);
                    tokio::select! {
                        biased;
                        sent = self.endpoint.send(&payload) => {
                            if let Err(e) = sent {
                                return LoopExit::Failed(e);
                            }
                        }
                        _ = self.quit.cancelled() => {
                            return self.drain().await;
                        }
                    }
                }
            }
        }
    }

    /// Sends one relayed message. `Some` means the loop is done.
    ///
    /// A player who stops reading cannot hold the loop past quit: the
    /// send gets [`QUIT_GRACE`] after quit fires, then it is abandoned.
    async fn send_relayed(&self, msg: Message) -> Option<LoopExit> {
        let deadline = async {
            self.quit.cancelled().await;
            tokio::time::sleep(QUIT_GRACE).await;
        };
        let payload = Outbound::Move(msg);
        tokio::select! {
            biased;
            sent = self.endpoint.send(&payload) => {
                if let Err(e) = sent {
                    return Some(LoopExit::Failed(e));
                }
            }
            _ = deadline => {
                warn!(color = %self.color, %msg, "player not reading, dropped");
                return Some(LoopExit::Quit);
            }
        }
        debug!(color = %self.color, %msg, "delivered");
        msg.is_terminal().then_some(LoopExit::Delivered(msg.flag))
    }

    /// Quit fired: deliver whatever is already queued, then stop.
    async fn drain(&mut self) -> LoopExit {
        while let Some(msg) = self.inbox.try_pop() {
            if let Some(exit) = self.send_relayed(msg).await {
                return exit;
            }
        }
        LoopExit::Quit
    }
}

fn log_exit(color: Color, direction: Direction, exit: &LoopExit) {
    match exit {
        LoopExit::Failed(e) => {
            warn!(%color, ?direction, error = %e, "relay loop failed");
        }
        LoopExit::Relayed(_) | LoopExit::Delivered(_) | LoopExit::Closed => {
            info!(%color, ?direction, %exit, "relay loop finished");
        }
        LoopExit::Quit | LoopExit::PeerGone => {
            debug!(%color, ?direction, %exit, "relay loop finished");
        }
    }
}
