//! Per-player relay for gambit.
//!
//! This crate moves moves. For each player of a game it runs:
//!
//! 1. **Inbound loop**: receives from the player's [`Endpoint`] and pushes
//!    onto the opponent's [`Mailbox`](mailbox) (capacity 1), handing the
//!    clock over on every real move.
//! 2. **Outbound loop**: pops from the player's own mailbox and sends,
//!    interleaving the latest clock status.
//!
//! Both loops stop on a terminal flag, on a transport error, or when the
//! game's quit signal fires, and firing it themselves on the way out.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)       ← owns the quit signal, clock loop, registry
//!     ↕
//! Session Layer (this crate) ← relay pipelines, endpoints, mailboxes
//!     ↕
//! Protocol / Transport (below) ← Message, Outbound, Connection
//! ```

mod endpoint;
mod error;
mod mailbox;
mod player;
mod token;

pub use endpoint::{
    Endpoint, MemoryEndpoint, MemoryPeer, MessageChannel, memory_pair,
};
pub use error::SessionError;
pub use mailbox::{Mailbox, MailboxReceiver, MailboxSender, Permit};
pub use player::{
    Direction, InboundRelay, LoopExit, OutboundRelay, Player, PlayerHandle,
    QUIT_GRACE, RelayReport, Seat, seat_players,
};
pub use token::generate_token;
