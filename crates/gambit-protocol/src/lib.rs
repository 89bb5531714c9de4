//! Wire protocol for gambit.
//!
//! This crate defines what players and the relay say to each other:
//!
//! - **Types** ([`Message`], [`Flag`], [`Color`], [`Outbound`], [`Notice`]):
//!   the records that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those records are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! The relay core never looks inside a move: square indices are carried
//! verbatim, and [`Flag`] is the only field it interprets.
//!
//! ```text
//! Transport (bytes) → Protocol (Message / Outbound) → Session (relay)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{Color, ErrorCode, Flag, Message, Notice, Outbound};
