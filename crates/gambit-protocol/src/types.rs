//! Core protocol types for gambit's wire format.
//!
//! Two families of records live here:
//!
//! - [`Message`]: the fixed-shape record players send each other. The
//!   relay forwards it verbatim and only ever reads its [`Flag`].
//! - [`Outbound`]: everything the server writes to a player: relayed
//!   moves, key-value status maps ([`Notice`]) and bare error codes.
//!
//! Field names follow what the browser client produces: it lowercases
//! its JSON before sending, so keys are `idxsrc`, `idxdst` and `flag`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Flag
// ---------------------------------------------------------------------------

/// Outcome/control code carried by every [`Message`].
///
/// The variants are semantically distinct, not ordinal: nothing in the
/// relay compares flags by position.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Flag {
    /// An ordinary move.
    #[default]
    None,
    GameStart,
    Checkmate,
    Timeout,
    Abandon,
    OfferDraw,
    AcceptDraw,
    DeclineDraw,
    KingDrowned,
    ForcedDraw,
}

impl Flag {
    /// Returns `true` if this flag ends the game.
    ///
    /// Every relay loop asks this after forwarding a message; it is the
    /// only place terminal-ness is decided.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Checkmate
                | Self::Timeout
                | Self::Abandon
                | Self::AcceptDraw
                | Self::KingDrowned
                | Self::ForcedDraw
        )
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "NONE",
            Self::GameStart => "GAME_START",
            Self::Checkmate => "CHECKMATE",
            Self::Timeout => "TIMEOUT",
            Self::Abandon => "ABANDON",
            Self::OfferDraw => "OFFER_DRAW",
            Self::AcceptDraw => "ACCEPT_DRAW",
            Self::DeclineDraw => "DECLINE_DRAW",
            Self::KingDrowned => "KING_DROWNED",
            Self::ForcedDraw => "FORCED_DRAW",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A player-to-player record: one move or one control signal.
///
/// `source_index` and `dest_index` are board squares. They are opaque to
/// the relay, except that a non-zero `source_index` marks a real move
/// (zero is used by sentinel/administrative messages such as "I resign").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "idxsrc")]
    pub source_index: i8,
    #[serde(rename = "idxdst")]
    pub dest_index: i8,
    #[serde(default)]
    pub flag: Flag,
}

impl Message {
    /// Creates a message.
    pub fn new(source_index: i8, dest_index: i8, flag: Flag) -> Self {
        Self {
            source_index,
            dest_index,
            flag,
        }
    }

    /// The record the session synthesizes when a player's clock runs out.
    pub fn timeout() -> Self {
        Self::new(0, 0, Flag::Timeout)
    }

    /// Returns `true` if this message represents an actual move, which
    /// hands the clock over to the opponent.
    pub fn is_move(&self) -> bool {
        self.source_index != 0
    }

    /// Shorthand for `self.flag.is_terminal()`.
    pub fn is_terminal(&self) -> bool {
        self.flag.is_terminal()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{},{},{}}}", self.source_index, self.dest_index, self.flag)
    }
}

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// Which side a player is on. The host of a game is always White.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// The other side.
    pub fn opponent(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => f.write_str("White"),
            Self::Black => f.write_str("Black"),
        }
    }
}

// ---------------------------------------------------------------------------
// Notice: key-value status maps
// ---------------------------------------------------------------------------

/// Server-originated status maps.
///
/// Untagged: each variant serializes as a flat JSON object whose keys tell
/// the client what it is looking at (`url`, `gamestart`, `playerTimer`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Notice {
    /// Sent to the host right after it opens a game.
    Invitation { url: String },

    /// Sent to both players once the guest attaches.
    GameStart { gamestart: bool, color: Color },

    /// Periodic clock status, labeled from the recipient's perspective.
    /// Both values are milliseconds.
    #[serde(rename_all = "camelCase")]
    Clock {
        player_timer: u64,
        opponent_timer: u64,
    },
}

impl Notice {
    /// The game-start notice for the player playing `color`.
    pub fn game_start(color: Color) -> Self {
        Self::GameStart {
            gamestart: true,
            color,
        }
    }

    /// A clock notice for a recipient whose own clock shows `own` and
    /// whose opponent's shows `opponent`.
    pub fn clock(own: Duration, opponent: Duration) -> Self {
        Self::Clock {
            player_timer: saturating_millis(own),
            opponent_timer: saturating_millis(opponent),
        }
    }
}

fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

// ---------------------------------------------------------------------------
// ErrorCode / Outbound
// ---------------------------------------------------------------------------

/// Protocol-level failure code, HTTP-style. Serialized as a bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorCode(pub u16);

impl ErrorCode {
    pub const BAD_REQUEST: Self = Self(400);
    pub const NOT_FOUND: Self = Self(404);
    pub const CONFLICT: Self = Self(409);
    pub const INTERNAL: Self = Self(500);
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything the server can write to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outbound {
    /// A message relayed from the opponent (or synthesized by the session).
    Move(Message),
    /// A status map.
    Notice(Notice),
    /// A protocol error.
    Error(ErrorCode),
}

impl From<Message> for Outbound {
    fn from(msg: Message) -> Self {
        Self::Move(msg)
    }
}

impl From<Notice> for Outbound {
    fn from(notice: Notice) -> Self {
        Self::Notice(notice)
    }
}

impl From<ErrorCode> for Outbound {
    fn from(code: ErrorCode) -> Self {
        Self::Error(code)
    }
}

// =========================================================================
// Tests
// =========================================================================
