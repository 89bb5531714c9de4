//! Chess clocks for gambit.
//!
//! - [`Clock`]: one countdown: remaining time plus a running bit.
//! - [`ChessClock`]: a session's two clocks behind one lock, enforcing
//!   that at most one of them runs at any instant.
//! - [`Ticker`]: fixed-period tick source the session's clock loop
//!   waits on inside its `tokio::select!`.
//! - [`ClockConfig`]: time control and loop periods.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = quit.cancelled() => break,
//!         tick = ticker.wait_for_tick() => {
//!             if let Some(flagged) = clocks.tick(tick.elapsed()) {
//!                 // inject TIMEOUT for `flagged`
//!             }
//!         }
//!     }
//! }
//! ```

mod clock;
mod config;
mod ticker;

pub use clock::{ChessClock, Clock, ClockSnapshot, TickOutcome};
pub use config::ClockConfig;
pub use ticker::{TickInfo, Ticker};
