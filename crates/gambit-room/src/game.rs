//! One game, from open invitation to teardown.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gambit_clock::{ChessClock, ClockConfig, Ticker};
use gambit_protocol::{Color, ErrorCode, Flag, Message, Notice, Outbound};
use gambit_session::{
    Direction, Endpoint, LoopExit, PlayerHandle, RelayReport, seat_players,
};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{GameConfig, GameError, GameState, SessionRegistry};

/// How a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameOutcome {
    /// `by`'s inbound loop relayed a terminal flag. For
    /// [`Flag::Timeout`], `by` is the player whose clock ran out.
    Finished { flag: Flag, by: Color },
    /// `color`'s channel closed or failed before a terminal flag.
    Disconnected { color: Color },
    /// No guest attached before the invitation expired.
    Expired,
    /// A `GAME_START` notice could not be delivered.
    StartFailed,
    /// The quit signal was fired from outside (registry removal).
    Cancelled,
}

impl fmt::Display for GameOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Finished { flag, by } => write!(f, "{flag} by {by}"),
            Self::Disconnected { color } => write!(f, "{color} disconnected"),
            Self::Expired => f.write_str("invitation expired"),
            Self::StartFailed => f.write_str("start failed"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// A two-player game.
///
/// Created (and registered) when the host connects; the guest's endpoint
/// arrives later through [`attach`](Self::attach). Players, mailboxes and
/// relay loops only exist once both endpoints are present, so nothing ever
/// runs with a missing second player.
pub struct GameSession<E: Endpoint> {
    token: String,
    config: GameConfig,
    host: Arc<E>,
    guest_tx: Mutex<Option<oneshot::Sender<Arc<E>>>>,
    guest_rx: Mutex<Option<oneshot::Receiver<Arc<E>>>>,
    clocks: Arc<ChessClock>,
    quit: CancellationToken,
    state: watch::Sender<GameState>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<E: Endpoint> GameSession<E> {
    /// Creates a game hosted by `host`, who will play White.
    pub fn new(
        token: impl Into<String>,
        host: Arc<E>,
        config: GameConfig,
    ) -> Arc<Self> {
        let config = config.validated();
        let (guest_tx, guest_rx) = oneshot::channel();
        let (state, _) = watch::channel(GameState::Waiting);
        Arc::new(Self {
            token: token.into(),
            config,
            host,
            guest_tx: Mutex::new(Some(guest_tx)),
            guest_rx: Mutex::new(Some(guest_rx)),
            clocks: Arc::new(ChessClock::new(config.clock.initial_time)),
            quit: CancellationToken::new(),
            state,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The game's clocks.
    pub fn clocks(&self) -> &ChessClock {
        &self.clocks
    }

    pub fn state(&self) -> GameState {
        *self.state.borrow()
    }

    /// Waits until the game has reached `target` (or gone past it).
    pub async fn wait_for_state(&self, target: GameState) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|state| *state >= target).await;
    }

    /// Fires the quit signal. Idempotent.
    pub fn shutdown(&self) {
        self.quit.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.quit.is_cancelled()
    }

    /// Seats `guest` as Black.
    ///
    /// # Errors
    /// - [`GameError::AlreadyStarted`] if a guest is already seated.
    /// - [`GameError::Closed`] if the game is shutting down or the
    ///   invitation expired.
    pub fn attach(&self, guest: Arc<E>) -> Result<(), GameError> {
        if self.is_shutting_down() {
            return Err(GameError::Closed(self.token.clone()));
        }
        let tx = lock(&self.guest_tx)
            .take()
            .ok_or_else(|| GameError::AlreadyStarted(self.token.clone()))?;
        tx.send(guest)
            .map_err(|_| GameError::Closed(self.token.clone()))?;
        debug!(token = %self.token, "guest attached");
        Ok(())
    }

    /// Drives the game to completion and removes it from `registry`.
    ///
    /// Returns when the game reaches [`GameState::Terminated`].
    pub async fn run(
        self: Arc<Self>,
        registry: &SessionRegistry<E>,
    ) -> GameOutcome {
        let outcome = match self.wait_for_guest().await {
            Ok(guest) => self.play(guest).await,
            Err(outcome) => outcome,
        };

        self.quit.cancel();
        self.advance(GameState::Terminating);
        self.clocks.stop_all();
        registry.release(&self).await;
        self.advance(GameState::Terminated);
        info!(token = %self.token, %outcome, "game over");
        outcome
    }

    fn advance(&self, next: GameState) {
        self.state.send_if_modified(|state| {
            if state.can_transition_to(next) {
                debug!(
                    token = %self.token,
                    from = %state,
                    to = %next,
                    "game state"
                );
                *state = next;
                true
            } else {
                false
            }
        });
    }

    async fn wait_for_guest(&self) -> Result<Arc<E>, GameOutcome> {
        let Some(mut rx) = lock(&self.guest_rx).take() else {
            warn!(token = %self.token, "run called twice");
            return Err(GameOutcome::Cancelled);
        };

        let expiry = tokio::time::sleep(self.config.invitation_ttl);
        tokio::pin!(expiry);
        let waited = loop {
            tokio::select! {
                biased;
                _ = self.quit.cancelled() => break Err(GameOutcome::Cancelled),
                guest = &mut rx => {
                    break guest.map_err(|_| GameOutcome::Cancelled);
                }
                _ = &mut expiry => {
                    info!(token = %self.token, "invitation expired");
                    break Err(GameOutcome::Expired);
                }
                // Nothing is relayed yet; this only notices the host leaving.
                received = self.host.receive() => match received {
                    Ok(msg) => {
                        debug!(
                            token = %self.token,
                            %msg,
                            "host sent before start, ignored"
                        );
                    }
                    Err(e) => {
                        info!(
                            token = %self.token,
                            error = %e,
                            "host left before a guest joined"
                        );
                        break Err(GameOutcome::Disconnected {
                            color: Color::White,
                        });
                    }
                },
            }
        };
        // Late attaches now fail with `Closed`.
        lock(&self.guest_tx).take();
        waited
    }

    async fn play(&self, guest: Arc<E>) -> GameOutcome {
        self.advance(GameState::Active);
        info!(token = %self.token, "game starting");

        let white_start: Outbound = Notice::game_start(Color::White).into();
        let black_start: Outbound = Notice::game_start(Color::Black).into();
        let host_start = self.host.send(&white_start).await;
        let guest_start = guest.send(&black_start).await;
        if let Err(e) = host_start.and(guest_start) {
            error!(token = %self.token, error = %e, "could not start game");
            for endpoint in [&self.host, &guest] {
                let report = Outbound::from(ErrorCode::INTERNAL);
                if let Err(e) = endpoint.send(&report).await {
                    debug!(
                        token = %self.token,
                        error = %e,
                        "could not report start failure"
                    );
                }
            }
            return GameOutcome::StartFailed;
        }

        let [white, black] = seat_players(
            Arc::clone(&self.host),
            guest,
            Arc::clone(&self.clocks),
            &self.quit,
        );
        self.clocks.start(Color::White);

        let mut tasks = JoinSet::new();
        for player in [white.player, black.player] {
            let (inbound, outbound) = player.into_relays();
            tasks.spawn(async move { Some(inbound.run().await) });
            tasks.spawn(async move { Some(outbound.run().await) });
        }
        tasks.spawn(clock_loop(
            Arc::clone(&self.clocks),
            [white.handle, black.handle],
            self.config.clock,
            self.quit.clone(),
        ));

        self.supervise(tasks).await
    }

    /// Waits for all five tasks, tracking the state machine on the way.
    async fn supervise(
        &self,
        mut tasks: JoinSet<Option<RelayReport>>,
    ) -> GameOutcome {
        let mut outcome = None;
        loop {
            tokio::select! {
                _ = self.quit.cancelled(),
                    if self.state() < GameState::Terminating =>
                {
                    self.advance(GameState::Terminating);
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok(Some(report))) => {
                        outcome = outcome.or_else(|| outcome_of(&report));
                    }
                    Some(Ok(None)) => {}
                    Some(Err(e)) => {
                        error!(
                            token = %self.token,
                            error = %e,
                            "game task failed"
                        );
                        self.quit.cancel();
                    }
                },
            }
        }
        outcome.unwrap_or(GameOutcome::Cancelled)
    }
}

/// The outcome a relay report implies, if it is the one that ended the game.
fn outcome_of(report: &RelayReport) -> Option<GameOutcome> {
    match (&report.exit, report.direction) {
        (LoopExit::Relayed(flag), Direction::Inbound) => {
            Some(GameOutcome::Finished {
                flag: *flag,
                by: report.color,
            })
        }
        (LoopExit::Closed | LoopExit::Failed(_), _) => {
            Some(GameOutcome::Disconnected {
                color: report.color,
            })
        }
        _ => None,
    }
}

/// Charges the running clock every tick and publishes status to both
/// players every `status_interval`.
///
/// When a clock runs out, the flagged player's inbound loop is handed a
/// `TIMEOUT` message so the game ends through the same path as any other
/// terminal flag.
async fn clock_loop(
    clocks: Arc<ChessClock>,
    handles: [PlayerHandle; 2],
    config: ClockConfig,
    quit: CancellationToken,
) -> Option<RelayReport> {
    let mut ticker = Ticker::new(config.tick_period);
    let mut since_status = Duration::ZERO;
    let mut skipped = 0;
    debug!(period = ?ticker.period(), "clock loop started");

    loop {
        let tick = tokio::select! {
            biased;
            _ = quit.cancelled() => break,
            tick = ticker.wait_for_tick() => tick,
        };
        skipped += tick.ticks_skipped;

        if let Some(flagged) = clocks.tick(tick.elapsed()) {
            clocks.stop_all();
            let snapshot = clocks.snapshot();
            for handle in &handles {
                handle.publish_clock(&snapshot);
            }
            info!(%flagged, "clock ran out");
            let injected = handles
                .iter()
                .find(|h| h.color() == flagged && !h.is_terminated())
                .is_some_and(|h| h.inject(Message::timeout()));
            if !injected {
                quit.cancel();
            }
            quit.cancelled().await;
            break;
        }

        since_status += tick.elapsed();
        if since_status >= config.status_interval {
            since_status = Duration::ZERO;
            let snapshot = clocks.snapshot();
            for handle in &handles {
                handle.publish_clock(&snapshot);
            }
        }
    }

    debug!(
        ticks = ticker.tick_count(),
        overruns = ticker.total_overruns(),
        skipped,
        "clock loop stopped"
    );
    None
}
