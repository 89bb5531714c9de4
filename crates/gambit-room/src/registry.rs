//! Invitation registry: token → game.

use std::collections::HashMap;
use std::sync::Arc;

use gambit_session::Endpoint;
use tokio::sync::RwLock;

use crate::{GameError, GameSession};

/// Maps invitation tokens to the games waiting on (or playing under) them.
///
/// The lock guards the map only. It is never held across endpoint I/O, so
/// a slow player can never stall a lookup.
///
/// A token present in the registry denotes a game that has not been torn
/// down yet; every game removes its own entry as the last step of
/// [`GameSession::run`].
pub struct SessionRegistry<E: Endpoint> {
    entries: RwLock<HashMap<String, Arc<GameSession<E>>>>,
}

impl<E: Endpoint> Default for SessionRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Endpoint> SessionRegistry<E> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Registers `session` under `token`.
    ///
    /// Tokens are expected to be unique. If one is reused anyway, the new
    /// session replaces the old one, which is returned (and left running).
    pub async fn create(
        &self,
        token: impl Into<String>,
        session: Arc<GameSession<E>>,
    ) -> Option<Arc<GameSession<E>>> {
        let token = token.into();
        let displaced =
            self.entries.write().await.insert(token.clone(), session);
        if displaced.is_some() {
            tracing::warn!(%token, "token reused, previous game displaced");
        } else {
            tracing::info!(%token, "game registered");
        }
        displaced
    }

    /// Finds the game registered under `token`.
    pub async fn lookup(&self, token: &str) -> Option<Arc<GameSession<E>>> {
        self.entries.read().await.get(token).cloned()
    }

    /// Looks up `token` and seats `guest` in that game.
    ///
    /// # Errors
    /// [`GameError::NotFound`] for an unknown token, otherwise whatever
    /// [`GameSession::attach`] reports. The registry is not modified.
    pub async fn join(
        &self,
        token: &str,
        guest: Arc<E>,
    ) -> Result<Arc<GameSession<E>>, GameError> {
        let session = self
            .lookup(token)
            .await
            .ok_or_else(|| GameError::NotFound(token.to_string()))?;
        session.attach(guest)?;
        Ok(session)
    }

    /// Removes `token`, firing the game's quit signal before the entry is
    /// dropped. Removing an absent token is a no-op.
    ///
    /// Returns `true` if an entry was removed.
    pub async fn remove(&self, token: &str) -> bool {
        let mut entries = self.entries.write().await;
        let Some(session) = entries.get(token) else {
            return false;
        };
        session.shutdown();
        entries.remove(token);
        tracing::info!(%token, "game removed");
        true
    }

    /// Removes `session`'s entry, unless its token has since been taken
    /// over by a different game.
    pub(crate) async fn release(&self, session: &Arc<GameSession<E>>) {
        let mut entries = self.entries.write().await;
        let token = session.token();
        let current = entries.get(token);
        if current.is_some_and(|current| Arc::ptr_eq(current, session)) {
            session.shutdown();
            entries.remove(token);
            tracing::debug!(%token, "game released");
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Snapshot of the registered tokens.
    pub async fn tokens(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }
}
