//! Session manager for backend chat sessions

use super::types::{Credentials, SessionId, SessionState, TurnReply};
use crate::bridge::{ChatTurn, RemoteBridge, SessionRequest};
use crate::error::{Error, Result};
use crate::identity::UserIdentity;
use crate::storage::{KeyValueStore, StorageKey};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

const MISSING_CREDENTIALS: &str =
    "Password is required for session initialization. Please configure your credentials in the widget settings.";

/// Owns the current backend session for each identity
///
/// A stored session id is always revalidated with the backend before it is
/// reused. Acquisitions are serialized, so at most one creation request is
/// in flight at any time.
pub struct SessionManager {
    bridge: Arc<dyn RemoteBridge>,
    storage: Arc<dyn KeyValueStore>,
    states: RwLock<HashMap<UserIdentity, SessionState>>,
    acquire_lock: tokio::sync::Mutex<()>,
}

impl SessionManager {
    pub fn new(bridge: Arc<dyn RemoteBridge>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            bridge,
            storage,
            states: RwLock::new(HashMap::new()),
            acquire_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Return a usable session id, restoring a known one when the backend
    /// still reports it active and creating a new one otherwise.
    pub async fn acquire_session(
        &self,
        identity: &UserIdentity,
        credentials: &Credentials,
    ) -> Result<SessionId> {
        if !credentials.is_complete() {
            return Err(Error::Auth(MISSING_CREDENTIALS.to_string()));
        }

        let _guard = self.acquire_lock.lock().await;

        if let Some(candidate) = self.current(identity).or_else(|| self.stored_session(identity)) {
            self.set_state(identity, SessionState::Restoring);
            if self.validate_session(&candidate).await {
                info!(identity = %identity, session = %candidate.preview(), "Restored session");
                self.set_state(identity, SessionState::Active(candidate.clone()));
                return Ok(candidate);
            }

            info!(identity = %identity, session = %candidate.preview(), "Session no longer active, creating a new one");
            self.forget_stored(identity);
            self.set_state(identity, SessionState::NoSession);
        }

        self.set_state(identity, SessionState::Creating);
        let request = SessionRequest {
            credentials: credentials.clone(),
            identity: identity.clone(),
        };
        match self.bridge.init_session(&request).await {
            Ok(session_id) => {
                info!(identity = %identity, session = %session_id.preview(), "Created session");
                self.persist(identity, &session_id);
                self.set_state(identity, SessionState::Active(session_id.clone()));
                Ok(session_id)
            }
            Err(e) => {
                warn!(identity = %identity, error = %e, "Session creation failed");
                self.set_state(identity, SessionState::Failed);
                Err(e)
            }
        }
    }

    /// Whether the backend reports the session active. Transport failures
    /// count as inactive.
    pub async fn validate_session(&self, session_id: &SessionId) -> bool {
        match self.bridge.session_status(session_id).await {
            Ok(status) => {
                debug!(session = %session_id.preview(), active = status.active, last_access = ?status.last_access, "Session status");
                status.active
            }
            Err(e) => {
                debug!(session = %session_id.preview(), error = %e, "Session validation failed");
                false
            }
        }
    }

    /// Drop the in-memory and stored session id. Safe to call repeatedly.
    pub fn release_session(&self, identity: &UserIdentity) {
        self.set_state(identity, SessionState::NoSession);
        self.forget_stored(identity);
        info!(identity = %identity, "Released session");
    }

    /// Forward one message. A refreshed session id in the reply replaces the
    /// current one, in memory and in storage.
    pub async fn send_turn(
        &self,
        session_id: &SessionId,
        identity: &UserIdentity,
        message: &str,
        credentials: &Credentials,
    ) -> Result<TurnReply> {
        let turn = ChatTurn {
            message: message.to_string(),
            session_id: session_id.clone(),
            identity: identity.clone(),
            credentials: credentials.clone(),
        };
        let reply = self.bridge.chat(&turn).await?;

        let session_id = match reply.session_id {
            Some(refreshed) if refreshed != *session_id => {
                info!(identity = %identity, session = %refreshed.preview(), "Adopting refreshed session id");
                self.persist(identity, &refreshed);
                self.set_state(identity, SessionState::Active(refreshed.clone()));
                refreshed
            }
            _ => session_id.clone(),
        };

        Ok(TurnReply {
            text: reply.text,
            session_id,
        })
    }

    /// The active in-memory session id, if any
    pub fn current(&self, identity: &UserIdentity) -> Option<SessionId> {
        self.states
            .read()
            .get(identity)
            .and_then(|state| state.session_id().cloned())
    }

    pub fn state(&self, identity: &UserIdentity) -> SessionState {
        self.states
            .read()
            .get(identity)
            .cloned()
            .unwrap_or_default()
    }

    fn set_state(&self, identity: &UserIdentity, state: SessionState) {
        self.states.write().insert(identity.clone(), state);
    }

    /// Session id persisted for `identity`. Entries written as a bare string
    /// rather than JSON are accepted too.
    pub fn stored_session(&self, identity: &UserIdentity) -> Option<SessionId> {
        let key = StorageKey::session_id(identity);
        match self.storage.get(key.as_str()) {
            Ok(Some(raw)) => match serde_json::from_str::<SessionId>(&raw) {
                Ok(id) if !id.as_str().is_empty() => Some(id),
                Ok(_) => None,
                Err(_) => {
                    let raw = raw.trim();
                    (!raw.is_empty()).then(|| SessionId::new(raw))
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(identity = %identity, error = %e, "Failed to read stored session id");
                None
            }
        }
    }

    fn persist(&self, identity: &UserIdentity, session_id: &SessionId) {
        let key = StorageKey::session_id(identity);
        let result = serde_json::to_string(session_id)
            .map_err(Error::from)
            .and_then(|raw| self.storage.set(key.as_str(), &raw));
        if let Err(e) = result {
            warn!(identity = %identity, error = %e, "Failed to persist session id");
        }
    }

    fn forget_stored(&self, identity: &UserIdentity) {
        let key = StorageKey::session_id(identity);
        if let Err(e) = self.storage.remove(key.as_str()) {
            warn!(identity = %identity, error = %e, "Failed to remove stored session id");
        }
    }
}
