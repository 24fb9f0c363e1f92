//! Session identifiers, credentials and state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque backend-assigned session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for notices and logs, e.g. `sess-123...`
    pub fn preview(&self) -> String {
        crate::utils::id_preview(&self.0, 8)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// ERP site credentials forwarded to the backend
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub site_url: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        site_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            site_url: site_url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// All three fields are non-blank
    pub fn is_complete(&self) -> bool {
        !self.site_url.trim().is_empty()
            && !self.username.trim().is_empty()
            && !self.password.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("site_url", &self.site_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Per-identity session lifecycle
///
/// ```text
/// NoSession -> Restoring -> Active | NoSession
/// NoSession -> Creating  -> Active | Failed
/// Active    -> NoSession   (release, or backend reports inactive)
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    NoSession,
    Restoring,
    Creating,
    Active(SessionId),
    Failed,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            SessionState::Active(id) => Some(id),
            _ => None,
        }
    }
}

/// Result of a forwarded chat turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    /// Assistant reply text
    pub text: String,
    /// Session id in effect after the turn
    pub session_id: SessionId,
}
