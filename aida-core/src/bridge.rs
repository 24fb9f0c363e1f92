//! Remote call bridge to the AIDA API server
//!
//! The [`RemoteBridge`] trait is the seam between the client and the
//! backend. The HTTP implementation lives in the `aida-bridge` crate.

use crate::error::{Error, Result};
use crate::identity::UserIdentity;
use crate::session::{Credentials, SessionId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Greeting shown when the backend does not configure one
pub const DEFAULT_WELCOME_MESSAGE: &str =
    "Hello! I'm AIDA, your AI assistant. How can I help you today?";

/// Default AIDA API server
pub const DEFAULT_API_SERVER_URL: &str = "https://aida.mocxha.com";

/// Request to open a backend session
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub credentials: Credentials,
    pub identity: UserIdentity,
}

/// Backend view of a session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub last_access: Option<String>,
}

/// One outgoing chat message
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub message: String,
    pub session_id: SessionId,
    pub identity: UserIdentity,
    pub credentials: Credentials,
}

/// Backend reply to a chat message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub text: String,
    /// Set when the backend rotated the session
    pub session_id: Option<SessionId>,
}

/// Outcome of a connectivity check. Failures are reported here, not as errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionReport {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_time: Option<String>,
}

impl ConnectionReport {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Screen corner the widget is anchored to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Position {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl Position {
    pub fn as_str(self) -> &'static str {
        match self {
            Position::BottomRight => "bottom-right",
            Position::BottomLeft => "bottom-left",
            Position::TopRight => "top-right",
            Position::TopLeft => "top-left",
        }
    }
}

impl FromStr for Position {
    type Err = Error;

    /// Accepts `bottom-right` as well as labels like `Bottom Right`
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace([' ', '_'], "-").as_str() {
            "bottom-right" => Ok(Position::BottomRight),
            "bottom-left" => Ok(Position::BottomLeft),
            "top-right" => Ok(Position::TopRight),
            "top-left" => Ok(Position::TopLeft),
            _ => Err(Error::Validation(format!("unknown widget position '{}'", s))),
        }
    }
}

impl TryFrom<String> for Position {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Position> for String {
    fn from(value: Position) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Widget color scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }
}

impl FromStr for Theme {
    type Err = Error;

    /// `Default` is the legacy label for the light theme
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" | "default" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(Error::Validation(format!("unknown widget theme '{}'", s))),
        }
    }
}

impl TryFrom<String> for Theme {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Theme> for String {
    fn from(value: Theme) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Site-wide widget configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetSettings {
    pub enabled: bool,
    pub auto_open: bool,
    pub api_server_url: String,
    pub welcome_message: String,
    pub position: Position,
    pub theme: Theme,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_open: false,
            api_server_url: DEFAULT_API_SERVER_URL.to_string(),
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            position: Position::default(),
            theme: Theme::default(),
        }
    }
}

/// Remote operations the client needs from the backend
#[async_trait]
pub trait RemoteBridge: Send + Sync {
    /// Open a new backend session for the given credentials
    async fn init_session(&self, request: &SessionRequest) -> Result<SessionId>;

    /// Ask the backend whether a session is still active
    async fn session_status(&self, session_id: &SessionId) -> Result<SessionStatus>;

    /// Forward one chat message
    async fn chat(&self, turn: &ChatTurn) -> Result<ChatReply>;

    /// Probe a backend, defaulting to the configured one
    async fn test_connection(&self, backend_url: Option<&str>) -> Result<ConnectionReport>;

    /// Site-wide widget settings
    async fn widget_settings(&self) -> Result<WidgetSettings>;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::{HashSet, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Scriptable in-process backend
    #[derive(Default)]
    pub struct MockBridge {
        issued: Mutex<VecDeque<String>>,
        active: Mutex<HashSet<String>>,
        init_calls: AtomicUsize,
        status_calls: AtomicUsize,
        chats: Mutex<Vec<ChatTurn>>,
        init_error: Mutex<Option<String>>,
        status_unreachable: AtomicBool,
        chat_error: Mutex<Option<String>>,
        rotate_to: Mutex<Option<String>>,
        settings_error: AtomicBool,
    }

    impl MockBridge {
        pub fn new() -> Self {
            Self::default()
        }

        /// Ids handed out by successive `init_session` calls
        pub fn issuing(ids: &[&str]) -> Self {
            let bridge = Self::new();
            bridge
                .issued
                .lock()
                .extend(ids.iter().map(|id| id.to_string()));
            bridge
        }

        pub fn mark_active(&self, id: &str) {
            self.active.lock().insert(id.to_string());
        }

        pub fn mark_inactive(&self, id: &str) {
            self.active.lock().remove(id);
        }

        pub fn reject_credentials(&self, message: &str) {
            *self.init_error.lock() = Some(message.to_string());
        }

        pub fn set_status_unreachable(&self, unreachable: bool) {
            self.status_unreachable.store(unreachable, Ordering::SeqCst);
        }

        pub fn fail_chat(&self, message: &str) {
            *self.chat_error.lock() = Some(message.to_string());
        }

        /// The next chat reply carries this new session id
        pub fn rotate_on_next_chat(&self, id: &str) {
            *self.rotate_to.lock() = Some(id.to_string());
        }

        pub fn fail_settings(&self) {
            self.settings_error.store(true, Ordering::SeqCst);
        }

        pub fn init_calls(&self) -> usize {
            self.init_calls.load(Ordering::SeqCst)
        }

        pub fn status_calls(&self) -> usize {
            self.status_calls.load(Ordering::SeqCst)
        }

        pub fn chats(&self) -> Vec<ChatTurn> {
            self.chats.lock().clone()
        }
    }

    #[async_trait]
    impl RemoteBridge for MockBridge {
        async fn init_session(&self, _request: &SessionRequest) -> Result<SessionId> {
            let n = self.init_calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::task::yield_now().await;
            if let Some(message) = self.init_error.lock().clone() {
                return Err(Error::Auth(message));
            }
            let id = self
                .issued
                .lock()
                .pop_front()
                .unwrap_or_else(|| format!("sess-{}", n));
            self.mark_active(&id);
            Ok(SessionId::new(id))
        }

        async fn session_status(&self, session_id: &SessionId) -> Result<SessionStatus> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.status_unreachable.load(Ordering::SeqCst) {
                return Err(Error::Network("connection refused".into()));
            }
            Ok(SessionStatus {
                active: self.active.lock().contains(session_id.as_str()),
                last_access: None,
            })
        }

        async fn chat(&self, turn: &ChatTurn) -> Result<ChatReply> {
            self.chats.lock().push(turn.clone());
            if let Some(message) = self.chat_error.lock().clone() {
                return Err(Error::Api(message));
            }
            let rotated = self.rotate_to.lock().take();
            if let Some(id) = &rotated {
                self.mark_active(id);
            }
            Ok(ChatReply {
                text: format!("echo: {}", turn.message),
                session_id: rotated.map(SessionId::new),
            })
        }

        async fn test_connection(&self, backend_url: Option<&str>) -> Result<ConnectionReport> {
            match backend_url {
                Some(url) if url.contains("unreachable") => Ok(ConnectionReport::failure(
                    "Cannot connect to AIDA server. Please check the URL and ensure the server is running.",
                )),
                _ => Ok(ConnectionReport {
                    success: true,
                    message: "Connection successful".into(),
                    server_status: Some("healthy".into()),
                    server_time: None,
                }),
            }
        }

        async fn widget_settings(&self) -> Result<WidgetSettings> {
            if self.settings_error.load(Ordering::SeqCst) {
                return Err(Error::Network("settings unavailable".into()));
            }
            Ok(WidgetSettings {
                welcome_message: "Welcome to AIDA test".into(),
                ..Default::default()
            })
        }
    }
}
