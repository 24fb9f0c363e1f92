//! Chat widget controller
//!
//! Ties the session manager, the conversation store and the bridge together
//! for one user on one site. User interaction goes through a [`Notifier`].

use crate::bridge::{ConnectionReport, RemoteBridge, WidgetSettings};
use crate::conversation::{ConversationLog, ConversationStore, Message};
use crate::error::{Error, Result};
use crate::identity::UserIdentity;
use crate::render;
use crate::session::{Credentials, SessionId, SessionManager, SessionState};
use crate::storage::{KeyValueStore, StorageKey};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

const CONFIGURE_CREDENTIALS: &str =
    "Please configure your credentials to use AIDA. Click the settings icon to get started.";
const GENERIC_ERROR: &str = "Sorry, I encountered an error. Please try again.";
const CONFIRM_DISCONNECT: &str = "Are you sure you want to disconnect the current session? This will create a new session when you send your next message.";
const CONFIRM_CLEAR: &str = "Are you sure you want to clear all chat history?";

/// Severity of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Short user-facing message, shown outside the chat log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Notification and confirmation surface of the host
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);

    /// Ask the user a yes/no question
    fn confirm(&self, prompt: &str) -> bool;
}

/// Per-user widget settings, stored under `aida:settings:{identity}`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(alias = "erpUrl")]
    pub site_url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default, alias = "user_avatar_url")]
    pub avatar_url: String,
    #[serde(default)]
    pub sound_notifications: bool,
    #[serde(default = "default_true")]
    pub conversation_logging: bool,
}

fn default_true() -> bool {
    true
}

impl UserSettings {
    /// Defaults for a user who never saved settings
    pub fn for_user(origin: &str, username: &str) -> Self {
        Self {
            site_url: origin.to_string(),
            username: username.to_string(),
            password: String::new(),
            avatar_url: String::new(),
            sound_notifications: false,
            conversation_logging: true,
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.site_url, &self.username, &self.password)
    }
}

impl fmt::Debug for UserSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserSettings")
            .field("site_url", &self.site_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("avatar_url", &self.avatar_url)
            .field("sound_notifications", &self.sound_notifications)
            .field("conversation_logging", &self.conversation_logging)
            .finish()
    }
}

/// One user's chat widget
pub struct ChatWidget {
    bridge: Arc<dyn RemoteBridge>,
    storage: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    sessions: SessionManager,
    conversations: ConversationStore,
    identity: UserIdentity,
    widget_settings: WidgetSettings,
    settings: RwLock<UserSettings>,
}

impl ChatWidget {
    /// Build the widget for `username` on `origin`: load widget settings,
    /// derive the identity, then load user settings and history.
    pub async fn start(
        bridge: Arc<dyn RemoteBridge>,
        storage: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
        origin: &str,
        username: &str,
    ) -> Self {
        let widget_settings = match bridge.widget_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Failed to load widget settings, using defaults");
                WidgetSettings::default()
            }
        };

        let identity = UserIdentity::derive(origin, username);
        let settings = load_user_settings(storage.as_ref(), &identity, origin, username);

        let sessions = SessionManager::new(bridge.clone(), storage.clone());
        let conversations = ConversationStore::new(storage.clone());
        let history = conversations.load(&identity);

        info!(identity = %identity, messages = history.len(), "Chat widget ready");

        Self {
            bridge,
            storage,
            notifier,
            sessions,
            conversations,
            identity,
            widget_settings,
            settings: RwLock::new(settings),
        }
    }

    /// Send one user message and append the outcome to the log.
    ///
    /// Returns the appended reply or error entry, or `None` for blank input.
    pub async fn send_message(&self, text: &str) -> Option<Message> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let credentials = self.settings.read().credentials();
        if !credentials.is_complete() {
            return Some(self.append(Message::error(CONFIGURE_CREDENTIALS)));
        }

        self.append(Message::user(text));
        match self.exchange(text, &credentials).await {
            Ok(reply) => Some(self.append(Message::assistant(reply))),
            Err(e) => {
                error!(identity = %self.identity, error = %e, "AIDA request failed");
                Some(self.append(Message::error(GENERIC_ERROR)))
            }
        }
    }

    async fn exchange(&self, text: &str, credentials: &Credentials) -> Result<String> {
        let session_id = match self.sessions.current(&self.identity) {
            Some(id) => id,
            None => {
                self.sessions
                    .acquire_session(&self.identity, credentials)
                    .await?
            }
        };
        let reply = self
            .sessions
            .send_turn(&session_id, &self.identity, text, credentials)
            .await?;
        Ok(reply.text)
    }

    fn append(&self, message: Message) -> Message {
        self.conversations.append(&self.identity, message.clone());
        message
    }

    /// Make sure a session is active and report it
    pub async fn connect(&self) -> Result<SessionId> {
        if let Some(id) = self.sessions.current(&self.identity) {
            self.notify(
                NoticeLevel::Info,
                format!("Already connected (Session: {})", id.preview()),
            );
            return Ok(id);
        }

        let credentials = self.settings.read().credentials();
        match self
            .sessions
            .acquire_session(&self.identity, &credentials)
            .await
        {
            Ok(id) => {
                self.notify(
                    NoticeLevel::Success,
                    format!("Session connected successfully! (Session: {})", id.preview()),
                );
                Ok(id)
            }
            Err(e) => {
                self.notify(
                    NoticeLevel::Error,
                    format!("Failed to connect session: {}", e),
                );
                Err(e)
            }
        }
    }

    /// Release the current session after confirmation.
    ///
    /// Returns whether a session was released.
    pub fn disconnect(&self) -> bool {
        if self.known_session().is_none() {
            self.notify(NoticeLevel::Info, "No active session to disconnect");
            return false;
        }
        if !self.notifier.confirm(CONFIRM_DISCONNECT) {
            return false;
        }

        self.sessions.release_session(&self.identity);
        self.notify(
            NoticeLevel::Success,
            "Session disconnected! A new session will be created when you send your next message.",
        );
        true
    }

    /// Clear the conversation log after confirmation
    pub fn clear_history(&self) -> bool {
        if !self.notifier.confirm(CONFIRM_CLEAR) {
            return false;
        }
        self.conversations.clear(&self.identity);
        self.notify(NoticeLevel::Success, "Chat history cleared!");
        true
    }

    /// Update and persist the stored username and password
    pub fn save_credentials(&self, username: &str, password: &str) -> Result<()> {
        let snapshot = {
            let mut settings = self.settings.write();
            settings.username = username.trim().to_string();
            settings.password = password.to_string();
            settings.clone()
        };

        let key = StorageKey::settings(&self.identity);
        let result = serde_json::to_string(&snapshot)
            .map_err(Error::from)
            .and_then(|raw| self.storage.set(key.as_str(), &raw));

        match result {
            Ok(()) => {
                info!(identity = %self.identity, "Saved user settings");
                self.notify(NoticeLevel::Success, "Settings saved successfully!");
                Ok(())
            }
            Err(e) => {
                warn!(identity = %self.identity, error = %e, "Failed to save user settings");
                self.notify(
                    NoticeLevel::Error,
                    format!("Failed to save settings: {}", e),
                );
                Err(e)
            }
        }
    }

    /// Use `password` for this process only. Nothing is persisted.
    pub fn use_password(&self, password: &str) {
        self.settings.write().password = password.to_string();
    }

    /// Probe the backend and report the outcome as a notice
    pub async fn test_connection(&self, backend_url: Option<&str>) -> ConnectionReport {
        let url = backend_url.unwrap_or(self.widget_settings.api_server_url.as_str());
        let report = match self.bridge.test_connection(Some(url)).await {
            Ok(report) => report,
            Err(e) => ConnectionReport::failure(e.to_string()),
        };

        if report.success {
            self.notify(NoticeLevel::Success, "Connection successful");
        } else {
            self.notify(
                NoticeLevel::Error,
                format!("Connection failed: {}", report.message),
            );
        }
        report
    }

    /// Rendered transcript of the stored conversation, error entries excluded
    pub fn replay(&self) -> String {
        render::render_transcript(&self.history())
    }

    pub fn history(&self) -> ConversationLog {
        self.conversations.load(&self.identity)
    }

    pub fn welcome_message(&self) -> &str {
        &self.widget_settings.welcome_message
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub fn settings(&self) -> UserSettings {
        self.settings.read().clone()
    }

    pub fn widget_settings(&self) -> &WidgetSettings {
        &self.widget_settings
    }

    /// Current in-memory session state
    pub fn session_state(&self) -> SessionState {
        self.sessions.state(&self.identity)
    }

    /// The in-memory session id, or the stored one when nothing was
    /// acquired yet in this process. Not revalidated.
    pub fn known_session(&self) -> Option<SessionId> {
        self.sessions
            .current(&self.identity)
            .or_else(|| self.sessions.stored_session(&self.identity))
    }

    fn notify(&self, level: NoticeLevel, text: impl Into<String>) {
        self.notifier.notify(Notice::new(level, text));
    }
}

fn load_user_settings(
    storage: &dyn KeyValueStore,
    identity: &UserIdentity,
    origin: &str,
    username: &str,
) -> UserSettings {
    let key = StorageKey::settings(identity);
    match storage.get(key.as_str()) {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(identity = %identity, error = %e, "Discarding unreadable user settings");
            UserSettings::for_user(origin, username)
        }),
        Ok(None) => UserSettings::for_user(origin, username),
        Err(e) => {
            warn!(identity = %identity, error = %e, "Failed to read user settings");
            UserSettings::for_user(origin, username)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::mock::MockBridge;
    use crate::bridge::DEFAULT_WELCOME_MESSAGE;
    use crate::conversation::Role;
    use crate::storage::MemoryStore;
    use parking_lot::Mutex;

    const ORIGIN: &str = "https://erp.example.com";
    const USER: &str = "Administrator";

    struct RecordingNotifier {
        answer: bool,
        notices: Mutex<Vec<Notice>>,
        prompts: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn answering(answer: bool) -> Arc<Self> {
            Arc::new(Self {
                answer,
                notices: Mutex::new(Vec::new()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn last(&self) -> Notice {
            self.notices.lock().last().cloned().unwrap()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, notice: Notice) {
            self.notices.lock().push(notice);
        }

        fn confirm(&self, prompt: &str) -> bool {
            self.prompts.lock().push(prompt.to_string());
            self.answer
        }
    }

    struct Harness {
        bridge: Arc<MockBridge>,
        storage: Arc<MemoryStore>,
        notifier: Arc<RecordingNotifier>,
        widget: ChatWidget,
    }

    async fn harness(bridge: MockBridge, confirm: bool) -> Harness {
        let bridge = Arc::new(bridge);
        let storage = Arc::new(MemoryStore::new());
        let notifier = RecordingNotifier::answering(confirm);
        let widget = ChatWidget::start(
            bridge.clone(),
            storage.clone(),
            notifier.clone(),
            ORIGIN,
            USER,
        )
        .await;
        Harness {
            bridge,
            storage,
            notifier,
            widget,
        }
    }

    async fn logged_in(bridge: MockBridge, confirm: bool) -> Harness {
        let h = harness(bridge, confirm).await;
        h.widget.save_credentials(USER, "admin").unwrap();
        h
    }

    #[tokio::test]
    async fn test_start_derives_identity_and_settings() {
        let h = harness(MockBridge::new(), true).await;
        assert_eq!(h.widget.identity().as_str(), "942a46");
        assert_eq!(h.widget.welcome_message(), "Welcome to AIDA test");

        let settings = h.widget.settings();
        assert_eq!(settings.site_url, ORIGIN);
        assert_eq!(settings.username, USER);
        assert!(settings.password.is_empty());
        assert!(settings.conversation_logging);
    }

    #[tokio::test]
    async fn test_start_falls_back_to_default_widget_settings() {
        let bridge = MockBridge::new();
        bridge.fail_settings();
        let h = harness(bridge, true).await;
        assert_eq!(h.widget.welcome_message(), DEFAULT_WELCOME_MESSAGE);
        assert!(h.widget.widget_settings().enabled);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let h = logged_in(MockBridge::new(), true).await;
        assert!(h.widget.send_message("   ").await.is_none());
        assert!(h.widget.history().is_empty());
        assert_eq!(h.bridge.init_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_credentials_append_error_without_remote_call() {
        let h = harness(MockBridge::new(), true).await;

        let entry = h.widget.send_message("Hello").await.unwrap();

        assert_eq!(entry.role, Role::Error);
        assert_eq!(entry.text, CONFIGURE_CREDENTIALS);
        assert_eq!(h.widget.history().len(), 1);
        assert_eq!(h.bridge.init_calls(), 0);
        assert!(h.bridge.chats().is_empty());
    }

    #[tokio::test]
    async fn test_send_message_round_trip() {
        let h = logged_in(MockBridge::issuing(&["sess-123"]), true).await;

        let reply = h.widget.send_message("Show open invoices").await.unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.text, "echo: Show open invoices");

        h.widget.send_message("And overdue ones?").await.unwrap();
        assert_eq!(h.bridge.init_calls(), 1);
        assert!(h
            .bridge
            .chats()
            .iter()
            .all(|turn| turn.session_id.as_str() == "sess-123"));

        let roles: Vec<Role> = h.widget.history().messages().iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
    }

    #[tokio::test]
    async fn test_failed_turn_appends_generic_error() {
        let bridge = MockBridge::new();
        bridge.fail_chat("upstream timeout");
        let h = logged_in(bridge, true).await;

        let entry = h.widget.send_message("Hello").await.unwrap();

        assert_eq!(entry.role, Role::Error);
        assert_eq!(entry.text, GENERIC_ERROR);
        assert_eq!(h.widget.history().len(), 2);
        assert!(!h.widget.replay().contains(GENERIC_ERROR));
    }

    #[tokio::test]
    async fn test_history_survives_restart() {
        let h = logged_in(MockBridge::new(), true).await;
        h.widget.send_message("Hello").await.unwrap();

        let restarted = ChatWidget::start(
            h.bridge.clone(),
            h.storage.clone(),
            h.notifier.clone(),
            ORIGIN,
            USER,
        )
        .await;

        assert_eq!(restarted.history().len(), 2);
        assert_eq!(restarted.settings().password, "admin");
        assert!(restarted.replay().contains("echo: Hello"));
    }

    #[tokio::test]
    async fn test_use_password_is_not_persisted() {
        let h = harness(MockBridge::new(), true).await;
        h.widget.use_password("from-env");

        let reply = h.widget.send_message("Hello").await.unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert!(h
            .storage
            .get(StorageKey::settings(h.widget.identity()).as_str())
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_connect_reports_session_preview() {
        let h = logged_in(MockBridge::issuing(&["sess-1234567890"]), true).await;

        let id = h.widget.connect().await.unwrap();
        assert_eq!(id.as_str(), "sess-1234567890");
        assert_eq!(h.notifier.last().level, NoticeLevel::Success);
        assert!(h.notifier.last().text.contains("sess-123..."));

        h.widget.connect().await.unwrap();
        assert_eq!(h.notifier.last().level, NoticeLevel::Info);
        assert_eq!(h.bridge.init_calls(), 1);
    }

    #[tokio::test]
    async fn test_connect_without_password_reports_failure() {
        let h = harness(MockBridge::new(), true).await;
        assert!(h.widget.connect().await.is_err());
        assert_eq!(h.notifier.last().level, NoticeLevel::Error);
        assert!(h.notifier.last().text.starts_with("Failed to connect session"));
    }

    #[tokio::test]
    async fn test_disconnect_without_session_informs() {
        let h = logged_in(MockBridge::new(), true).await;

        assert!(!h.widget.disconnect());
        assert_eq!(
            h.notifier.last(),
            Notice::new(NoticeLevel::Info, "No active session to disconnect")
        );
        assert!(h.notifier.prompts.lock().is_empty());
    }

    #[tokio::test]
    async fn test_disconnect_declined_keeps_session() {
        let h = logged_in(MockBridge::new(), false).await;
        h.widget.connect().await.unwrap();

        assert!(!h.widget.disconnect());
        assert!(h.widget.session_state().is_active());
        assert_eq!(h.notifier.prompts.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_confirmed_releases_session() {
        let h = logged_in(MockBridge::new(), true).await;
        h.widget.connect().await.unwrap();

        assert!(h.widget.disconnect());
        assert_eq!(h.widget.session_state(), SessionState::NoSession);
        assert!(h.widget.known_session().is_none());
    }

    #[tokio::test]
    async fn test_clear_history_requires_confirmation() {
        let h = logged_in(MockBridge::new(), false).await;
        h.widget.send_message("Hello").await.unwrap();
        assert!(!h.widget.clear_history());
        assert_eq!(h.widget.history().len(), 2);

        let h = logged_in(MockBridge::new(), true).await;
        h.widget.send_message("Hello").await.unwrap();
        assert!(h.widget.clear_history());
        assert!(h.widget.history().is_empty());
        assert_eq!(h.notifier.last().text, "Chat history cleared!");
    }

    #[tokio::test]
    async fn test_test_connection_relays_report() {
        let h = harness(MockBridge::new(), true).await;

        assert!(h.widget.test_connection(None).await.success);
        assert_eq!(h.notifier.last().level, NoticeLevel::Success);

        let report = h
            .widget
            .test_connection(Some("http://unreachable.invalid"))
            .await;
        assert!(!report.success);
        assert!(h.notifier.last().text.starts_with("Connection failed: "));
    }

    #[test]
    fn test_user_settings_reads_legacy_fields() {
        let raw = r#"{"erpUrl": "https://erp.example.com", "username": "bob", "password": "pw", "user_avatar_url": "/files/bob.png"}"#;
        let settings: UserSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.site_url, "https://erp.example.com");
        assert_eq!(settings.avatar_url, "/files/bob.png");
        assert!(settings.conversation_logging);
        assert!(!format!("{:?}", settings).contains("pw\""));
    }
}
