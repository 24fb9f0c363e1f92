//! Configuration schema definitions

use crate::bridge::{Position, Theme, WidgetSettings, DEFAULT_API_SERVER_URL, DEFAULT_WELCOME_MESSAGE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Root configuration for the AIDA client
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// AIDA API server
    #[serde(default)]
    pub backend: BackendConfig,
    /// Site-wide widget settings
    #[serde(default)]
    pub widget: WidgetConfig,
    /// ERP site and default user
    #[serde(default)]
    pub site: SiteConfig,
    /// Local persistence
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Widget settings as served to the chat widget
    pub fn widget_settings(&self) -> WidgetSettings {
        WidgetSettings {
            enabled: self.widget.enabled,
            auto_open: self.widget.auto_open,
            api_server_url: self.backend.api_server_url.clone(),
            welcome_message: self.widget.welcome_message.clone(),
            position: self.widget.position,
            theme: self.widget.theme,
        }
    }
}

/// AIDA API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the API server
    pub api_server_url: String,
    /// Timeout for session creation and chat requests
    pub request_timeout_secs: u64,
    /// Timeout for session status and health checks
    pub status_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_server_url: DEFAULT_API_SERVER_URL.to_string(),
            request_timeout_secs: 30,
            status_timeout_secs: 10,
        }
    }
}

/// Widget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WidgetConfig {
    pub enabled: bool,
    pub auto_open: bool,
    pub welcome_message: String,
    pub position: Position,
    pub theme: Theme,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_open: false,
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            position: Position::default(),
            theme: Theme::default(),
        }
    }
}

/// ERP site the client acts for
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Site origin, e.g. `https://erp.example.com`
    pub origin: String,
    /// Default username
    pub username: String,
    /// Password used when none is saved in user settings
    pub password: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8000".to_string(),
            username: "Administrator".to_string(),
            password: String::new(),
        }
    }
}

impl fmt::Debug for SiteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteConfig")
            .field("origin", &self.origin)
            .field("username", &self.username)
            .field("password", &if self.password.is_empty() { "" } else { "<redacted>" })
            .finish()
    }
}

/// Local storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding settings, session ids and history
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: "~/.aida/storage".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json)
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Directory for log files
    #[serde(default = "default_log_dir")]
    pub dir: String,
    /// Module-specific overrides
    #[serde(default)]
    pub overrides: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_dir() -> String {
    "~/.aida/logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            dir: default_log_dir(),
            overrides: HashMap::new(),
        }
    }
}
