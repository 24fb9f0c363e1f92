//! HTTP client for the AIDA API server

use aida_core::bridge::{
    ChatReply, ChatTurn, ConnectionReport, RemoteBridge, SessionRequest, SessionStatus,
    WidgetSettings,
};
use aida_core::config::Config;
use aida_core::session::SessionId;
use aida_core::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const MISSING_PASSWORD: &str =
    "Password is required for session initialization. Please configure your credentials in the widget settings.";
const NO_RESPONSE: &str = "No response received";

#[derive(Serialize)]
struct InitSessionRequest<'a> {
    erpnext_url: &'a str,
    username: &'a str,
    password: &'a str,
    site_base_url: &'a str,
    restore_session: bool,
    user_hash: &'a str,
}

#[derive(Debug, Deserialize)]
struct InitSessionResponse {
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    restored: bool,
}

#[derive(Serialize)]
struct ErpCredentials<'a> {
    url: &'a str,
    username: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    user_input: &'a str,
    session_id: &'a str,
    user_hash: &'a str,
    erp_credentials: ErpCredentials<'a>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    error: bool,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// [`RemoteBridge`] backed by the AIDA REST API
pub struct HttpBridge {
    client: Client,
    base_url: String,
    request_timeout: Duration,
    status_timeout: Duration,
    widget_settings: WidgetSettings,
}

impl HttpBridge {
    /// Create a bridge for `base_url` with default timeouts and widget settings
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        let widget_settings = WidgetSettings {
            api_server_url: base_url.clone(),
            ..Default::default()
        };
        Self {
            client: Client::builder()
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url,
            request_timeout: Duration::from_secs(30),
            status_timeout: Duration::from_secs(10),
            widget_settings,
        }
    }

    /// Create a bridge from the `backend` and `widget` config sections
    pub fn from_config(config: &Config) -> Self {
        let mut bridge = Self::new(config.backend.api_server_url.clone());
        bridge.request_timeout = Duration::from_secs(config.backend.request_timeout_secs);
        bridge.status_timeout = Duration::from_secs(config.backend.status_timeout_secs);
        bridge.widget_settings = config.widget_settings();
        bridge
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(base: &str, path: &str) -> String {
        format!("{}/{}", base.trim_end_matches('/'), path)
    }
}

/// Connection failures and timeouts are network errors; anything else that
/// went wrong after reaching the server is an API error.
fn transport_error(e: reqwest::Error) -> Error {
    if e.is_connect() || e.is_timeout() {
        Error::Network(e.to_string())
    } else {
        Error::Api(e.to_string())
    }
}

async fn status_error(response: Response) -> Error {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    let message = format!("HTTP {}: {}", status, error_text);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Error::Auth(message),
        _ => Error::Api(message),
    }
}

#[async_trait]
impl RemoteBridge for HttpBridge {
    async fn init_session(&self, request: &SessionRequest) -> Result<SessionId> {
        let creds = &request.credentials;
        if creds.password.is_empty() {
            return Err(Error::Auth(MISSING_PASSWORD.to_string()));
        }

        let body = InitSessionRequest {
            erpnext_url: &creds.site_url,
            username: &creds.username,
            password: &creds.password,
            site_base_url: &creds.site_url,
            restore_session: true,
            user_hash: request.identity.as_str(),
        };

        let url = Self::endpoint(&self.base_url, "init_session");
        debug!("Initializing session at {} for {}", url, creds.username);

        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            let err = status_error(response).await;
            warn!("Session initialization failed: {}", err);
            return Err(err);
        }

        let data: InitSessionResponse = response.json().await.map_err(transport_error)?;
        match data.session_id.filter(|id| !id.is_empty()) {
            Some(id) => {
                debug!("Session initialized (restored: {})", data.restored);
                Ok(SessionId::new(id))
            }
            None => Err(Error::Api(
                "init_session response did not include a session_id".to_string(),
            )),
        }
    }

    async fn session_status(&self, session_id: &SessionId) -> Result<SessionStatus> {
        let url = Self::endpoint(
            &self.base_url,
            &format!("session_status/{}", session_id.as_str()),
        );

        let response = self
            .client
            .get(&url)
            .timeout(self.status_timeout)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            debug!(
                "Session status check returned {} for {}",
                response.status(),
                session_id.preview()
            );
            return Ok(SessionStatus::default());
        }

        response.json().await.map_err(transport_error)
    }

    async fn chat(&self, turn: &ChatTurn) -> Result<ChatReply> {
        let body = ChatRequest {
            user_input: &turn.message,
            session_id: turn.session_id.as_str(),
            user_hash: turn.identity.as_str(),
            erp_credentials: ErpCredentials {
                url: &turn.credentials.site_url,
                username: &turn.credentials.username,
                password: &turn.credentials.password,
            },
        };

        let url = Self::endpoint(&self.base_url, "chat");
        debug!("Sending chat message for session {}", turn.session_id.preview());

        let response = self
            .client
            .post(&url)
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let data: ChatResponse = response.json().await.map_err(transport_error)?;
        if data.error {
            return Err(Error::Api(
                data.message
                    .unwrap_or_else(|| "AIDA API returned an error".to_string()),
            ));
        }

        Ok(ChatReply {
            text: data
                .response
                .or(data.message)
                .unwrap_or_else(|| NO_RESPONSE.to_string()),
            session_id: data
                .session_id
                .filter(|id| !id.is_empty())
                .map(SessionId::new),
        })
    }

    async fn test_connection(&self, backend_url: Option<&str>) -> Result<ConnectionReport> {
        let base = backend_url.unwrap_or(self.base_url.as_str());
        let url = Self::endpoint(base, "health");

        let response = match self
            .client
            .get(&url)
            .timeout(self.status_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                return Ok(ConnectionReport::failure(
                    "Could not connect to AIDA API server. Please check if the server is running and the URL is correct.",
                ))
            }
            Err(e) if e.is_timeout() => {
                return Ok(ConnectionReport::failure(
                    "Connection timed out. Please check the server URL and network connectivity.",
                ))
            }
            Err(e) => {
                return Ok(ConnectionReport::failure(format!(
                    "Connection test failed: {}",
                    e
                )))
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Ok(ConnectionReport::failure(format!(
                "Server returned status code: {}",
                status.as_u16()
            )));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Ok(ConnectionReport::failure(format!(
                    "Connection test failed: {}",
                    e
                )))
            }
        };

        Ok(match serde_json::from_str::<HealthResponse>(&body) {
            Ok(health) => ConnectionReport {
                success: true,
                message: "Connection successful".to_string(),
                server_status: Some(health.status.unwrap_or_else(|| "unknown".to_string())),
                server_time: Some(health.timestamp.unwrap_or_else(|| "unknown".to_string())),
            },
            Err(_) => ConnectionReport::success("Connection successful (non-JSON response)"),
        })
    }

    async fn widget_settings(&self) -> Result<WidgetSettings> {
        Ok(self.widget_settings.clone())
    }
}
