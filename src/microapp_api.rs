//! Mini-program open platform API client
//!
//! Handles:
//! - Access token management (cached, refreshed before expiry)
//! - Session exchange, content security, user storage
//! - QR codes, template messages and subscription notifications
//!
//! Responses are returned as raw bytes. The client only looks inside a body
//! to spot platform error codes; it never reshapes what it returns.

use anyhow::Context;
use async_trait::async_trait;
use axum::body::Bytes;
use parking_lot::RwLock;
use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::error::MicroappError;
use crate::types::{ErrorEnvelope, Params, TokenResponse};

// =============================================================================
// API Endpoints
// =============================================================================

const TOKEN_PATH: &str = "/api/apps/token";
const CODE2SESSION_PATH: &str = "/api/apps/jscode2session";
const TEXT_ANTI_DIRTY_PATH: &str = "/api/v2/tags/text/antidirt";
const IMAGE_PATH: &str = "/api/v2/tags/image/";
const SET_USER_STORAGE_PATH: &str = "/api/apps/set_user_storage";
const REMOVE_USER_STORAGE_PATH: &str = "/api/apps/remove_user_storage";
const QRCODE_PATH: &str = "/api/apps/qrcode";
const TEMPLATE_SEND_PATH: &str = "/api/apps/game/template/send";
const SUBSCRIBE_NOTIFY_PATH: &str = "/api/apps/subscribe_notification/developer/v1/notify";

/// Header carrying the access token for content security calls
const TOKEN_HEADER: &str = "X-Token";

/// Used when the token endpoint omits `expires_in`
const DEFAULT_TOKEN_TTL_SECS: u64 = 7200;

// =============================================================================
// Facade
// =============================================================================

/// Operations the demo routes call on the platform.
///
/// Implementations must be safe to share across concurrent requests,
/// including any token refresh they do.
#[async_trait]
pub trait MicroappApi: Send + Sync {
    /// Current access token, fetched or refreshed as needed
    async fn get_access_token(&self) -> Result<String, MicroappError>;

    /// Exchange a login code for a session (`code`, `anonymous_code`)
    async fn code2session(&self, params: Params) -> Result<Bytes, MicroappError>;

    /// Text moderation
    async fn text_anti_dirty(&self, payload: Bytes) -> Result<Bytes, MicroappError>;

    /// Image moderation
    async fn image(&self, payload: Bytes) -> Result<Bytes, MicroappError>;

    /// Write signed key/value pairs to a user's cloud storage
    async fn set_user_storage(&self, payload: Bytes, params: Params)
    -> Result<Bytes, MicroappError>;

    /// Remove keys from a user's cloud storage
    async fn remove_user_storage(
        &self,
        payload: Bytes,
        params: Params,
    ) -> Result<Bytes, MicroappError>;

    /// Generate a mini-program QR code
    async fn create_qr_code(&self, payload: Bytes) -> Result<Bytes, MicroappError>;

    /// Send a template message
    async fn send_template_message(&self, payload: Bytes) -> Result<Bytes, MicroappError>;

    /// Send a subscription notification
    async fn notify_subscription(&self, payload: Bytes) -> Result<Bytes, MicroappError>;
}

// =============================================================================
// Access Token Management
// =============================================================================

/// Cached access token with expiry tracking
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn new(access_token: String, expires_in_secs: u64) -> Self {
        // Refresh 5 minutes before expiry
        let buffer_secs = 300;
        let effective_expiry = expires_in_secs.saturating_sub(buffer_secs);
        Self {
            access_token,
            expires_at: Instant::now() + Duration::from_secs(effective_expiry),
        }
    }

    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

// =============================================================================
// Platform Client
// =============================================================================

/// HTTP client for the mini-program open platform
#[derive(Clone)]
pub struct MicroappClient {
    app_id: String,
    app_secret: String,
    api_base: String,
    http_client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
    /// Held while a token refresh is in flight
    refresh_lock: Arc<Mutex<()>>,
}

impl MicroappClient {
    /// Create a new platform client
    pub fn new(
        app_id: impl Into<String>,
        app_secret: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            app_id: app_id.into(),
            app_secret: app_secret.into(),
            api_base: api_base.into(),
            http_client,
            cached_token: Arc::new(RwLock::new(None)),
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        Self::new(
            config.app_id.clone(),
            config.app_secret.clone(),
            config.api_base.clone(),
            config.http_timeout(),
        )
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn cached(&self) -> Option<String> {
        let guard = self.cached_token.read();
        guard
            .as_ref()
            .filter(|token| token.is_valid())
            .map(|token| token.access_token.clone())
    }

    /// Force refresh the access token
    async fn refresh_token(&self) -> Result<String, MicroappError> {
        debug!("Refreshing platform access token");

        let request = self.http_client.get(self.url(TOKEN_PATH)).query(&[
            ("appid", self.app_id.as_str()),
            ("secret", self.app_secret.as_str()),
            ("grant_type", "client_credential"),
        ]);
        let body = self.execute(TOKEN_PATH, request).await?;

        let token_resp: TokenResponse = serde_json::from_slice(&body).map_err(|e| {
            error!("Failed to parse token response: {}", e);
            MicroappError::MissingToken(String::from_utf8_lossy(&body).into_owned())
        })?;

        let access_token = match token_resp.access_token {
            Some(token) if !token.is_empty() => token,
            _ => {
                return Err(MicroappError::MissingToken(
                    String::from_utf8_lossy(&body).into_owned(),
                ));
            }
        };
        let expires_in = token_resp.expires_in.unwrap_or(DEFAULT_TOKEN_TTL_SECS);

        {
            let mut guard = self.cached_token.write();
            *guard = Some(CachedToken::new(access_token.clone(), expires_in));
        }

        info!(
            "Successfully refreshed platform access token (expires in {}s)",
            expires_in
        );
        Ok(access_token)
    }

    /// Send a request and classify the response
    async fn execute(&self, endpoint: &str, request: RequestBuilder) -> Result<Bytes, MicroappError> {
        let response = request
            .send()
            .await
            .map_err(|source| MicroappError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| MicroappError::Transport {
                endpoint: endpoint.to_string(),
                source,
            })?;

        if !status.is_success() {
            warn!("{} returned HTTP {}", endpoint, status);
            return Err(MicroappError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        // Non-JSON bodies (QR code images) have nothing to inspect
        if let Ok(envelope) = serde_json::from_slice::<ErrorEnvelope>(&body)
            && let Some((code, message)) = envelope.failure()
        {
            warn!("{} error: {} - {}", endpoint, code, message);
            return Err(MicroappError::Api {
                endpoint: endpoint.to_string(),
                code,
                message,
                body,
            });
        }

        debug!("{} returned {} bytes", endpoint, body.len());
        Ok(body)
    }

    /// POST a JSON payload as-is
    async fn post_json(
        &self,
        path: &str,
        payload: Bytes,
        params: Option<&Params>,
        token_header: Option<&str>,
    ) -> Result<Bytes, MicroappError> {
        let mut request = self
            .http_client
            .post(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload);

        if let Some(params) = params {
            request = request.query(params);
        }
        if let Some(token) = token_header {
            request = request.header(TOKEN_HEADER, token);
        }

        self.execute(path, request).await
    }
}

#[async_trait]
impl MicroappApi for MicroappClient {
    async fn get_access_token(&self) -> Result<String, MicroappError> {
        if let Some(token) = self.cached() {
            debug!("Using cached access token");
            return Ok(token);
        }

        // One refresh at a time; latecomers reuse the winner's token
        let _guard = self.refresh_lock.lock().await;
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        self.refresh_token().await
    }

    async fn code2session(&self, mut params: Params) -> Result<Bytes, MicroappError> {
        params.push(("appid".to_string(), self.app_id.clone()));
        params.push(("secret".to_string(), self.app_secret.clone()));

        let request = self
            .http_client
            .get(self.url(CODE2SESSION_PATH))
            .query(&params);
        self.execute(CODE2SESSION_PATH, request).await
    }

    async fn text_anti_dirty(&self, payload: Bytes) -> Result<Bytes, MicroappError> {
        let token = self.get_access_token().await?;
        self.post_json(TEXT_ANTI_DIRTY_PATH, payload, None, Some(&token))
            .await
    }

    async fn image(&self, payload: Bytes) -> Result<Bytes, MicroappError> {
        let token = self.get_access_token().await?;
        self.post_json(IMAGE_PATH, payload, None, Some(&token)).await
    }

    async fn set_user_storage(
        &self,
        payload: Bytes,
        params: Params,
    ) -> Result<Bytes, MicroappError> {
        self.post_json(SET_USER_STORAGE_PATH, payload, Some(&params), None)
            .await
    }

    async fn remove_user_storage(
        &self,
        payload: Bytes,
        params: Params,
    ) -> Result<Bytes, MicroappError> {
        self.post_json(REMOVE_USER_STORAGE_PATH, payload, Some(&params), None)
            .await
    }

    async fn create_qr_code(&self, payload: Bytes) -> Result<Bytes, MicroappError> {
        self.post_json(QRCODE_PATH, payload, None, None).await
    }

    async fn send_template_message(&self, payload: Bytes) -> Result<Bytes, MicroappError> {
        self.post_json(TEMPLATE_SEND_PATH, payload, None, None).await
    }

    async fn notify_subscription(&self, payload: Bytes) -> Result<Bytes, MicroappError> {
        self.post_json(SUBSCRIBE_NOTIFY_PATH, payload, None, None)
            .await
    }
}

// =============================================================================
// Tests
// =============================================================================
