//! Demo HTTP routes
//!
//! Each route makes one platform call and writes the raw response body back.
//! Platform errors are logged, never mapped to a status code: whatever bytes
//! came back (possibly none) are written with the default 200.

use axum::{
    Router,
    body::{Body, Bytes},
    extract::{Query, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::error::MicroappError;
use crate::microapp_api::MicroappApi;
use crate::signer::{PayloadSigner, SIG_METHOD};
use crate::types::{Params, param, params};

/// Storage payloads are signed with an empty session key
const SESSION_KEY: &[u8] = b"";

/// Placeholder login code for the session exchange demo
const DEMO_LOGIN_CODE: &str = "CODE";

/// Router state, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn MicroappApi>,
    pub signer: Arc<dyn PayloadSigner>,
}

impl AppState {
    pub fn new(api: Arc<dyn MicroappApi>, signer: Arc<dyn PayloadSigner>) -> Self {
        Self { api, signer }
    }
}

/// Build the demo router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/microapp/code2session", get(code2session))
        .route("/microapp/content_security", get(content_security))
        .route("/microapp/data_caching", get(data_caching))
        .route("/microapp/remove_user_storage", get(remove_user_storage))
        .route("/microapp/qrcode", get(qrcode))
        .route("/microapp/template_message", get(template_message))
        .route("/microapp/subscribe_notification", get(subscribe_notification))
        .route("/health", get(health_check))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

/// Middleware to log all incoming HTTP requests
async fn log_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let query = uri.query().map(|q| format!("?{}", q)).unwrap_or_default();

    info!("🌐 HTTP {} {}{}", method, uri.path(), query);

    let response = next.run(req).await;

    info!("📤 Response status: {}", response.status());

    response
}

// =============================================================================
// Helpers
// =============================================================================

/// Log a platform result and return the bytes to write, error or not
fn pass_through(call: &str, result: Result<Bytes, MicroappError>) -> Bytes {
    match result {
        Ok(body) => {
            debug!("{} -> {}", call, String::from_utf8_lossy(&body));
            body
        }
        Err(e) => {
            error!("{} failed: {}", call, e);
            let body = e.into_body();
            debug!("{} -> {}", call, String::from_utf8_lossy(&body));
            body
        }
    }
}

/// First `openid` in the query string; repeats are ignored, absence is ""
fn openid(query: &Params) -> &str {
    param(query, "openid").unwrap_or_default()
}

/// Fetch an access token, logging the failure
async fn access_token(state: &AppState) -> Option<String> {
    match state.api.get_access_token().await {
        Ok(token) => Some(token),
        Err(e) => {
            error!("Failed to get access token: {}", e);
            None
        }
    }
}

// =============================================================================
// Demo Payloads
// =============================================================================

fn text_moderation_payload() -> Bytes {
    Bytes::from(
        json!({
            "tasks": [
                { "content": "要检测的文本/赌博/涩情" }
            ]
        })
        .to_string(),
    )
}

fn image_moderation_payload() -> Bytes {
    Bytes::from(
        json!({
            "targets": ["ad", "porn", "politics", "disgusting"],
            "tasks": [
                {
                    "image": "https://s3.pstatp.com/toutiao/resource/developer_ssr/img/user-arrive-1@3x.86a3dc7.png"
                }
            ]
        })
        .to_string(),
    )
}

fn set_storage_payload() -> Bytes {
    Bytes::from(
        json!({
            "kv_list": [
                { "key": "test", "value": "{\"ttgame\":{\"score\":1}}" }
            ]
        })
        .to_string(),
    )
}

fn remove_storage_payload() -> Bytes {
    Bytes::from(json!({ "key": ["test"] }).to_string())
}

fn qrcode_payload(access_token: &str) -> Bytes {
    Bytes::from(json!({ "access_token": access_token }).to_string())
}

fn template_message_payload(access_token: &str) -> Bytes {
    Bytes::from(
        json!({
            "access_token": access_token,
            "app_id": "YOUR_APP_ID",
            "data": {
                "keyword1": { "value": "v1" },
                "keyword2": { "value": "v2" }
            },
            "page": "pages/index",
            "form_id": "YOUR_FORM_ID",
            "touser": "USER_OPEN_ID",
            "template_id": "YOUR_TPL_ID"
        })
        .to_string(),
    )
}

fn subscribe_notification_payload(access_token: &str) -> Bytes {
    Bytes::from(
        json!({
            "access_token": access_token,
            "app_id": "31198cf00b********",
            "tpl_id": "MSG38489d04608c5f0fdeb565fc5114afff6410*******",
            "open_id": "36d4bd3c8****",
            "data": {
                "版本号": "v1.0",
                "版本描述": "新版本发布了"
            },
            "page": "pages/index?a=b"
        })
        .to_string(),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Exchange the placeholder login code for a session
async fn code2session(State(state): State<AppState>) -> Bytes {
    let result = state
        .api
        .code2session(params([("code", DEMO_LOGIN_CODE)]))
        .await;
    pass_through("code2session", result)
}

/// Moderate sample text, then a sample image; both bodies are written in order
async fn content_security(State(state): State<AppState>) -> Bytes {
    let text = pass_through(
        "text_anti_dirty",
        state.api.text_anti_dirty(text_moderation_payload()).await,
    );
    let image = pass_through(
        "image",
        state.api.image(image_moderation_payload()).await,
    );

    let mut body = Vec::with_capacity(text.len() + image.len());
    body.extend_from_slice(&text);
    body.extend_from_slice(&image);
    Bytes::from(body)
}

/// Write a signed key/value pair to the user's storage
async fn data_caching(
    State(state): State<AppState>,
    Query(query): Query<Params>,
) -> Bytes {
    let payload = set_storage_payload();
    let signature = state.signer.sign(&payload, SESSION_KEY);

    let Some(token) = access_token(&state).await else {
        return Bytes::new();
    };

    let request_params = params([
        ("access_token", token.as_str()),
        ("openid", openid(&query)),
        ("signature", signature.as_str()),
        ("sig_method", SIG_METHOD),
    ]);
    let result = state.api.set_user_storage(payload, request_params).await;
    pass_through("set_user_storage", result)
}

/// Remove the demo key from the user's storage
async fn remove_user_storage(
    State(state): State<AppState>,
    Query(query): Query<Params>,
) -> Bytes {
    let payload = remove_storage_payload();
    let signature = state.signer.sign(&payload, SESSION_KEY);

    let Some(token) = access_token(&state).await else {
        return Bytes::new();
    };

    let request_params = params([
        ("access_token", token.as_str()),
        ("openid", openid(&query)),
        ("signature", signature.as_str()),
        ("sig_method", SIG_METHOD),
    ]);
    let result = state.api.remove_user_storage(payload, request_params).await;
    pass_through("remove_user_storage", result)
}

async fn qrcode(State(state): State<AppState>) -> Bytes {
    let Some(token) = access_token(&state).await else {
        return Bytes::new();
    };

    let payload = qrcode_payload(&token);
    debug!("qrcode payload: {}", String::from_utf8_lossy(&payload));
    pass_through("create_qr_code", state.api.create_qr_code(payload).await)
}

async fn template_message(State(state): State<AppState>) -> Bytes {
    let Some(token) = access_token(&state).await else {
        return Bytes::new();
    };

    let payload = template_message_payload(&token);
    debug!("template message payload: {}", String::from_utf8_lossy(&payload));
    pass_through(
        "send_template_message",
        state.api.send_template_message(payload).await,
    )
}

async fn subscribe_notification(State(state): State<AppState>) -> Bytes {
    let Some(token) = access_token(&state).await else {
        return Bytes::new();
    };

    let payload = subscribe_notification_payload(&token);
    debug!(
        "subscribe notification payload: {}",
        String::from_utf8_lossy(&payload)
    );
    pass_through(
        "notify_subscription",
        state.api.notify_subscription(payload).await,
    )
}
