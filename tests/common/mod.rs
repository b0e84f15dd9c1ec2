//! Shared test helpers: a recording stub for the platform API

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::Request;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use microapp_demo::types::{Params, param};
use microapp_demo::{AppState, MicroappApi, MicroappError, PayloadSigner, build_router};

/// One recorded facade call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub op: &'static str,
    pub payload: Bytes,
    pub params: Params,
}

impl RecordedCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        param(&self.params, key)
    }
}

/// Platform stub: answers `<op>-response` unless told otherwise
pub struct StubApi {
    token: Option<String>,
    responses: HashMap<&'static str, Bytes>,
    failing: HashMap<&'static str, Bytes>,
    delay: Duration,
    calls: Mutex<Vec<RecordedCall>>,
    token_calls: Mutex<usize>,
}

impl StubApi {
    pub fn new() -> Self {
        Self {
            token: Some("T1".to_string()),
            responses: HashMap::new(),
            failing: HashMap::new(),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            token_calls: Mutex::new(0),
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn without_token(mut self) -> Self {
        self.token = None;
        self
    }

    pub fn with_response(mut self, op: &'static str, body: &'static [u8]) -> Self {
        self.responses.insert(op, Bytes::from_static(body));
        self
    }

    /// Make `op` fail with a platform error carrying `body`
    pub fn failing(mut self, op: &'static str, body: &'static [u8]) -> Self {
        self.failing.insert(op, Bytes::from_static(body));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.op == op).count()
    }

    pub fn last_call(&self, op: &str) -> Option<RecordedCall> {
        self.calls.lock().iter().rev().find(|c| c.op == op).cloned()
    }

    pub fn token_calls(&self) -> usize {
        *self.token_calls.lock()
    }

    async fn respond(
        &self,
        op: &'static str,
        payload: Bytes,
        params: Params,
    ) -> Result<Bytes, MicroappError> {
        self.calls.lock().push(RecordedCall {
            op,
            payload,
            params,
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(body) = self.failing.get(op) {
            return Err(MicroappError::Api {
                endpoint: op.to_string(),
                code: 40001,
                message: "stub failure".to_string(),
                body: body.clone(),
            });
        }

        Ok(self
            .responses
            .get(op)
            .cloned()
            .unwrap_or_else(|| Bytes::from(format!("{op}-response"))))
    }
}

#[async_trait]
impl MicroappApi for StubApi {
    async fn get_access_token(&self) -> Result<String, MicroappError> {
        *self.token_calls.lock() += 1;
        self.token
            .clone()
            .ok_or_else(|| MicroappError::MissingToken("stub has no token".to_string()))
    }

    async fn code2session(&self, params: Params) -> Result<Bytes, MicroappError> {
        self.respond("code2session", Bytes::new(), params).await
    }

    async fn text_anti_dirty(&self, payload: Bytes) -> Result<Bytes, MicroappError> {
        self.respond("text_anti_dirty", payload, Vec::new()).await
    }

    async fn image(&self, payload: Bytes) -> Result<Bytes, MicroappError> {
        self.respond("image", payload, Vec::new()).await
    }

    async fn set_user_storage(
        &self,
        payload: Bytes,
        params: Params,
    ) -> Result<Bytes, MicroappError> {
        self.respond("set_user_storage", payload, params).await
    }

    async fn remove_user_storage(
        &self,
        payload: Bytes,
        params: Params,
    ) -> Result<Bytes, MicroappError> {
        self.respond("remove_user_storage", payload, params).await
    }

    async fn create_qr_code(&self, payload: Bytes) -> Result<Bytes, MicroappError> {
        self.respond("create_qr_code", payload, Vec::new()).await
    }

    async fn send_template_message(&self, payload: Bytes) -> Result<Bytes, MicroappError> {
        self.respond("send_template_message", payload, Vec::new())
            .await
    }

    async fn notify_subscription(&self, payload: Bytes) -> Result<Bytes, MicroappError> {
        self.respond("notify_subscription", payload, Vec::new())
            .await
    }
}

/// Signer returning a fixed signature and remembering the key it saw
pub struct FixedSigner {
    pub signature: &'static str,
    pub keys: Mutex<Vec<Vec<u8>>>,
}

impl FixedSigner {
    pub fn new(signature: &'static str) -> Self {
        Self {
            signature,
            keys: Mutex::new(Vec::new()),
        }
    }
}

impl PayloadSigner for FixedSigner {
    fn sign(&self, _payload: &[u8], session_key: &[u8]) -> String {
        self.keys.lock().push(session_key.to_vec());
        self.signature.to_string()
    }
}

/// Router wired to the given stub and signer
pub fn router_with(api: Arc<StubApi>, signer: Arc<dyn PayloadSigner>) -> axum::Router {
    build_router(AppState::new(api, signer))
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(body: Body) -> Bytes {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body")
}
