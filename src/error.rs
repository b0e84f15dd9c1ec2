//! Error types for platform API calls and the server lifecycle

use axum::body::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by the mini-program platform client.
///
/// Every variant keeps whatever bytes the platform sent back, so callers
/// that forward responses verbatim can still write them out.
#[derive(Debug, Error)]
pub enum MicroappError {
    /// The request never produced a response (connect, timeout, TLS...)
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx HTTP status
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        endpoint: String,
        status: u16,
        body: Bytes,
    },

    /// 2xx response whose JSON body carries a non-zero error code
    #[error("{endpoint} returned error {code}: {message}")]
    Api {
        endpoint: String,
        code: i64,
        message: String,
        body: Bytes,
    },

    /// Token endpoint answered without an access token
    #[error("no access token in response: {0}")]
    MissingToken(String),
}

impl MicroappError {
    /// Raw response bytes seen before the failure (empty when there were none)
    pub fn into_body(self) -> Bytes {
        match self {
            Self::Status { body, .. } | Self::Api { body, .. } => body,
            Self::Transport { .. } | Self::MissingToken(_) => Bytes::new(),
        }
    }
}

/// Fatal lifecycle failures
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("HTTP server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("graceful shutdown did not finish within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
