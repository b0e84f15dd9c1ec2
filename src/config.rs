//! Configuration management

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Mini-program AppID
    pub app_id: String,

    /// Mini-program AppSecret
    pub app_secret: String,

    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Platform API base URL
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Outbound request timeout in seconds
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Graceful shutdown window in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_api_base() -> String {
    "https://developer.toutiao.com".to_string()
}

fn default_http_timeout() -> u64 {
    10
}

fn default_shutdown_timeout() -> u64 {
    5
}

impl AppConfig {
    /// Load configuration from `.env` and environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_id = lookup("APPID").context("APPID is required")?;
        let app_secret = lookup("SECRET").context("SECRET is required")?;

        Ok(Self {
            app_id,
            app_secret,
            listen_addr: lookup("LISTEN")
                .map(|addr| normalize_listen_addr(&addr))
                .unwrap_or_else(default_listen_addr),
            api_base: lookup("MICROAPP_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(default_api_base),
            http_timeout_secs: lookup("HTTP_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_http_timeout),
            shutdown_timeout_secs: lookup("SHUTDOWN_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_shutdown_timeout),
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// `:8080` means every interface
fn normalize_listen_addr(addr: &str) -> String {
    let addr = addr.trim();
    if addr.starts_with(':') {
        format!("0.0.0.0{}", addr)
    } else {
        addr.to_string()
    }
}
