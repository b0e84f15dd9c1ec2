//! Mini-program API demo service
//!
//! An HTTP service with one GET route per platform capability. Each route
//! makes a single platform call and echoes the raw response.
//!
//! # Architecture
//!
//! ```text
//! Client ──GET /microapp/*──▶ Router ──▶ MicroappApi ──HTTPS──▶ Open platform
//!                               │
//!                               └── PayloadSigner (HMAC-SHA256, storage writes)
//! ```
//!
//! # Usage
//!
//! ```bash
//! # Set environment variables (or put them in .env)
//! export APPID=tt1234567890abcdef
//! export SECRET=your_app_secret
//! export LISTEN=0.0.0.0:8080   # optional
//!
//! # Run
//! microapp-demo
//! ```

pub mod config;
pub mod error;
pub mod microapp_api;
pub mod routes;
pub mod server;
pub mod signer;
pub mod types;

pub use config::AppConfig;
pub use error::{MicroappError, ServerError};
pub use microapp_api::{MicroappApi, MicroappClient};
pub use routes::{AppState, build_router};
pub use server::{Lifecycle, LifecycleState};
pub use signer::{HmacSha256Signer, PayloadSigner, sign_payload};
