//! Payload signing for user storage writes
//!
//! The platform authenticates storage payloads with
//! `hex(HMAC-SHA256(session_key, payload))`, announced as `sig_method=hmac_sha256`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Value sent in the `sig_method` query parameter
pub const SIG_METHOD: &str = "hmac_sha256";

/// Signs request payloads with a per-user session key
pub trait PayloadSigner: Send + Sync {
    /// Lowercase hex signature of `payload` under `session_key`
    fn sign(&self, payload: &[u8], session_key: &[u8]) -> String;
}

/// Default signer: HMAC-SHA256, hex encoded
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSha256Signer;

impl PayloadSigner for HmacSha256Signer {
    fn sign(&self, payload: &[u8], session_key: &[u8]) -> String {
        sign_payload(payload, session_key)
    }
}

/// Compute `hex(HMAC-SHA256(session_key, payload))`.
///
/// HMAC takes keys of any length, empty included.
pub fn sign_payload(payload: &[u8], session_key: &[u8]) -> String {
    // HMAC pads or hashes the key, so no key length is rejected
    let mut mac = <HmacSha256 as Mac>::new_from_slice(session_key)
        .expect("HMAC can take a key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}
