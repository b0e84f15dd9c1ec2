//! Shared types for platform API calls and demo routes

use serde::{Deserialize, Serialize};

/// Query parameters forwarded to a platform endpoint, in insertion order
pub type Params = Vec<(String, String)>;

/// Build a [`Params`] list from borrowed pairs
pub fn params<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Params {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Look up the first value for `key`
pub fn param<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Access token response from `/api/apps/token`
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Platform error envelope.
///
/// Older endpoints answer `errcode`/`errmsg`, the v2 ones `err_no`/`err_tips`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub errcode: Option<i64>,
    #[serde(default)]
    pub errmsg: Option<String>,
    #[serde(default)]
    pub err_no: Option<i64>,
    #[serde(default)]
    pub err_tips: Option<String>,
}

impl ErrorEnvelope {
    /// Non-zero error code and message, if the body reports a failure
    pub fn failure(&self) -> Option<(i64, String)> {
        if let Some(code) = self.errcode
            && code != 0
        {
            return Some((code, self.errmsg.clone().unwrap_or_default()));
        }
        if let Some(code) = self.err_no
            && code != 0
        {
            return Some((code, self.err_tips.clone().unwrap_or_default()));
        }
        None
    }
}
