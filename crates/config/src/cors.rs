use std::time::Duration;

use duration_str::deserialize_duration;
use serde::Deserialize;

/// CORS policy applied to browser-originated requests.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Origins allowed to read responses. An empty list with `allow_any_origin = false` blocks
    /// all cross-origin requests.
    pub allow_origins: AllowOrigins,

    /// Allow every origin, ignoring `allow_origins`. Cannot be combined with `allow_credentials`.
    pub allow_any_origin: bool,

    /// HTTP methods allowed in a CORS request.
    pub allow_methods: Vec<String>,

    /// Request headers the browser is allowed to send.
    pub allow_headers: Vec<String>,

    /// Response headers exposed to the calling page's JavaScript.
    pub expose_headers: Vec<String>,

    /// Whether credentials (cookies, `Authorization`) may be sent cross-origin.
    pub allow_credentials: bool,

    /// How long browsers may cache a preflight response.
    #[serde(deserialize_with = "deserialize_duration", default)]
    pub max_age: Duration,
}

/// Origins allowed by a CORS policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AllowOrigins {
    /// A fixed list of allowed origins.
    List(Vec<String>),
}

impl Default for AllowOrigins {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}
