//! JWT bearer-token authentication against an external OAuth 2.0 authorization server.

use std::time::Duration;

use duration_str::deserialize_duration;
use serde::Deserialize;
use url::Url;

fn default_poll_interval() -> Duration {
    Duration::from_secs(300)
}

/// Validates incoming bearer tokens against a JWKS endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OauthConfig {
    /// JWKS endpoint to fetch signing keys from.
    pub url: Url,

    /// How often the JWKS document is re-fetched.
    #[serde(deserialize_with = "deserialize_duration", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Required `iss` claim value. Skipped when unset.
    #[serde(default)]
    pub expected_issuer: Option<String>,

    /// Required `aud` claim value. Skipped when unset.
    #[serde(default)]
    pub expected_audience: Option<String>,

    /// Metadata advertised at `/.well-known/oauth-protected-resource` (RFC 9728).
    #[serde(default)]
    pub protected_resource: ProtectedResourceConfig,
}

/// RFC 9728 protected resource metadata, advertised so clients can discover how to obtain a
/// token for this gateway.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ProtectedResourceConfig {
    /// The resource server's own identifier. Defaults to the gateway's listen address when unset.
    pub resource: Option<Url>,

    /// Authorization servers clients may use to obtain a token for this resource.
    pub authorization_servers: Vec<Url>,

    /// Link to human-readable documentation about this resource, if any.
    pub resource_documentation: Option<Url>,
}

impl ProtectedResourceConfig {
    /// The URL advertised in a `WWW-Authenticate: Bearer resource_metadata="..."` challenge.
    pub fn resource_documentation(&self) -> Url {
        self.resource_documentation
            .clone()
            .or_else(|| self.resource.clone())
            .unwrap_or_else(|| Url::parse("http://localhost/.well-known/oauth-protected-resource").expect("valid URL"))
    }
}
