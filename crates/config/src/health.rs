use std::net::SocketAddr;

use serde::Deserialize;

/// The unauthenticated liveness/readiness endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    /// Whether the health endpoint is exposed at all.
    pub enabled: bool,

    /// Bind a separate listener for health checks instead of serving them on the main listener.
    pub listen: Option<SocketAddr>,

    /// Path the health endpoint is served under on the main listener.
    pub path: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: None,
            path: "/health".to_string(),
        }
    }
}
