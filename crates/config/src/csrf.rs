use serde::Deserialize;

/// Double-submit CSRF protection for browser-originated requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CsrfConfig {
    /// Whether CSRF protection is enforced.
    pub enabled: bool,

    /// Header clients must echo back for the request to be accepted.
    pub header_name: String,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            header_name: "X-Gateway-CSRF-Protection".to_string(),
        }
    }
}
