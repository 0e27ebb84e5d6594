use std::collections::BTreeMap;

use serde::Deserialize;

pub use context::ClientIdentity;

/// Derives a stable per-caller identity from a validated JWT, for rate limiting and logging.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ClientIdentificationConfig {
    /// Whether client identification is enforced.
    pub enabled: bool,

    /// Extra validation applied to the extracted identity.
    pub validation: ClientIdentificationValidation,

    /// Claim the client id is read from.
    pub client_id: JwtClaim,

    /// Claim the optional group is read from.
    pub group_id: Option<JwtClaim>,
}

/// Restricts which values extracted claims may take.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ClientIdentificationValidation {
    /// Allow-list of accepted values per group name. A group absent from this map is accepted
    /// unconditionally.
    pub group_values: BTreeMap<String, Vec<String>>,
}

/// A single JWT claim to read a value from, supporting dotted paths into nested objects.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JwtClaim {
    /// Path of the claim, e.g. `"sub"` or `"user.id"`.
    pub jwt_claim: String,
}

impl Default for JwtClaim {
    fn default() -> Self {
        Self {
            jwt_claim: "sub".to_string(),
        }
    }
}
