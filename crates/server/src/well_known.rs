//! RFC 9728 OAuth 2.0 Protected Resource Metadata.

use axum::Json;
use config::OauthConfig;
use serde_json::{Value, json};

/// Builds the `/.well-known/oauth-protected-resource` response body advertised so OAuth clients
/// can discover how to obtain a token for this gateway.
pub fn oauth_metadata(config: &OauthConfig) -> Json<Value> {
    let resource = config
        .protected_resource
        .resource
        .clone()
        .unwrap_or_else(|| config.protected_resource.resource_documentation());

    Json(json!({
        "resource": resource.to_string(),
        "authorization_servers": config
            .protected_resource
            .authorization_servers
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>(),
        "bearer_methods_supported": ["header"],
        "resource_documentation": config.protected_resource.resource_documentation().to_string(),
    }))
}
