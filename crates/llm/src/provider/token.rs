//! Resolves which API key a provider request should use: a caller-forwarded key (BYOK) or the
//! one configured for the provider.

use secrecy::SecretString;

use crate::{error::LlmError, request::RequestContext};

/// Resolve the API key to use for an outbound provider request.
///
/// If `forward_token` is enabled and the caller supplied their own key (via the
/// `X-Provider-API-Key` header), that key is used. Otherwise falls back to the provider's
/// configured key. Fails if neither is available.
pub(crate) fn get(
    forward_token: bool,
    configured_key: &Option<SecretString>,
    context: &RequestContext,
) -> crate::Result<SecretString> {
    if forward_token
        && let Some(forwarded) = context.api_key.as_ref()
    {
        return Ok(forwarded.clone());
    }

    configured_key.clone().ok_or_else(|| {
        LlmError::AuthenticationFailed(
            "No API key configured for this provider and no key was forwarded by the caller".to_string(),
        )
    })
}
