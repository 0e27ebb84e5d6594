mod error;
mod jwks;
mod jwt;
mod layer;

pub(crate) use layer::*;

type AuthResult<T> = Result<T, error::AuthError>;

/// Authenticates requests on behalf of a non-gateway (native) provider protocol, such as a
/// passthrough proxy that forwards whatever `Authorization` header the caller sent.
pub(crate) trait NativeProviderAuthentication {
    fn authenticate(&self, parts: &http::request::Parts) -> context::Authentication;
}

impl<F> NativeProviderAuthentication for F
where
    F: Fn(&http::request::Parts) -> context::Authentication,
{
    fn authenticate(&self, parts: &http::request::Parts) -> context::Authentication {
        self(parts)
    }
}

impl NativeProviderAuthentication for () {
    fn authenticate(&self, _parts: &http::request::Parts) -> context::Authentication {
        context::Authentication::default()
    }
}
