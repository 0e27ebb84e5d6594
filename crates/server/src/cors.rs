//! CORS layer construction from configuration.

use config::{AllowOrigins, CorsConfig};
use http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

/// Builds a [`CorsLayer`] from the gateway's `[server.cors]` configuration.
pub fn new_layer(config: &CorsConfig) -> CorsLayer {
    let mut layer = CorsLayer::new();

    layer = if config.allow_any_origin {
        layer.allow_origin(AllowOrigin::any())
    } else {
        let AllowOrigins::List(origins) = &config.allow_origins;

        let origins: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    log::warn!("Ignoring invalid CORS origin: {origin}");
                    None
                }
            })
            .collect();

        layer.allow_origin(AllowOrigin::list(origins))
    };

    if !config.allow_methods.is_empty() {
        let methods: Vec<Method> = config
            .allow_methods
            .iter()
            .filter_map(|method| match method.parse() {
                Ok(method) => Some(method),
                Err(_) => {
                    log::warn!("Ignoring invalid CORS method: {method}");
                    None
                }
            })
            .collect();

        layer = layer.allow_methods(AllowMethods::list(methods));
    }

    if !config.allow_headers.is_empty() {
        let headers: Vec<HeaderName> = config
            .allow_headers
            .iter()
            .filter_map(|header| match HeaderName::try_from(header) {
                Ok(header) => Some(header),
                Err(_) => {
                    log::warn!("Ignoring invalid CORS header: {header}");
                    None
                }
            })
            .collect();

        layer = layer.allow_headers(AllowHeaders::list(headers));
    }

    if !config.expose_headers.is_empty() {
        let headers: Vec<HeaderName> = config
            .expose_headers
            .iter()
            .filter_map(|header| match HeaderName::try_from(header) {
                Ok(header) => Some(header),
                Err(_) => {
                    log::warn!("Ignoring invalid CORS expose header: {header}");
                    None
                }
            })
            .collect();

        layer = layer.expose_headers(headers);
    }

    layer.allow_credentials(config.allow_credentials).max_age(config.max_age)
}
