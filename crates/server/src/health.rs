//! Health check endpoint.
//!
//! Mounted either on the main router or, when `server.health.listen` is set, on its own separate
//! listener so orchestrators can probe liveness without going through the auth/rate-limit stack.

use std::net::SocketAddr;

use axum::{Json, Router, routing::get};
use axum_server::tls_rustls::RustlsConfig;
use config::{HealthConfig, TlsServerConfig};
use serde_json::json;

/// Handler returning a static liveness payload.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Binds and serves the health endpoint on its own listener. Runs for the lifetime of the
/// process; failures are logged rather than propagated since the main server keeps running
/// without it.
pub async fn bind_health_endpoint(listen: SocketAddr, tls: Option<TlsServerConfig>, config: HealthConfig) {
    let router = Router::new().route(&config.path, get(health));

    let listener = match tokio::net::TcpListener::bind(listen).await {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("Failed to bind standalone health endpoint to {listen}: {err}");
            return;
        }
    };

    match tls {
        Some(tls) => {
            let rustls_config = match RustlsConfig::from_pem_file(&tls.certificate, &tls.key).await {
                Ok(config) => config,
                Err(err) => {
                    log::error!("Failed to load TLS certificate for standalone health endpoint: {err}");
                    return;
                }
            };

            let std_listener = match listener.into_std() {
                Ok(listener) => listener,
                Err(err) => {
                    log::error!("Failed to prepare standalone health endpoint listener: {err}");
                    return;
                }
            };

            log::info!("Health endpoint: https://{listen}{}", config.path);

            if let Err(err) = axum_server::from_tcp_rustls(std_listener, rustls_config)
                .serve(router.into_make_service())
                .await
            {
                log::error!("Standalone health endpoint stopped: {err}");
            }
        }
        None => {
            log::info!("Health endpoint: http://{listen}{}", config.path);

            if let Err(err) = axum::serve(listener, router.into_make_service()).await {
                log::error!("Standalone health endpoint stopped: {err}");
            }
        }
    }
}
