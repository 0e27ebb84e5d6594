//! Gateway server library.
//!
//! Provides a reusable server function to serve Gateway either for the binary, or for the integration tests.

#![deny(missing_docs)]

mod auth;
mod client_id;
mod cors;
mod csrf;
mod embeddings_api;
mod health;
mod logger;
mod metrics;
mod rate_limit;
mod responses_api;
mod tracing;
mod vector_store_api;
mod well_known;

use std::net::SocketAddr;

use ::rate_limit::RateLimitManager;
use anyhow::anyhow;
use auth::AuthLayer;
use axum::{Router, routing::get};
use axum_server::tls_rustls::RustlsConfig;
use client_id::ClientIdentificationLayer;
use config::Config;
use context::Authentication;
use rate_limit::RateLimitLayer;
use std::sync::Arc;
use telemetry::TelemetryGuard;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::{csrf::CsrfLayer, tracing::TracingLayer};
use crate::{embeddings_api::EmbeddingsState, responses_api::ResponsesState, vector_store_api::VectorStoreState};

/// Configuration for serving Gateway.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized Gateway TOML configuration.
    pub config: Config,
    /// Cancellation token for graceful shutdown
    pub shutdown_signal: CancellationToken,
    /// Log filter string (e.g., "info" or "server=debug,mcp=debug")
    pub log_filter: String,
    /// The version string to log on startup
    pub version: String,
    /// Optional oneshot sender to send back the bound address (useful if port 0 was specified)
    pub bound_addr_sender: Option<tokio::sync::oneshot::Sender<SocketAddr>>,
}

/// Starts and runs the Gateway server with the provided configuration.
pub async fn serve(
    ServeConfig {
        listen_address,
        config,
        shutdown_signal,
        log_filter,
        version,
        bound_addr_sender,
    }: ServeConfig,
) -> anyhow::Result<()> {
    let _telemetry_guard = init_otel(&config, log_filter).await;

    // Log the version as the first message after logger initialization
    log::info!("Gateway {version}");
    let mut app = Router::new();

    let rate_limit_manager = if config.server.rate_limits.enabled {
        log::debug!("Initializing rate limit manager with configured limits");
        let manager =
            RateLimitManager::new(config.server.rate_limits.clone(), config.mcp.clone(), &config.telemetry).await?;

        Some(Arc::new(manager))
    } else {
        log::debug!("Rate limiting disabled - no manager created");
        None
    };

    let cors = if let Some(cors_config) = &config.server.cors {
        cors::new_layer(cors_config)
    } else {
        CorsLayer::permissive()
    };
    let csrf = CsrfLayer::new(&config.server.csrf);

    let layers_before_auth = {
        tower::ServiceBuilder::new()
            .layer(cors.clone())
            .layer(csrf.clone())
            .layer(metrics::MetricsLayer::new())
    };

    let gateway_only_auth_layer = AuthLayer::new(config.server.oauth.clone());

    let layers_after_auth = {
        let client_identification = ClientIdentificationLayer::new(config.server.client_identification.clone());
        let rate_limit = RateLimitLayer::new(config.server.client_ip.clone(), rate_limit_manager.clone());

        tower::ServiceBuilder::new()
            .layer(client_identification)
            .layer(TracingLayer::with_config(Arc::new(config.telemetry.clone())))
            .layer(rate_limit)
    };

    // Track which endpoints actually get initialized
    let mut llm_actually_exposed = false;

    // The gateway's MCP integration is downstream-only (it calls out to MCP servers as a
    // client on behalf of tool execution); it does not host its own MCP server endpoint, so
    // there's nothing to mount here even when `config.mcp` names servers.

    // Only expose LLM endpoint if enabled AND has configured providers
    if config.llm.enabled() && config.llm.has_providers() {
        let server = llm::build_server(&config).await.map_err(|err| {
            log::error!("Failed to initialize LLM router: {err:?}");
            anyhow!("Failed to initialize LLM router: {err}")
        })?;

        if config.llm.protocols.openai.enabled {
            app = app.nest(
                &config.llm.protocols.openai.path,
                llm::openai_endpoint_router().with_state(server.clone()).layer(
                    tower::ServiceBuilder::new()
                        .layer(layers_before_auth.clone())
                        .layer(gateway_only_auth_layer.clone())
                        .layer(layers_after_auth.clone()),
                ),
            );
            llm_actually_exposed = true;
        }

        if config.llm.protocols.anthropic.enabled {
            app = app.nest(
                &config.llm.protocols.anthropic.path,
                llm::anthropic_endpoint_router().with_state(server.clone()).layer(
                    tower::ServiceBuilder::new()
                        .layer(layers_before_auth.clone())
                        .layer(AuthLayer::new_with_native_provider(
                            config.server.oauth.clone(),
                            |parts: &http::request::Parts| Authentication {
                                has_anthropic_authorization: parts.headers.contains_key(http::header::AUTHORIZATION),
                                ..Default::default()
                            },
                        ))
                        .layer(layers_after_auth.clone()),
                ),
            );
            llm_actually_exposed = true;
        }
    } else {
        log::debug!("LLM is enabled but no providers are configured - LLM endpoint will not be exposed");
    }

    let mut responses_actually_exposed = false;
    let mut vector_store_actually_exposed = false;

    // The vector store service backs both `/v1/vector_stores*`/`/v1/files*` directly and the
    // `file_search`/`agentic_search` tools the responses orchestrator dispatches, so it's built
    // once up front regardless of which route groups end up mounted.
    let embedding_client: Arc<dyn search::EmbeddingClient> = match &config.vector_store.embedding {
        config::EmbeddingConfig::Hash { dimensions } => Arc::new(search::HashEmbeddingClient::new(*dimensions)),
    };

    let vector_store_service = match &config.vector_store.storage {
        config::VectorStoreBackend::Memory => vector_store::VectorStoreService::new(embedding_client.clone())
            .map_err(|err| anyhow!("Failed to initialize vector store service: {err}"))?,
        config::VectorStoreBackend::Persistent { directory } => {
            vector_store::VectorStoreService::with_persistence(embedding_client.clone(), directory.clone())
                .await
                .map_err(|err| anyhow!("Failed to initialize persistent vector store service: {err}"))?
        }
    };
    let _expiration_sweeper = vector_store_service.spawn_expiration_sweeper(std::time::Duration::from_secs(60));

    if config.responses.enabled {
        let completion_client = Arc::new(
            llm::client::CompletionClient::new(&config)
                .await
                .map_err(|err| anyhow!("Failed to initialize completion client for the responses endpoint: {err}"))?,
        );

        let orchestrator = Arc::new(
            responses::ResponseOrchestrator::new(completion_client.clone()).with_config(responses::OrchestratorConfig {
                max_turns: config.responses.max_turns,
                request_timeout: config.responses.request_timeout,
                tool_timeout: config.responses.tool_timeout,
            }),
        );

        let search_backend: Arc<dyn tools::FileSearchBackend> = Arc::new(vector_store_service.clone());
        let responses_state = Arc::new(ResponsesState::new(orchestrator, completion_client, Some(search_backend)));

        app = app.nest(
            &config.responses.path,
            responses_api::router().with_state(responses_state).layer(
                tower::ServiceBuilder::new()
                    .layer(layers_before_auth.clone())
                    .layer(gateway_only_auth_layer.clone())
                    .layer(layers_after_auth.clone()),
            ),
        );
        responses_actually_exposed = true;
    }

    if config.vector_store.enabled {
        let files: Arc<dyn vector_store::FileStore> = vector_store::InMemoryFileStore::new();
        let vector_store_state = Arc::new(VectorStoreState::new(vector_store_service.clone(), files));

        app = app.nest(
            "/v1/vector_stores",
            vector_store_api::vector_stores_router().with_state(vector_store_state.clone()).layer(
                tower::ServiceBuilder::new()
                    .layer(layers_before_auth.clone())
                    .layer(gateway_only_auth_layer.clone())
                    .layer(layers_after_auth.clone()),
            ),
        );
        app = app.nest(
            "/v1/files",
            vector_store_api::files_router().with_state(vector_store_state).layer(
                tower::ServiceBuilder::new()
                    .layer(layers_before_auth.clone())
                    .layer(gateway_only_auth_layer.clone())
                    .layer(layers_after_auth.clone()),
            ),
        );

        let embeddings_state = Arc::new(EmbeddingsState::new(embedding_client, "hash-embedding".to_string()));
        app = app.nest(
            "/v1/embeddings",
            embeddings_api::router().with_state(embeddings_state).layer(
                tower::ServiceBuilder::new()
                    .layer(layers_before_auth.clone())
                    .layer(gateway_only_auth_layer.clone())
                    .layer(layers_after_auth.clone()),
            ),
        );
        vector_store_actually_exposed = true;
    }

    // Apply OAuth authentication to protected routes
    // This runs BEFORE client identification (due to layer ordering) so JWT is available
    if let Some(config) = &config.server.oauth {
        // Add OAuth metadata endpoint (this should be public, not protected)
        let response = well_known::oauth_metadata(config);
        app = app.route(
            "/.well-known/oauth-protected-resource",
            get(async move || response.clone()),
        );
    }

    // Add health endpoint (unprotected - added AFTER rate limiting)
    if config.server.health.enabled {
        if let Some(listen) = config.server.health.listen {
            tokio::spawn(health::bind_health_endpoint(
                listen,
                config.server.tls.clone(),
                config.server.health.clone(),
            ));
        } else {
            let health_router = Router::new()
                .route(&config.server.health.path, get(health::health))
                // We shouldn't have one IMHO, but all the tests rely on this right now...
                .layer(csrf)
                .layer(cors);

            app = app.merge(health_router);
        }
    }

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    if let Some(sender) = bound_addr_sender {
        sender
            .send(listener.local_addr()?)
            .expect("Failed to send back bound address.");
    }

    // Check what endpoints are actually exposed
    if !llm_actually_exposed && !responses_actually_exposed && !vector_store_actually_exposed {
        log::warn!("Server starting with no functional endpoints. Configure LLM providers to enable functionality.");
    }

    match &config.server.tls {
        Some(tls_config) => {
            let rustls_config = RustlsConfig::from_pem_file(&tls_config.certificate, &tls_config.key)
                .await
                .map_err(|e| anyhow!("Failed to load TLS certificate and key: {e}"))?;

            if llm_actually_exposed {
                if config.llm.protocols.openai.enabled {
                    log::info!(
                        "OpenAI LLM endpoint: https://{listen_address}{}",
                        config.llm.protocols.openai.path
                    );
                }
                if config.llm.protocols.anthropic.enabled {
                    log::info!(
                        "Anthropic LLM endpoint: https://{listen_address}{}",
                        config.llm.protocols.anthropic.path
                    );
                }
            }
            if responses_actually_exposed {
                log::info!("Responses endpoint: https://{listen_address}{}", config.responses.path);
            }
            if vector_store_actually_exposed {
                log::info!("Vector store endpoints: https://{listen_address}/v1/vector_stores, /v1/files, /v1/embeddings");
            }

            let server = axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)
                .serve(app.into_make_service_with_connect_info::<SocketAddr>());

            // Run with graceful shutdown
            tokio::select! {
                result = server => {
                    result.map_err(|e| anyhow!("Failed to start HTTPS server: {e}"))?;
                }
                _ = shutdown_signal.cancelled() => {
                    log::info!("Received shutdown signal, shutting down gracefully...");
                    // The TelemetryGuard will be dropped when this function returns
                }
            }
        }
        None => {
            if llm_actually_exposed {
                if config.llm.protocols.openai.enabled {
                    log::info!(
                        "OpenAI LLM endpoint: http://{listen_address}{}",
                        config.llm.protocols.openai.path
                    );
                }
                if config.llm.protocols.anthropic.enabled {
                    log::info!(
                        "Anthropic LLM endpoint: http://{listen_address}{}",
                        config.llm.protocols.anthropic.path
                    );
                }
            }
            if responses_actually_exposed {
                log::info!("Responses endpoint: http://{listen_address}{}", config.responses.path);
            }
            if vector_store_actually_exposed {
                log::info!("Vector store endpoints: http://{listen_address}/v1/vector_stores, /v1/files, /v1/embeddings");
            }

            // Run with graceful shutdown
            tokio::select! {
                result = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()) => {
                    result.map_err(|e| anyhow!("Failed to start HTTP server: {}", e))?;
                }
                _ = shutdown_signal.cancelled() => {
                    log::info!("Received shutdown signal, shutting down gracefully...");
                    // The TelemetryGuard will be dropped when this function returns
                }
            }
        }
    }

    Ok(())
}

async fn init_otel(config: &Config, log_filter: String) -> Option<TelemetryGuard> {
    // Don't let telemetry code log during initialization to avoid recursion
    match telemetry::init(&config.telemetry).await {
        Ok(guard) => {
            // Initialize logger with OTEL appender if logs are enabled
            let otel_appender = guard.logs_appender().cloned();
            logger::init(&log_filter, otel_appender);

            Some(guard)
        }
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {e}");
            // Initialize logger without OTEL
            logger::init(&log_filter, None);

            None
        }
    }
}
