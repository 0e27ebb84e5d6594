use std::{convert::Infallible, sync::Arc};

use axum::{
    Router,
    extract::{Extension, Json, State},
    http::HeaderMap,
    response::{IntoResponse, Sse, sse::Event},
    routing::{get, post},
};
use axum_serde::Sonic;
use fastrace::collector::SpanContext;
use futures::StreamExt;
use messages::openai;

pub mod client;
mod error;
mod http_client;
mod messages;
pub mod provider;
mod request;
mod server;
pub mod token_counter;

pub use error::{LlmError, LlmResult as Result};
pub use request::RequestContext;
pub use server::LlmHandler;
use server::LlmServerBuilder;

use crate::messages::unified;

/// Builds the shared LLM handler (provider routing, rate limiting, telemetry) from config.
///
/// Returned unnested and un-state-attached so the caller can mount it under whichever
/// protocol paths are enabled and wrap it in its own auth/rate-limit layers.
pub async fn build_server(config: &config::Config) -> anyhow::Result<Arc<LlmHandler>> {
    let server = LlmServerBuilder::new(config)
        .build()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize LLM server: {e}"))?;

    Ok(Arc::new(server))
}

/// OpenAI-compatible `/v1/chat/completions` and `/v1/models` routes.
pub fn openai_endpoint_router() -> Router<Arc<LlmHandler>> {
    Router::new()
        .route("/chat/completions", post(chat_completions))
        .route("/models", get(list_models))
}

/// Native Anthropic-shaped protocol endpoint.
///
/// Disabled by default (`config.llm.protocols.anthropic.enabled == false`); no wire-format
/// translation for it exists yet, so this mounts no routes. A request reaching this path
/// falls through to axum's 404.
pub fn anthropic_endpoint_router() -> Router<Arc<LlmHandler>> {
    Router::new()
}

/// Handle chat completion requests.
///
/// This endpoint supports both streaming and non-streaming responses.
/// When `stream: true` is set in the request, the response is sent as
/// Server-Sent Events (SSE). Otherwise, a standard JSON response is returned.
async fn chat_completions(
    State(server): State<Arc<LlmHandler>>,
    headers: HeaderMap,
    client_identity: Option<Extension<config::ClientIdentity>>,
    span_context: Option<Extension<SpanContext>>,
    Sonic(request): Sonic<openai::ChatCompletionRequest>,
) -> Result<impl IntoResponse> {
    log::debug!("OpenAI chat completions handler called for model: {}", request.model);
    log::debug!("Request has {} messages", request.messages.len());
    log::debug!("Streaming: {}", request.stream.unwrap_or(false));

    // Extract request context including client identity
    let context = request::extract_context(
        &headers,
        client_identity.map(|ext| ext.0),
        span_context.map(|ext| ext.0),
    );

    // Check if streaming is requested
    if request.stream.unwrap_or(false) {
        // Convert OpenAI request to unified format
        let unified_request = unified::UnifiedRequest::from(request);
        let stream = server.completions_stream(unified_request, &context).await?;

        let event_stream = stream.map(move |result| {
            let event = match result {
                Ok(unified_chunk) => {
                    // Convert UnifiedChunk to OpenAI format for OpenAI protocol
                    let openai_chunk = openai::ChatCompletionChunk::from(unified_chunk);
                    let json = sonic_rs::to_string(&openai_chunk).unwrap_or_else(|e| {
                        log::error!("Failed to serialize chunk: {e}");
                        r#"{"error":"serialization failed"}"#.to_string()
                    });

                    Event::default().data(json)
                }
                Err(e) => {
                    log::error!("Stream error: {e}");
                    Event::default().data(format!(r#"{{"error":"{e}"}}"#))
                }
            };

            Ok::<_, Infallible>(event)
        });

        let with_done = event_stream.chain(futures::stream::once(async {
            Ok::<_, Infallible>(Event::default().data("[DONE]"))
        }));

        log::debug!("Returning streaming response");
        Ok(Sse::new(with_done).into_response())
    } else {
        // Non-streaming response
        // Convert OpenAI request to unified format
        let unified_request = unified::UnifiedRequest::from(request);
        let unified_response = server.completions(unified_request, &context).await?;

        // Convert back to OpenAI format
        let response = openai::ChatCompletionResponse::from(unified_response);

        log::debug!(
            "Chat completion successful, returning response with {} choices",
            response.choices.len()
        );

        Ok(Json(response).into_response())
    }
}

/// Handle list models requests.
async fn list_models(State(server): State<Arc<LlmHandler>>) -> Result<impl IntoResponse> {
    let response = server.models().await;

    log::debug!("Returning {} models", response.data.len());
    Ok(Json(response))
}
