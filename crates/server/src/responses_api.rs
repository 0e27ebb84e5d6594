//! `/v1/responses*`: the Responses API route group.
//!
//! Thin axum glue over [`responses::ResponseOrchestrator`]/[`responses::ResponseStore`]; all the
//! turn-loop and persistence logic lives in the `responses` crate, the same separation
//! `crates/llm`'s router keeps from `LlmHandler`.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response, Sse, sse::Event},
    routing::{get, post},
};
use fastrace::collector::SpanContext;
use futures::StreamExt;
use responses::{ResponseOrchestrator, ResponseRequest, ResponseStore, ResponseStreamEvent};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::json;
use tools::{ImageGenerationConfig, ToolContext, ToolRegistry};

/// Shared state backing every `/v1/responses*` handler.
pub struct ResponsesState {
    orchestrator: Arc<ResponseOrchestrator>,
    store: Arc<ResponseStore>,
    search_backend: Option<Arc<dyn tools::FileSearchBackend>>,
    completion_client: Arc<llm::client::CompletionClient>,
    image_generation: ImageGenerationConfig,
}

impl ResponsesState {
    pub fn new(
        orchestrator: Arc<ResponseOrchestrator>,
        completion_client: Arc<llm::client::CompletionClient>,
        search_backend: Option<Arc<dyn tools::FileSearchBackend>>,
    ) -> Self {
        Self {
            orchestrator,
            store: Arc::new(ResponseStore::new()),
            search_backend,
            completion_client,
            image_generation: ImageGenerationConfig::from_env(),
        }
    }

    fn registry(&self) -> ToolRegistry {
        ToolRegistry::new()
    }
}

/// `file_search`/`agentic_search` tool calls default to the store ids named by the matching
/// `RequestTool` declaration when the model's call doesn't supply its own.
fn default_vector_store_ids(request: &ResponseRequest) -> Vec<String> {
    request
        .tools
        .iter()
        .find_map(|tool| match tool {
            responses::RequestTool::FileSearch { vector_store_ids, .. } => Some(vector_store_ids.clone()),
            responses::RequestTool::AgenticSearch { vector_store_ids, .. } => Some(vector_store_ids.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

fn bearer_api_key(headers: &HeaderMap) -> Option<SecretString> {
    headers
        .get(http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| SecretString::from(token.to_string()))
}

fn request_context(headers: &HeaderMap, client_identity: Option<config::ClientIdentity>, span_context: Option<SpanContext>) -> llm::RequestContext {
    llm::RequestContext {
        api_key: bearer_api_key(headers),
        client_identity,
        headers: headers.clone(),
        span_context,
    }
}

pub fn router() -> Router<Arc<ResponsesState>> {
    Router::new()
        .route("/", post(create_response))
        .route("/{id}", get(get_response).delete(delete_response))
        .route("/{id}/input_items", get(list_input_items))
}

async fn create_response(
    State(state): State<Arc<ResponsesState>>,
    headers: HeaderMap,
    client_identity: Option<Extension<config::ClientIdentity>>,
    span_context: Option<Extension<SpanContext>>,
    Json(request): Json<ResponseRequest>,
) -> Response {
    let api_key = bearer_api_key(&headers);
    let context = request_context(&headers, client_identity.map(|e| e.0), span_context.map(|e| e.0));
    let mut registry = state.registry();
    registry.register_function_tools(request.tools.iter().filter_map(|tool| match tool {
        responses::RequestTool::Function { name, description, parameters, strict } => Some(tools::FunctionToolDef {
            name: name.clone(),
            description: description.clone(),
            parameters: parameters.clone(),
            strict: *strict,
        }),
        _ => None,
    }));
    let registry = Arc::new(registry);

    if request.stream {
        let orchestrator = state.orchestrator.clone();
        let store = state.store.clone();
        let state_for_ctx = state.clone();
        let model = request.model.clone();
        let temperature = request.temperature;
        let vector_store_ids = default_vector_store_ids(&request);

        let stream = orchestrator.run_streaming(
            request,
            registry,
            move |call_id, events| ToolContext {
                api_key: api_key.clone(),
                model: model.clone(),
                temperature,
                vector_store_ids: vector_store_ids.clone(),
                call_id: call_id.to_string(),
                events,
                search_backend: state_for_ctx.search_backend.clone(),
                mcp_client: None,
                completion_client: Some(state_for_ctx.completion_client.clone()),
                image_generation: state_for_ctx.image_generation.clone(),
            },
            store,
            context,
        );

        let sse_stream = stream.map(|event| Ok::<_, std::convert::Infallible>(to_sse_event(event)));
        return Sse::new(sse_stream).into_response();
    }

    let model = request.model.clone();
    let temperature = request.temperature;
    let vector_store_ids = default_vector_store_ids(&request);

    let ctx_for = |call_id: &str| ToolContext {
        api_key: api_key.clone(),
        model: model.clone(),
        temperature,
        vector_store_ids: vector_store_ids.clone(),
        call_id: call_id.to_string(),
        events: None,
        search_backend: state.search_backend.clone(),
        mcp_client: None,
        completion_client: Some(state.completion_client.clone()),
        image_generation: state.image_generation.clone(),
    };

    match state.orchestrator.run(request, &registry, ctx_for, &state.store, &context).await {
        Ok(response) => Json(response).into_response(),
        Err(error) => error_response(error),
    }
}

fn to_sse_event(event: ResponseStreamEvent) -> Event {
    Event::default().event(event.event_type()).json_data(event.data()).unwrap_or_else(|_| Event::default().event("error"))
}

#[derive(Deserialize)]
struct InputItemsQuery {
    #[serde(default = "default_limit")]
    limit: usize,
    #[serde(default)]
    order: Option<String>,
    after: Option<String>,
    before: Option<String>,
}

fn default_limit() -> usize {
    20
}

async fn get_response(State(state): State<Arc<ResponsesState>>, Path(id): Path<String>) -> Response {
    match state.store.get(&id) {
        Ok(record) => Json(record.response).into_response(),
        Err(error) => error_response(error),
    }
}

async fn delete_response(State(state): State<Arc<ResponsesState>>, Path(id): Path<String>) -> Response {
    match state.store.delete(&id) {
        Ok(()) => Json(json!({ "id": id, "object": "response", "deleted": true })).into_response(),
        Err(error) => error_response(error),
    }
}

async fn list_input_items(State(state): State<Arc<ResponsesState>>, Path(id): Path<String>, Query(query): Query<InputItemsQuery>) -> Response {
    let order = responses::Order::from_str(query.order.as_deref().unwrap_or("asc"));

    match state
        .store
        .list_input_items(&id, query.limit, order, query.after.as_deref(), query.before.as_deref())
    {
        Ok(page) => Json(json!({
            "object": "list",
            "data": page.data.iter().map(|i| json!({ "id": i.id, "item": i.item })).collect::<Vec<_>>(),
            "has_more": page.has_more,
        }))
        .into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: responses::ResponseError) -> Response {
    let status = error.status_code();
    let body = json!({
        "error": {
            "type": error.error_type(),
            "message": error.to_string(),
            "code": status.as_u16(),
        }
    });

    (status, Json(body)).into_response()
}
