use std::sync::Arc;

use async_trait::async_trait;
use llm::client::CompletionClient;
use secrecy::SecretString;
use serde_json::Value;

/// Progress events a tool can emit while it runs, mirrored onto the SSE stream by the caller
/// (`response.tool_call.started` / `.completed`, plus implementation-defined progress events for
/// long-running tools like `agentic_search`).
#[derive(Debug, Clone)]
pub enum ToolEvent {
    Started { call_id: String, name: String },
    Progress { call_id: String, message: String },
    Completed { call_id: String, name: String },
}

/// Channel a tool uses to report progress back to the streaming assembler. Absent for
/// non-streaming requests.
pub type ToolEventSender = tokio::sync::mpsc::UnboundedSender<ToolEvent>;

/// A single search request against the vector store subsystem, as issued by `file_search` and
/// each round of `agentic_search`.
#[derive(Debug, Clone)]
pub struct FileSearchRequest {
    pub query: String,
    pub vector_store_ids: Vec<String>,
    pub max_num_results: usize,
    pub filters: Option<Value>,
    pub ranking: Option<Value>,
}

/// Collaborator the `file_search`/`agentic_search` native tools delegate to. Implemented by the
/// vector store service; kept as a trait here so `tools` doesn't need to depend on it (and so
/// `vector-store` can depend on `tools` for the reverse direction it needs — annotations share
/// the same JSON shape).
#[async_trait]
pub trait FileSearchBackend: Send + Sync {
    /// Run a search and return the `{data:[...], search_query}` document described in the
    /// `file_search` contract. Implementations are expected to already merge file-level
    /// attributes, apply ranking/reranking, and build annotations.
    async fn search(&self, request: FileSearchRequest) -> anyhow::Result<Value>;
}

/// A single tool exposed by an MCP server, as returned from tool discovery.
#[derive(Debug, Clone)]
pub struct McpToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Collaborator that lists and invokes tools hosted behind an MCP server. No built-in
/// implementation ships in this build (see DESIGN.md); callers that wire up MCP downstreams
/// provide their own.
#[async_trait]
pub trait McpClient: Send + Sync {
    async fn list_tools(&self, server_label: &str) -> anyhow::Result<Vec<McpToolInfo>>;

    async fn call_tool(&self, server_label: &str, tool_name: &str, arguments: Value) -> anyhow::Result<Value>;
}

/// Request-scoped parameters and collaborators passed to every tool execution.
///
/// Carries the current user's credentials, the upstream client handle, a streaming event
/// emitter, and request-scoped parameters, per the registry's `execute` contract.
pub struct ToolContext {
    /// Bearer credential forwarded to external collaborators that need it (image generation,
    /// MCP servers configured to reuse the caller's token).
    pub api_key: Option<SecretString>,
    /// Model the parent response is using; `agentic_search` reuses it for its sub-queries.
    pub model: String,
    pub temperature: Option<f32>,
    /// Default vector store scope, from the request; native search tools use this when the
    /// model's tool call doesn't name its own.
    pub vector_store_ids: Vec<String>,
    /// `call_id` of the `FunctionCall` this execution answers, for progress events.
    pub call_id: String,
    pub events: Option<ToolEventSender>,
    pub search_backend: Option<Arc<dyn FileSearchBackend>>,
    pub mcp_client: Option<Arc<dyn McpClient>>,
    pub completion_client: Option<Arc<CompletionClient>>,
    pub image_generation: ImageGenerationConfig,
}

impl ToolContext {
    fn emit(&self, event: ToolEvent) {
        if let Some(sender) = &self.events {
            let _ = sender.send(event);
        }
    }

    pub(crate) fn emit_progress(&self, message: impl Into<String>) {
        self.emit(ToolEvent::Progress {
            call_id: self.call_id.clone(),
            message: message.into(),
        });
    }
}

/// Image generation endpoint configuration, read from `OPEN_RESPONSES_IMAGE_GENERATION_BASE_URL`
/// / `OPEN_RESPONSES_IMAGE_GENERATION_API_KEY`.
#[derive(Debug, Clone, Default)]
pub struct ImageGenerationConfig {
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
}

impl ImageGenerationConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("OPEN_RESPONSES_IMAGE_GENERATION_BASE_URL").ok(),
            api_key: std::env::var("OPEN_RESPONSES_IMAGE_GENERATION_API_KEY")
                .ok()
                .map(SecretString::from),
        }
    }
}
