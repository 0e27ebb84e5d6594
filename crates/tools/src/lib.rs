//! Tool Registry: the catalog of callable tools the response orchestrator dispatches to.
//!
//! Three variants of tool exist — native (built into the gateway), MCP (hosted behind a remote
//! Model-Context-Protocol server), and function (declared by the caller, executed by the caller)
//! — unified behind [`ToolRegistry::resolve_alias`], [`ToolRegistry::get_definition`], and
//! [`ToolRegistry::execute`].

mod context;
mod definition;
mod error;
mod native;
mod registry;

pub use context::{FileSearchBackend, FileSearchRequest, ImageGenerationConfig, McpClient, McpToolInfo, ToolContext, ToolEvent, ToolEventSender};
pub use definition::{FunctionToolDef, McpToolDef, NativeToolDef, NativeToolKind, ToolDefinition};
pub use error::{Result, ToolError};
pub use registry::{ToolRegistry, default_image_generation_config};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    struct StubSearch;

    #[async_trait]
    impl FileSearchBackend for StubSearch {
        async fn search(&self, request: FileSearchRequest) -> anyhow::Result<serde_json::Value> {
            Ok(json!({
                "data": [{
                    "file_id": "file_1",
                    "filename": "alpha.txt",
                    "score": 0.9,
                    "content": [{"type": "text", "text": "alpha beta"}],
                    "annotations": [{"type": "file_citation", "index": 0, "file_id": "file_1", "filename": "alpha.txt"}],
                }],
                "search_query": request.query,
            }))
        }
    }

    fn context_with_backend() -> ToolContext {
        ToolContext {
            api_key: None,
            model: "openai@gpt-4o-mini".to_string(),
            temperature: None,
            vector_store_ids: vec!["vs_1".to_string()],
            call_id: "call_1".to_string(),
            events: None,
            search_backend: Some(Arc::new(StubSearch)),
            mcp_client: None,
            completion_client: None,
            image_generation: ImageGenerationConfig::default(),
        }
    }

    #[test]
    fn native_tools_are_registered_by_default() {
        let registry = ToolRegistry::new();

        for name in ["file_search", "agentic_search", "image_generation", "python", "think"] {
            assert!(registry.get_definition(name).is_some(), "{name} should be registered");
        }
    }

    #[test]
    fn resolve_alias_prefers_exact_match_then_server_prefix_form() {
        let mut registry = ToolRegistry::new();
        registry.register_mcp_tools(
            "github",
            [McpToolInfo {
                name: "search_issues".to_string(),
                description: "search issues".to_string(),
                parameters: json!({"type": "object"}),
            }],
        );

        assert_eq!(registry.resolve_alias("github__search_issues"), "github__search_issues");
        // Bare name also resolves, since nothing else claimed it.
        assert_eq!(registry.resolve_alias("search_issues"), "search_issues");
        // Unknown names pass through unchanged.
        assert_eq!(registry.resolve_alias("nonexistent"), "nonexistent");
    }

    #[tokio::test]
    async fn function_tools_execute_as_passthrough() {
        let mut registry = ToolRegistry::new();
        registry.register_function_tools([FunctionToolDef {
            name: "get_time".to_string(),
            description: "get the time".to_string(),
            parameters: json!({"type": "object"}),
            strict: false,
        }]);

        let ctx = context_with_backend();
        let result = registry.execute("get_time", "{}", &ctx).await;

        assert!(matches!(result, Err(ToolError::Passthrough(name)) if name == "get_time"));
    }

    #[tokio::test]
    async fn file_search_delegates_to_backend_and_fills_search_query() {
        let registry = ToolRegistry::new();
        let ctx = context_with_backend();

        let result = registry
            .execute("file_search", r#"{"query":"beta","vector_store_ids":["vs_1"]}"#, &ctx)
            .await
            .expect("file_search should succeed");

        assert_eq!(result["search_query"], "beta");
        assert_eq!(result["data"][0]["file_id"], "file_1");
    }

    #[tokio::test]
    async fn think_echoes_its_argument() {
        let registry = ToolRegistry::new();
        let ctx = context_with_backend();

        let result = registry
            .execute("think", r#"{"thought":"consider the edge cases"}"#, &ctx)
            .await
            .expect("think should succeed");

        assert_eq!(result, json!("consider the edge cases"));
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let ctx = context_with_backend();

        let result = registry.execute("does_not_exist", "{}", &ctx).await;
        assert!(matches!(result, Err(ToolError::NotFound(_))));
    }
}
