use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::context::{ImageGenerationConfig, McpClient, ToolContext};
use crate::definition::{FunctionToolDef, McpToolDef, NativeToolDef, NativeToolKind, ToolDefinition};
use crate::error::{Result, ToolError};
use crate::native;

/// Catalog of callable tools for a single request.
///
/// Built fresh per request from the always-present native tools, the caller's declared function
/// tools, and whatever MCP servers the request's configuration names. The registry itself is
/// read-only once built, which gives the "read-mostly, copy-on-write" behavior the orchestrator
/// needs for free: concurrent turns within a request share an `Arc<ToolRegistry>` and never
/// mutate it.
pub struct ToolRegistry {
    definitions: HashMap<String, ToolDefinition>,
    mcp_client: Option<Arc<dyn McpClient>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// A registry with only the mandatory native tools registered.
    pub fn new() -> Self {
        let mut definitions = HashMap::new();

        for kind in [
            NativeToolKind::FileSearch,
            NativeToolKind::AgenticSearch,
            NativeToolKind::ImageGeneration,
            NativeToolKind::Python,
            NativeToolKind::Think,
        ] {
            let def = NativeToolDef::new(kind);
            definitions.insert(def.name.clone(), ToolDefinition::Native(def));
        }

        Self {
            definitions,
            mcp_client: None,
        }
    }

    /// Register the caller's function tools (from `ResponseRequest.tools`). Function tools never
    /// execute inside the registry; they're surfaced as passthrough `FunctionCall`s.
    pub fn register_function_tools(&mut self, tools: impl IntoIterator<Item = FunctionToolDef>) {
        for tool in tools {
            self.definitions.insert(tool.name.clone(), ToolDefinition::Function(tool));
        }
    }

    /// Register tools discovered from an MCP server, aliasing each as `server_label__tool_name`
    /// to avoid colliding with another server's tool of the same name. If no other registered
    /// tool already uses the bare name, it's also registered unaliased for convenience.
    pub fn register_mcp_tools(&mut self, server_label: &str, tools: impl IntoIterator<Item = crate::context::McpToolInfo>) {
        for tool in tools {
            let alias = McpToolDef::alias_for(server_label, &tool.name);

            let def = McpToolDef {
                alias: alias.clone(),
                server_label: server_label.to_string(),
                remote_name: tool.name.clone(),
                description: tool.description,
                parameters: tool.parameters,
            };

            if !self.definitions.contains_key(&tool.name) {
                self.definitions.insert(tool.name.clone(), ToolDefinition::Mcp(def.clone()));
            }

            self.definitions.insert(alias, ToolDefinition::Mcp(def));
        }
    }

    pub fn with_mcp_client(mut self, client: Arc<dyn McpClient>) -> Self {
        self.mcp_client = Some(client);
        self
    }

    /// Resolve a possibly-aliased tool name to the name it's registered under.
    ///
    /// Supports the `caller_alias_prefix__real` form used when multiple MCP servers expose
    /// name-colliding tools: if `name` isn't registered directly but splitting on the first `__`
    /// yields a registered `prefix__rest` alias, that's returned instead.
    pub fn resolve_alias(&self, name: &str) -> String {
        if self.definitions.contains_key(name) {
            return name.to_string();
        }

        if let Some((prefix, rest)) = name.split_once("__") {
            let alias = McpToolDef::alias_for(prefix, rest);

            if self.definitions.contains_key(&alias) {
                return alias;
            }
        }

        name.to_string()
    }

    pub fn get_definition(&self, name: &str) -> Option<&ToolDefinition> {
        let resolved = self.resolve_alias(name);
        self.definitions.get(&resolved)
    }

    /// All definitions currently registered, for building the upstream tool list.
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.definitions.values()
    }

    /// Execute a tool by (possibly aliased) name.
    ///
    /// At-most-once-per-call-id is the caller's responsibility: the orchestrator only invokes
    /// `execute` once per `pending_calls` entry per turn.
    pub async fn execute(&self, name: &str, arguments_json: &str, ctx: &ToolContext) -> Result<Value> {
        let resolved = self.resolve_alias(name);

        let definition = self
            .definitions
            .get(&resolved)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let arguments: Value = if arguments_json.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(arguments_json)
                .map_err(|e| ToolError::InvalidArguments(resolved.clone(), e.to_string()))?
        };

        match definition {
            ToolDefinition::Function(_) => Err(ToolError::Passthrough(resolved)),
            ToolDefinition::Native(def) => self.execute_native(def.kind, &arguments, ctx).await,
            ToolDefinition::Mcp(def) => self.execute_mcp(def, arguments, ctx).await,
        }
    }

    async fn execute_native(&self, kind: NativeToolKind, arguments: &Value, ctx: &ToolContext) -> Result<Value> {
        match kind {
            NativeToolKind::FileSearch => native::file_search(arguments, ctx).await,
            NativeToolKind::AgenticSearch => native::agentic_search(arguments, ctx).await,
            NativeToolKind::ImageGeneration => native::image_generation(arguments, ctx).await,
            NativeToolKind::Python => native::python(arguments, ctx).await,
            NativeToolKind::Think => native::think(arguments, ctx).await,
        }
    }

    async fn execute_mcp(&self, def: &McpToolDef, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let client = ctx
            .mcp_client
            .clone()
            .or_else(|| self.mcp_client.clone())
            .ok_or_else(|| ToolError::Unavailable(def.alias.clone(), "no MCP client configured".to_string()))?;

        client
            .call_tool(&def.server_label, &def.remote_name, arguments)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                name: def.alias.clone(),
                message: e.to_string(),
                fatal: false,
            })
    }
}

/// Convenience for building a [`ToolContext`] with the image generation endpoint read from the
/// process environment, matching the other native tool defaults.
pub fn default_image_generation_config() -> ImageGenerationConfig {
    ImageGenerationConfig::from_env()
}
