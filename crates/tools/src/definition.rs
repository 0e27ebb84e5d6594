use serde_json::Value;

/// A callable tool, in one of three flavors.
///
/// Every variant carries the resolved (alias-free) name alongside the name the caller or the
/// remote server originally used it under, so the registry can answer `resolveAlias` without a
/// second lookup table.
#[derive(Debug, Clone)]
pub enum ToolDefinition {
    /// Built into the gateway: `file_search`, `agentic_search`, `image_generation`, `python`,
    /// `think`.
    Native(NativeToolDef),
    /// Hosted behind an MCP server; invoked through the configured [`crate::McpClient`].
    Mcp(McpToolDef),
    /// Declared by the caller on the request; the registry never executes these, it just
    /// validates the shape and hands the call back to the orchestrator as a `FunctionCall`.
    Function(FunctionToolDef),
}

impl ToolDefinition {
    /// The resolved (canonical) name this definition is registered under.
    pub fn resolved_name(&self) -> &str {
        match self {
            Self::Native(def) => def.name.as_str(),
            Self::Mcp(def) => def.alias.as_str(),
            Self::Function(def) => def.name.as_str(),
        }
    }

    /// JSON Schema for the tool's arguments, as presented to the model.
    pub fn parameters(&self) -> &Value {
        match self {
            Self::Native(def) => &def.parameters,
            Self::Mcp(def) => &def.parameters,
            Self::Function(def) => &def.parameters,
        }
    }

    /// Human-readable description surfaced to the model.
    pub fn description(&self) -> &str {
        match self {
            Self::Native(def) => &def.description,
            Self::Mcp(def) => &def.description,
            Self::Function(def) => &def.description,
        }
    }
}

/// One of the built-in tools the gateway always knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeToolKind {
    FileSearch,
    AgenticSearch,
    ImageGeneration,
    Python,
    Think,
}

impl NativeToolKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::FileSearch => "file_search",
            Self::AgenticSearch => "agentic_search",
            Self::ImageGeneration => "image_generation",
            Self::Python => "python",
            Self::Think => "think",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "file_search" => Some(Self::FileSearch),
            "agentic_search" => Some(Self::AgenticSearch),
            "image_generation" => Some(Self::ImageGeneration),
            "python" | "code_interpreter" => Some(Self::Python),
            "think" => Some(Self::Think),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NativeToolDef {
    pub kind: NativeToolKind,
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl NativeToolDef {
    pub fn new(kind: NativeToolKind) -> Self {
        let (description, parameters) = native_schema(kind);

        Self {
            kind,
            name: kind.name().to_string(),
            description,
            parameters,
        }
    }
}

fn native_schema(kind: NativeToolKind) -> (String, Value) {
    match kind {
        NativeToolKind::FileSearch => (
            "Search one or more vector stores for content relevant to a query.".to_string(),
            serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Search query"},
                    "vector_store_ids": {"type": "array", "items": {"type": "string"}},
                    "max_num_results": {"type": "integer"},
                },
                "required": ["query", "vector_store_ids"],
            }),
        ),
        NativeToolKind::AgenticSearch => (
            "Iteratively search vector stores, refining the query across several rounds until \
             enough relevant content has been gathered."
                .to_string(),
            serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "vector_store_ids": {"type": "array", "items": {"type": "string"}},
                    "max_iterations": {"type": "integer"},
                    "max_num_results": {"type": "integer"},
                },
                "required": ["query", "vector_store_ids"],
            }),
        ),
        NativeToolKind::ImageGeneration => (
            "Generate an image from a text prompt.".to_string(),
            serde_json::json!({
                "type": "object",
                "properties": {
                    "prompt": {"type": "string"},
                    "size": {"type": "string"},
                },
                "required": ["prompt"],
            }),
        ),
        NativeToolKind::Python => (
            "Execute a snippet of Python in a sandboxed interpreter and return stdout.".to_string(),
            serde_json::json!({
                "type": "object",
                "properties": {"code": {"type": "string"}},
                "required": ["code"],
            }),
        ),
        NativeToolKind::Think => (
            "Record a private reasoning note; the text is echoed back unchanged.".to_string(),
            serde_json::json!({
                "type": "object",
                "properties": {"thought": {"type": "string"}},
                "required": ["thought"],
            }),
        ),
    }
}

/// A tool hosted behind an MCP server.
#[derive(Debug, Clone)]
pub struct McpToolDef {
    /// Alias exposed to the model: `{server_label}__{tool_name}` when the server label is
    /// needed to disambiguate, otherwise just `tool_name`.
    pub alias: String,
    /// Label of the MCP server this tool came from.
    pub server_label: String,
    /// The tool's own name, as the MCP server knows it.
    pub remote_name: String,
    pub description: String,
    pub parameters: Value,
}

impl McpToolDef {
    /// Build the `server_label__tool_name` alias form used to disambiguate name collisions
    /// across multiple MCP servers.
    pub fn alias_for(server_label: &str, remote_name: &str) -> String {
        format!("{server_label}__{remote_name}")
    }
}

/// A tool declared by the caller on the request. The registry validates its shape but never
/// executes it; the orchestrator surfaces a `FunctionCall` output item and waits for the caller
/// to supply the matching `FunctionCallOutput` on a later turn.
#[derive(Debug, Clone)]
pub struct FunctionToolDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub strict: bool,
}
