use thiserror::Error;

/// Errors raised while resolving or executing a tool.
///
/// Mirrors [`llm::LlmError`]'s shape: every variant knows its own taxonomy slot so the response
/// orchestrator can decide whether to surface it as a `FunctionCallOutput` describing failure
/// (the common case) or abort the turn loop entirely (`is_fatal`).
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool is registered under this name (after alias resolution).
    #[error("Tool '{0}' is not registered")]
    NotFound(String),

    /// The arguments the model supplied don't parse, or don't satisfy the tool's schema.
    #[error("Invalid arguments for tool '{0}': {1}")]
    InvalidArguments(String, String),

    /// The tool ran but failed. Non-fatal failures are reported back to the model as a
    /// `FunctionCallOutput` so it can retry or recover; fatal ones abort the turn loop.
    #[error("Tool '{name}' failed: {message}")]
    ExecutionFailed {
        /// Name of the tool that failed.
        name: String,
        /// Message safe to return to the model or the caller.
        message: String,
        /// Whether the orchestrator must abort the turn loop instead of continuing.
        fatal: bool,
    },

    /// The tool did not complete within its allotted budget.
    #[error("Tool '{0}' timed out")]
    Timeout(String),

    /// A function-type tool was invoked; the registry does not execute these itself, it
    /// hands control back to the orchestrator to surface a `FunctionCall` output item.
    #[error("Tool '{0}' is a function tool and must be executed by the caller")]
    Passthrough(String),

    /// Transport or configuration error talking to an external collaborator (MCP server,
    /// image generation endpoint, sandboxed code runner).
    #[error("Tool '{0}' is unavailable: {1}")]
    Unavailable(String, String),
}

impl ToolError {
    /// Whether this error should stop the orchestrator's turn loop rather than be folded into a
    /// `FunctionCallOutput` and continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ExecutionFailed { fatal: true, .. })
    }
}

/// Result type used throughout the tool registry.
pub type Result<T> = std::result::Result<T, ToolError>;
