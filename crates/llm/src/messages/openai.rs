//! OpenAI-compatible chat completion wire types.
//!
//! These are the types actually sent and received over the wire for the `/v1/chat/completions`
//! and `/v1/models` endpoints. Conversions to/from the protocol-agnostic unified types live in
//! [`crate::messages::unified`].

use serde::{Deserialize, Serialize};

/// Arbitrary JSON Schema describing a tool's parameters.
///
/// Modeled as a thin wrapper around [`serde_json::Value`] rather than a fully typed schema,
/// since tool definitions are passed through to the upstream provider largely unexamined.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JsonSchema(pub serde_json::Value);

/// A chat completion request in OpenAI's wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model identifier, possibly `provider@model`-routed.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling cutoff.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    /// Frequency penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    /// Presence penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    /// Stop sequences.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    /// Whether to stream the response as Server-Sent Events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Tools available to the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    /// Tool choice strategy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Whether the model may make multiple tool calls in a single response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel_tool_calls: Option<bool>,
}

/// Role of a message's author.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// System instruction.
    System,
    /// End-user message.
    User,
    /// Model-generated message.
    Assistant,
    /// Tool execution result.
    Tool,
    /// Unrecognized role, preserved verbatim for forward compatibility.
    #[serde(untagged)]
    Other(String),
}

impl<'de> Deserialize<'de> for ChatRole {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;

        Ok(match value.as_str() {
            "system" => Self::System,
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "tool" => Self::Tool,
            _ => Self::Other(value),
        })
    }
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who sent the message.
    pub role: ChatRole,
    /// Text content of the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool calls requested by the assistant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Id of the tool call this message responds to, for role `tool`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Discriminator for tool call/definition kinds. Only `function` is supported today.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallType {
    /// A callable function.
    Function,
}

/// A tool definition offered to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Always `function`.
    #[serde(rename = "type")]
    pub tool_type: ToolCallType,
    /// The function's specification.
    pub function: FunctionDefinition,
}

/// A function's name, description, and parameter schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Function name.
    pub name: String,
    /// Human-readable description of what the function does.
    pub description: String,
    /// JSON Schema describing the function's parameters.
    pub parameters: Box<JsonSchema>,
}

/// A completed tool call in a non-streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call.
    pub id: String,
    /// Always `function`.
    #[serde(rename = "type")]
    pub tool_type: ToolCallType,
    /// The function invocation.
    pub function: FunctionCall,
}

/// A function invocation's name and raw JSON-encoded arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Name of the function called.
    pub name: String,
    /// Arguments as a JSON-encoded string.
    pub arguments: String,
}

/// High-level tool usage mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoiceMode {
    /// Disable tool use.
    None,
    /// Let the model decide.
    Auto,
    /// Require at least one tool call.
    Required,
    /// Alias for `required` used by some providers.
    Any,
    /// Unrecognized mode, preserved verbatim.
    #[serde(untagged)]
    Other(String),
}

impl<'de> Deserialize<'de> for ToolChoiceMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;

        Ok(match value.as_str() {
            "none" => Self::None,
            "auto" => Self::Auto,
            "required" => Self::Required,
            "any" => Self::Any,
            _ => Self::Other(value),
        })
    }
}

/// Name of a specific tool the model must call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolChoiceFunction {
    /// Function name.
    pub name: String,
}

/// Either a general mode or a forced specific tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolChoice {
    /// General tool usage mode.
    Mode(ToolChoiceMode),
    /// Force a specific tool.
    Specific {
        /// Always `function`.
        #[serde(rename = "type")]
        tool_type: ToolCallType,
        /// The forced function.
        function: ToolChoiceFunction,
    },
}

/// Why generation stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural completion.
    Stop,
    /// Hit `max_tokens`.
    Length,
    /// Blocked by content filtering.
    ContentFilter,
    /// Model requested tool calls.
    ToolCalls,
    /// Unrecognized reason, preserved verbatim.
    #[serde(untagged)]
    Other(String),
}

impl<'de> Deserialize<'de> for FinishReason {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;

        Ok(match value.as_str() {
            "stop" => Self::Stop,
            "length" => Self::Length,
            "content_filter" => Self::ContentFilter,
            "tool_calls" | "function_call" => Self::ToolCalls,
            _ => Self::Other(value),
        })
    }
}

/// Token usage for a request/response pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    pub prompt_tokens: u32,
    /// Tokens in the completion.
    pub completion_tokens: u32,
    /// Total tokens used.
    pub total_tokens: u32,
}

/// Object type tag included in API responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectType {
    /// A single model object.
    #[serde(rename = "model")]
    Model,
    /// A list container.
    #[serde(rename = "list")]
    List,
    /// A complete chat completion.
    #[serde(rename = "chat.completion")]
    ChatCompletion,
    /// A streaming chat completion chunk.
    #[serde(rename = "chat.completion.chunk")]
    ChatCompletionChunk,
}

/// A non-streaming chat completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    /// Unique completion id.
    pub id: String,
    /// Always [`ObjectType::ChatCompletion`].
    pub object: ObjectType,
    /// Unix timestamp of creation.
    pub created: u64,
    /// Model that generated the response.
    pub model: String,
    /// Response choices.
    pub choices: Vec<ChatChoice>,
    /// Token usage for this request.
    pub usage: Usage,
}

/// A single completed choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    /// Choice index.
    pub index: u32,
    /// The generated message.
    pub message: ChatMessage,
    /// Why generation stopped for this choice.
    pub finish_reason: FinishReason,
}

/// Start of a streamed tool call, or an incremental update to one already started.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StreamingToolCall {
    /// First chunk establishing a new tool call.
    Start {
        /// Index in the tool_calls array.
        index: usize,
        /// Unique identifier for this call.
        id: String,
        /// Always `function`.
        r#type: ToolCallType,
        /// Initial function name and (usually empty) arguments.
        function: FunctionStart,
    },
    /// A subsequent chunk appending to an already-started tool call's arguments.
    Delta {
        /// Index matching a previously started tool call.
        index: usize,
        /// Incremental arguments.
        function: FunctionDelta,
    },
}

/// Initial function info for a streamed tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionStart {
    /// Function name.
    pub name: String,
    /// Initial arguments fragment, usually empty.
    pub arguments: String,
}

/// Incremental arguments for a streamed tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDelta {
    /// Argument fragment to append.
    pub arguments: String,
}

/// Incremental content for one choice in a streaming response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessageDelta {
    /// Present only on the first chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ChatRole>,
    /// Incremental text to append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Legacy function-call delta, never populated by this gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<serde_json::Value>,
    /// Incremental tool call updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<StreamingToolCall>>,
}

/// One choice's delta within a streaming chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoiceDelta {
    /// Choice index.
    pub index: u32,
    /// Token log probabilities; never populated by this gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<serde_json::Value>,
    /// The incremental content.
    pub delta: ChatMessageDelta,
    /// Present only on the final chunk for this choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// A single Server-Sent Event chunk of a streaming chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Shared across all chunks of one completion.
    pub id: String,
    /// Always [`ObjectType::ChatCompletionChunk`].
    pub object: ObjectType,
    /// Unix timestamp of creation.
    pub created: u64,
    /// Model generating the response.
    pub model: String,
    /// Backend configuration fingerprint, rarely populated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,
    /// Incremental choices.
    pub choices: Vec<ChatChoiceDelta>,
    /// Only present on the final chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// A single model entry in `/v1/models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier used in requests.
    pub id: String,
    /// Always [`ObjectType::Model`].
    pub object: ObjectType,
    /// Unix timestamp of creation, 0 if unknown.
    pub created: u64,
    /// Organization that owns the model.
    pub owned_by: String,
}

/// Response body for `/v1/models`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    /// Always [`ObjectType::List`].
    pub object: ObjectType,
    /// Available models.
    pub data: Vec<Model>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_unknown_finish_reason_as_other() {
        let reason: FinishReason = serde_json::from_str(r#""safety""#).unwrap();
        assert_eq!(reason, FinishReason::Other("safety".to_string()));
    }

    #[test]
    fn round_trips_tool_choice_mode() {
        let request: ChatCompletionRequest = serde_json::from_str(
            r#"{"model":"gpt-4o-mini","messages":[],"tool_choice":"required"}"#,
        )
        .unwrap();

        assert_eq!(request.tool_choice, Some(ToolChoice::Mode(ToolChoiceMode::Required)));
    }
}
