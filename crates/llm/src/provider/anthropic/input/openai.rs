//! Converts a [`UnifiedRequest`] into Anthropic's Messages API request shape.
//!
//! Named `openai` because the unified request always originates from the OpenAI-compatible
//! inbound protocol; this module is the outbound half of that conversion for the Anthropic
//! provider.

use serde::Serialize;
use serde_json::Value;

use crate::messages::unified::{
    self, UnifiedArguments, UnifiedContent, UnifiedContentContainer, UnifiedRequest, UnifiedRole, UnifiedToolChoice,
    UnifiedToolChoiceMode,
};

/// Request body for Anthropic's `POST /v1/messages`.
#[derive(Debug, Serialize)]
pub(crate) struct AnthropicRequest {
    pub model: String,
    pub messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<AnthropicTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<AnthropicToolChoice>,
}

/// Anthropic's per-message shape: a role plus a list of content blocks.
#[derive(Debug, Serialize)]
pub(crate) struct AnthropicMessage {
    pub role: AnthropicRole,
    pub content: Vec<AnthropicContentBlock>,
}

/// Anthropic only recognizes `user` and `assistant` at the message level; `system` is lifted
/// into the top-level `system` field and `tool` results are folded into a `user` message.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum AnthropicRole {
    User,
    Assistant,
}

/// A single content block in an Anthropic request message.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum AnthropicContentBlock {
    Text {
        text: String,
    },
    Image {
        source: AnthropicImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum AnthropicImageSource {
    Base64 { media_type: String, data: String },
    Url { url: String },
}

#[derive(Debug, Serialize)]
pub(crate) struct AnthropicTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum AnthropicToolChoice {
    Auto,
    Any,
    None,
    Tool { name: String },
}

const DEFAULT_MAX_TOKENS: u32 = 4096;

impl From<UnifiedRequest> for AnthropicRequest {
    fn from(request: UnifiedRequest) -> Self {
        let mut system = request.system;
        let mut messages = Vec::with_capacity(request.messages.len());

        for message in request.messages {
            if message.role == UnifiedRole::System {
                let text = content_as_text(&message.content);
                system = Some(match system {
                    Some(existing) => format!("{existing}\n{text}"),
                    None => text,
                });
                continue;
            }

            let role = match message.role {
                UnifiedRole::User | UnifiedRole::Tool => AnthropicRole::User,
                UnifiedRole::Assistant => AnthropicRole::Assistant,
                UnifiedRole::System => unreachable!("system messages are handled above"),
            };

            let content = match message.content {
                UnifiedContentContainer::Text(text) if message.role == UnifiedRole::Tool => {
                    vec![AnthropicContentBlock::ToolResult {
                        tool_use_id: message.tool_call_id.unwrap_or_default(),
                        content: text,
                        is_error: None,
                    }]
                }
                UnifiedContentContainer::Text(text) => vec![AnthropicContentBlock::Text { text }],
                UnifiedContentContainer::Blocks(blocks) => blocks.into_iter().map(convert_block).collect(),
            };

            messages.push(AnthropicMessage { role, content });
        }

        let tools = request.tools.map(|tools| {
            tools
                .into_iter()
                .map(|tool| AnthropicTool {
                    name: tool.function.name,
                    description: tool.function.description,
                    input_schema: tool.function.parameters.0,
                })
                .collect()
        });

        let tool_choice = request.tool_choice.map(|choice| match choice {
            UnifiedToolChoice::Mode(UnifiedToolChoiceMode::None) => AnthropicToolChoice::None,
            UnifiedToolChoice::Mode(UnifiedToolChoiceMode::Auto) => AnthropicToolChoice::Auto,
            UnifiedToolChoice::Mode(UnifiedToolChoiceMode::Required) => AnthropicToolChoice::Any,
            UnifiedToolChoice::Specific { function } => AnthropicToolChoice::Tool { name: function.name },
        });

        Self {
            model: request.model,
            messages,
            system,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
            top_p: request.top_p,
            top_k: request.top_k,
            stop_sequences: request.stop_sequences,
            stream: request.stream,
            tools,
            tool_choice,
        }
    }
}

fn content_as_text(content: &UnifiedContentContainer) -> String {
    match content {
        UnifiedContentContainer::Text(text) => text.clone(),
        UnifiedContentContainer::Blocks(blocks) => blocks.iter().filter_map(UnifiedContent::as_text).collect(),
    }
}

fn convert_block(block: UnifiedContent) -> AnthropicContentBlock {
    match block {
        UnifiedContent::Text { text } => AnthropicContentBlock::Text { text },
        UnifiedContent::Image { source } => AnthropicContentBlock::Image {
            source: match source {
                unified::UnifiedImageSource::Base64 { media_type, data } => {
                    AnthropicImageSource::Base64 { media_type, data }
                }
                unified::UnifiedImageSource::Url { url } => AnthropicImageSource::Url { url },
            },
        },
        UnifiedContent::ToolUse { id, name, input } => AnthropicContentBlock::ToolUse { id, name, input },
        UnifiedContent::ToolResult {
            tool_use_id,
            content,
            is_error,
        } => AnthropicContentBlock::ToolResult {
            tool_use_id,
            content: match content {
                unified::UnifiedToolResultContent::Text(text) => text,
                unified::UnifiedToolResultContent::Multiple(parts) => parts.join("\n"),
            },
            is_error,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::unified::{UnifiedMessage, UnifiedRequest};

    #[test]
    fn extracts_system_message_into_top_level_field() {
        let request = UnifiedRequest {
            model: "claude-3-5-sonnet".to_string(),
            messages: vec![
                UnifiedMessage {
                    role: UnifiedRole::System,
                    content: UnifiedContentContainer::Text("be terse".to_string()),
                    tool_calls: None,
                    tool_call_id: None,
                },
                UnifiedMessage {
                    role: UnifiedRole::User,
                    content: UnifiedContentContainer::Text("hi".to_string()),
                    tool_calls: None,
                    tool_call_id: None,
                },
            ],
            system: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            top_k: None,
            frequency_penalty: None,
            presence_penalty: None,
            stop_sequences: None,
            stream: None,
            tools: None,
            tool_choice: None,
            parallel_tool_calls: None,
            metadata: None,
        };

        let anthropic = AnthropicRequest::from(request);

        assert_eq!(anthropic.system.as_deref(), Some("be terse"));
        assert_eq!(anthropic.messages.len(), 1);
    }
}
