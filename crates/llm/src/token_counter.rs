//! Approximate token counting for pre-flight rate limiting decisions.
//!
//! This is an estimate, not the authoritative count: the real count comes back from the
//! provider in the response `usage` field. It only needs to be close enough to reject requests
//! that would obviously blow a configured token budget before we spend the round trip.

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

use crate::messages::unified::{UnifiedArguments, UnifiedContent, UnifiedContentContainer, UnifiedRequest};

fn encoder() -> &'static CoreBPE {
    static ENCODER: OnceLock<CoreBPE> = OnceLock::new();

    ENCODER.get_or_init(|| tiktoken_rs::o200k_base().expect("o200k_base ranks are statically embedded"))
}

/// Estimate the number of input tokens a request will consume.
///
/// Walks every message's text content (including tool call arguments and tool results) and
/// counts tokens with the `o200k_base` encoding used by recent OpenAI models. Non-text content
/// like images is not counted, matching how providers bill it separately.
pub fn count_input_tokens(request: &UnifiedRequest) -> u32 {
    let bpe = encoder();
    let mut total = 0usize;

    if let Some(system) = &request.system {
        total += bpe.encode_with_special_tokens(system).len();
    }

    for message in &request.messages {
        total += count_content(bpe, &message.content);

        if let Some(tool_calls) = &message.tool_calls {
            for call in tool_calls {
                total += bpe.encode_with_special_tokens(&call.function.name).len();
                total += count_arguments(bpe, &call.function.arguments);
            }
        }
    }

    if let Some(tools) = &request.tools {
        for tool in tools {
            total += bpe.encode_with_special_tokens(&tool.function.name).len();
            total += bpe.encode_with_special_tokens(&tool.function.description).len();
        }
    }

    total.min(u32::MAX as usize) as u32
}

fn count_content(bpe: &CoreBPE, content: &UnifiedContentContainer) -> usize {
    match content {
        UnifiedContentContainer::Text(text) => bpe.encode_with_special_tokens(text).len(),
        UnifiedContentContainer::Blocks(blocks) => blocks
            .iter()
            .map(|block| match block {
                UnifiedContent::Text { text } => bpe.encode_with_special_tokens(text).len(),
                UnifiedContent::ToolUse { input, .. } => {
                    bpe.encode_with_special_tokens(&input.to_string()).len()
                }
                UnifiedContent::ToolResult { content, .. } => {
                    let text = match content {
                        crate::messages::unified::UnifiedToolResultContent::Text(text) => text.clone(),
                        crate::messages::unified::UnifiedToolResultContent::Multiple(parts) => parts.join("\n"),
                    };
                    bpe.encode_with_special_tokens(&text).len()
                }
                UnifiedContent::Image { .. } => 0,
            })
            .sum(),
    }
}

fn count_arguments(bpe: &CoreBPE, arguments: &UnifiedArguments) -> usize {
    match arguments {
        UnifiedArguments::String(text) => bpe.encode_with_special_tokens(text).len(),
        UnifiedArguments::Value(value) => bpe.encode_with_special_tokens(&value.to_string()).len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::unified::{UnifiedMessage, UnifiedRole};

    #[test]
    fn counts_simple_text_message() {
        let request = UnifiedRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![UnifiedMessage {
                role: UnifiedRole::User,
                content: UnifiedContentContainer::Text("hello there".to_string()),
                tool_calls: None,
                tool_call_id: None,
            }],
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

        assert!(count_input_tokens(&request) > 0);
    }

    #[test]
    fn empty_request_counts_zero() {
        let request = UnifiedRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![],
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

        assert_eq!(count_input_tokens(&request), 0);
    }
}
