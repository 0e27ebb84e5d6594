//! Parses OpenAI's native response and streaming chunk formats and folds them into the
//! provider-tagged unified chunk stream.

use crate::messages::{openai, unified};

pub(crate) type OpenAIResponse = openai::ChatCompletionResponse;
pub(crate) type OpenAIStreamChunk = openai::ChatCompletionChunk;

impl openai::ChatCompletionChunk {
    /// Converts a raw streaming chunk into the unified shape, tagging the model with the
    /// configured provider name the way `/v1/models` does for non-streaming listings.
    pub(crate) fn into_chunk(self, provider_name: &str) -> unified::UnifiedChunk {
        let mut chunk = unified::UnifiedChunk::from(self);
        chunk.model = format!("{provider_name}/{}", chunk.model).into();
        chunk
    }
}
