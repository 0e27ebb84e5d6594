//! In-process entrypoint for chat completions, for callers that live inside the gateway process
//! rather than behind the HTTP router.
//!
//! The response orchestrator drives multi-turn tool loops against the same provider registry the
//! `/v1/chat/completions` endpoint uses, so it goes through [`CompletionClient`] instead of
//! building its own provider stack.

use std::sync::Arc;

pub use crate::messages::openai::JsonSchema;
pub use crate::messages::unified::{
    UnifiedArguments, UnifiedChoice, UnifiedChoiceDelta, UnifiedChunk, UnifiedContent, UnifiedContentContainer, UnifiedFinishReason,
    UnifiedFunction, UnifiedFunctionCall, UnifiedFunctionChoice, UnifiedFunctionDelta, UnifiedFunctionStart, UnifiedImageSource,
    UnifiedMessage, UnifiedMessageDelta, UnifiedMetadata, UnifiedRequest, UnifiedResponse, UnifiedRole, UnifiedStopReason,
    UnifiedStreamingToolCall, UnifiedTool, UnifiedToolCall, UnifiedToolChoice, UnifiedToolChoiceMode, UnifiedUsage,
};
pub use crate::provider::ChatCompletionStream;
pub use crate::request::RequestContext;

use crate::server::{LlmHandler, LlmServerBuilder};

/// Shared handle to the configured provider registry.
///
/// Cloning is cheap; internally this is an `Arc` over the same handler the LLM HTTP router uses,
/// including whatever metrics/tracing wrapping the configuration enables.
#[derive(Clone)]
pub struct CompletionClient {
    handler: Arc<LlmHandler>,
}

impl CompletionClient {
    /// Build a client from the gateway's configuration, initializing every configured provider.
    pub async fn new(config: &config::Config) -> anyhow::Result<Self> {
        let handler = LlmServerBuilder::new(config)
            .build()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to initialize LLM client: {e}"))?;

        Ok(Self {
            handler: Arc::new(handler),
        })
    }

    /// Perform a non-streaming chat completion against the routed provider.
    pub async fn complete(&self, request: UnifiedRequest, context: &RequestContext) -> crate::Result<UnifiedResponse> {
        self.handler.completions(request, context).await
    }

    /// Perform a streaming chat completion against the routed provider.
    pub async fn complete_stream(
        &self,
        request: UnifiedRequest,
        context: &RequestContext,
    ) -> crate::Result<ChatCompletionStream> {
        self.handler.completions_stream(request, context).await
    }
}
