//! Upstream LLM provider abstraction.
//!
//! Every provider this build speaks implements [`Provider`], giving the server a single
//! interface regardless of whether requests end up at OpenAI, Anthropic, or an OpenAI-compatible
//! third party reached through the `@`-based provider router.

pub(crate) mod anthropic;
pub(crate) mod http_client;
pub(crate) mod openai;
pub(crate) mod token;

use std::pin::Pin;

use async_trait::async_trait;
use config::HeaderRule;
use futures::Stream;
use reqwest::{Client, Method, RequestBuilder};

use crate::{
    messages::{
        openai::Model,
        unified::{UnifiedChunk, UnifiedRequest, UnifiedResponse},
    },
    request::RequestContext,
};

/// A stream of unified chat completion chunks, as returned by a streaming request.
pub type ChatCompletionStream =
    Pin<Box<dyn Stream<Item = crate::Result<UnifiedChunk>> + Send>>;

/// An upstream LLM provider capable of serving chat completions.
#[async_trait]
pub(crate) trait Provider: Send + Sync {
    /// Perform a non-streaming chat completion request.
    async fn chat_completion(
        &self,
        request: UnifiedRequest,
        context: &RequestContext,
    ) -> crate::Result<UnifiedResponse>;

    /// Perform a streaming chat completion request.
    async fn chat_completion_stream(
        &self,
        request: UnifiedRequest,
        context: &RequestContext,
    ) -> crate::Result<ChatCompletionStream>;

    /// List the models this provider currently exposes.
    async fn list_models(&self) -> anyhow::Result<Vec<Model>>;

    /// The provider's configured name, used as the left-hand side of `provider@model` routing.
    fn name(&self) -> &str;

    /// Whether this provider can serve streaming responses.
    fn supports_streaming(&self) -> bool;
}

/// A [`Provider`] that talks plain HTTP, giving it a shared way to build outbound requests with
/// configured header rules applied.
pub(crate) trait HttpProvider {
    /// Header transformation rules configured for this provider.
    fn get_provider_headers(&self) -> &[HeaderRule];

    /// The shared HTTP client used for outbound requests.
    fn get_http_client(&self) -> &Client;

    /// Build a request, applying provider-level and then model-level header rules (model rules
    /// take precedence since they're applied last) against the inbound request's own headers.
    fn request_builder(
        &self,
        method: Method,
        url: &str,
        context: &RequestContext,
        model_config: Option<&config::ModelConfig>,
    ) -> RequestBuilder {
        let mut rules = self.get_provider_headers().to_vec();

        if let Some(model_config) = model_config {
            rules.extend(model_config.headers().iter().cloned());
        }

        let outbound_headers = header_rules::apply(&context.headers, &rules);

        self.get_http_client().request(method, url).headers(outbound_headers)
    }
}

// Note: `context.headers` is an `axum::http::HeaderMap`; `header_rules::apply` and
// `reqwest::header::HeaderMap` both alias the same underlying `http` crate type, so this
// conversion is free.

/// Resolves model aliases and renames configured for a provider, and tracks which model ids
/// were explicitly configured so they can always be listed even if discovery doesn't find them.
pub(crate) struct ModelManager {
    models: indexmap::IndexMap<String, config::ModelConfig>,
    provider_name: String,
}

impl ModelManager {
    pub fn new(models: indexmap::IndexMap<String, config::ModelConfig>, provider_name: &str) -> Self {
        Self {
            models,
            provider_name: provider_name.to_string(),
        }
    }

    /// Resolve a requested model id to the actual upstream model name, following a configured
    /// rename if one exists. Returns `None` if the model isn't configured at all.
    pub fn resolve_model(&self, requested: &str) -> Option<String> {
        let config = self.models.get(requested)?;
        Some(config.rename().unwrap_or(requested).to_string())
    }

    /// Look up the configuration for a requested model id, by its configured alias (not its
    /// resolved upstream name).
    pub fn get_model_config(&self, requested: &str) -> Option<&config::ModelConfig> {
        self.models.get(requested)
    }

    /// All explicitly configured models, formatted for the `/v1/models` listing.
    pub fn get_configured_models(&self) -> Vec<Model> {
        self.models
            .keys()
            .map(|id| Model {
                id: id.clone(),
                object: crate::messages::openai::ObjectType::Model,
                created: 0,
                owned_by: self.provider_name.clone(),
            })
            .collect()
    }
}
