mod builder;
mod handler;
mod metrics;
mod model_discovery;
mod service;
mod tracing;

pub(crate) use builder::LlmServerBuilder;
pub(crate) use handler::Server as LlmHandler;
use model_discovery::ModelDiscovery;
pub(crate) use service::LlmService;

use std::sync::Arc;

use config::{ApiProviderConfig, LlmConfig};
use futures::stream::StreamExt;
use rate_limit::{TokenRateLimitManager, TokenRateLimitRequest};

use crate::{
    error::LlmError,
    messages::{
        openai::{ModelsResponse, ObjectType},
        unified::{UnifiedRequest, UnifiedResponse},
    },
    provider::{ChatCompletionStream, Provider, anthropic::AnthropicProvider, openai::OpenAIProvider},
    request::RequestContext,
};

const X_MODEL_PROVIDER_HEADER: &str = "x-model-provider";
const DEFAULT_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
const BUILTIN_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Wire format spoken by an ad-hoc (unconfigured) provider resolved from the known provider table
/// or from a bare `url@model` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wire {
    OpenAi,
    Anthropic,
}

/// Known provider keys and their default base URLs, per the routing rules.
/// Order doesn't matter; lookups are by key after lowercasing.
const KNOWN_PROVIDERS: &[(&str, &str, Wire)] = &[
    ("openai", "https://api.openai.com/v1", Wire::OpenAi),
    ("groq", "https://api.groq.com/openai/v1", Wire::OpenAi),
    ("anthropic", "https://api.anthropic.com/v1", Wire::Anthropic),
    ("claude", "https://api.anthropic.com/v1", Wire::Anthropic),
    ("togetherai", "https://api.together.xyz/v1", Wire::OpenAi),
    (
        "gemini",
        "https://generativelanguage.googleapis.com/v1beta/openai",
        Wire::OpenAi,
    ),
    (
        "google",
        "https://generativelanguage.googleapis.com/v1beta/openai",
        Wire::OpenAi,
    ),
    ("deepseek", "https://api.deepseek.com/v1", Wire::OpenAi),
    ("xai", "https://api.x.ai/v1", Wire::OpenAi),
    ("ollama", "http://localhost:11434/v1", Wire::OpenAi),
];

fn lookup_known_provider(key: &str) -> Option<(&'static str, Wire)> {
    let key = key.to_lowercase();

    KNOWN_PROVIDERS
        .iter()
        .find(|(name, _, _)| *name == key)
        .map(|(name, _base_url, wire)| (*name, *wire))
}

#[derive(Clone)]
pub(crate) struct LlmServer {
    shared: Arc<LlmServerInner>,
}

pub(crate) struct LlmServerInner {
    /// Live provider handles configured at startup, keyed by their config name.
    pub(crate) providers: Vec<Box<dyn Provider>>,
    /// Resolved configuration snapshot used for routing and limits.
    pub(crate) config: LlmConfig,
    /// Optional token rate limiter shared across providers.
    pub(crate) token_rate_limiter: Option<TokenRateLimitManager>,
    /// Model discovery and caching across configured providers.
    model_discovery: ModelDiscovery,
}

/// The outcome of resolving a `provider@model` / `url@model` string per the routing rules.
enum ResolvedModelRoute<'a> {
    /// Matched a provider configured at startup; dispatch through it directly.
    Configured {
        provider_index: usize,
        model_name: &'a str,
    },
    /// No configured provider matched; dispatch through an ad-hoc provider built from the
    /// resolved base URL, forwarding the caller's own credentials.
    AdHoc {
        system_name: String,
        base_url: String,
        wire: Wire,
        model_name: &'a str,
    },
}

impl ResolvedModelRoute<'_> {
    fn model_name(&self) -> &str {
        match self {
            Self::Configured { model_name, .. } => model_name,
            Self::AdHoc { model_name, .. } => model_name,
        }
    }

    fn provider_name(&self, providers: &[Box<dyn Provider>]) -> String {
        match self {
            Self::Configured { provider_index, .. } => providers[*provider_index].name().to_string(),
            Self::AdHoc { system_name, .. } => system_name.clone(),
        }
    }
}

impl LlmServer {
    /// Process a unified chat completion request (protocol-agnostic).
    pub async fn unified_completions(
        &self,
        request: UnifiedRequest,
        context: &RequestContext,
    ) -> crate::Result<UnifiedResponse> {
        let original_model = request.model.clone();
        let route = self.resolve_model_route(&original_model, context)?;

        self.check_and_enforce_rate_limit(&request, context, &route).await?;

        let ad_hoc_provider;
        let provider: &dyn Provider = match &route {
            ResolvedModelRoute::Configured { provider_index, .. } => self.shared.providers[*provider_index].as_ref(),
            ResolvedModelRoute::AdHoc {
                system_name,
                base_url,
                wire,
                ..
            } => {
                ad_hoc_provider = build_ad_hoc_provider(system_name, base_url, *wire)?;
                ad_hoc_provider.as_ref()
            }
        };

        let mut modified_request = request;
        modified_request.model = route.model_name().to_string();

        let unified_response = provider.chat_completion(modified_request, context).await?;

        let mut final_response = unified_response;
        final_response.model = original_model;

        Ok(final_response)
    }

    /// Process a unified streaming chat completion request (protocol-agnostic).
    pub async fn unified_completions_stream(
        &self,
        request: UnifiedRequest,
        context: &RequestContext,
    ) -> crate::Result<ChatCompletionStream> {
        let original_model = request.model.clone();
        let route = self.resolve_model_route(&original_model, context)?;

        self.check_and_enforce_rate_limit(&request, context, &route).await?;

        let ad_hoc_provider;
        let provider: &dyn Provider = match &route {
            ResolvedModelRoute::Configured { provider_index, .. } => self.shared.providers[*provider_index].as_ref(),
            ResolvedModelRoute::AdHoc {
                system_name,
                base_url,
                wire,
                ..
            } => {
                ad_hoc_provider = build_ad_hoc_provider(system_name, base_url, *wire)?;
                ad_hoc_provider.as_ref()
            }
        };

        if !provider.supports_streaming() {
            let provider_name = route.provider_name(&self.shared.providers);
            log::debug!("Provider '{provider_name}' does not support streaming");
            return Err(LlmError::StreamingNotSupported);
        }

        let mut modified_request = request;
        modified_request.model = route.model_name().to_string();

        let stream = provider.chat_completion_stream(modified_request, context).await?;

        let transformed_stream = stream.map(move |chunk_result| {
            chunk_result.map(|mut chunk| {
                chunk.model = original_model.clone().into();
                chunk
            })
        });

        Ok(Box::pin(transformed_stream))
    }

    /// Resolve a `provider@model` / `url@model` string into a dispatchable route.
    ///
    /// Rules, in order:
    /// 1. Split once on `@`. If the left side starts with `http://`/`https://`, route ad-hoc
    ///    to that base URL with system name "UNKNOWN".
    /// 2. Else look up the (lowercased) left side in the known provider table; prefer a
    ///    configured provider of that name, else build an ad-hoc one from the table's default.
    /// 3. Else, if the `x-model-provider` header names a known provider, use that.
    /// 4. Else fall back to `OPENAI_BASE_URL` or the built-in OpenAI default.
    fn resolve_model_route<'a>(
        &'a self,
        requested_model: &'a str,
        context: &RequestContext,
    ) -> crate::Result<ResolvedModelRoute<'a>> {
        let Some((left, model_name)) = requested_model.split_once('@') else {
            return Err(LlmError::InvalidModelFormat(requested_model.to_string()));
        };

        if model_name.is_empty() {
            return Err(LlmError::InvalidModelFormat(requested_model.to_string()));
        }

        if left.starts_with("http://") || left.starts_with("https://") {
            return Ok(ResolvedModelRoute::AdHoc {
                system_name: "UNKNOWN".to_string(),
                base_url: left.to_string(),
                wire: Wire::OpenAi,
                model_name,
            });
        }

        if let Some(provider_index) = self
            .shared
            .providers
            .iter()
            .position(|provider| provider.name().eq_ignore_ascii_case(left))
        {
            return Ok(ResolvedModelRoute::Configured {
                provider_index,
                model_name,
            });
        }

        if let Some((system_name, wire)) = lookup_known_provider(left) {
            return Ok(ResolvedModelRoute::AdHoc {
                system_name: system_name.to_string(),
                base_url: wire_default_base_url(system_name, wire),
                wire,
                model_name,
            });
        }

        if let Some(header_provider) = context
            .headers
            .get(X_MODEL_PROVIDER_HEADER)
            .and_then(|v| v.to_str().ok())
            && let Some((system_name, wire)) = lookup_known_provider(header_provider)
        {
            return Ok(ResolvedModelRoute::AdHoc {
                system_name: system_name.to_string(),
                base_url: wire_default_base_url(system_name, wire),
                wire,
                model_name,
            });
        }

        log::debug!(
            "Provider prefix '{left}' did not match a configured or known provider; falling back to {DEFAULT_BASE_URL_ENV} default"
        );

        let base_url = std::env::var(DEFAULT_BASE_URL_ENV).unwrap_or_else(|_| BUILTIN_DEFAULT_BASE_URL.to_string());

        Ok(ResolvedModelRoute::AdHoc {
            system_name: "UNKNOWN".to_string(),
            base_url,
            wire: Wire::OpenAi,
            model_name: requested_model,
        })
    }

    /// Check token rate limits for a request.
    ///
    /// Returns the duration to wait before retrying if rate limited, or None if the request can proceed.
    async fn check_token_rate_limit(
        &self,
        request: &UnifiedRequest,
        context: &RequestContext,
        route: &ResolvedModelRoute<'_>,
    ) -> Option<std::time::Duration> {
        let Some(ref client_identity) = context.client_identity else {
            log::debug!(
                "No client_id found in request context. \
                Token rate limiting requires client identification to be enabled and a client_id to be present."
            );
            return None;
        };

        let provider_name = route.provider_name(&self.shared.providers);

        log::debug!(
            "Checking token rate limit for client_id={}, group={:?}, model={}, provider={}",
            client_identity.client_id,
            client_identity.group,
            route.model_name(),
            provider_name,
        );

        let provider_config = self.shared.config.providers.get(&provider_name)?;
        let models = provider_config.models();
        let model_config = models.get(route.model_name());

        let Some(ref token_rate_limiter) = self.shared.token_rate_limiter else {
            log::debug!(
                "Token rate limiter not initialized - no providers have token rate limits configured. \
                Allowing request without token rate limiting."
            );
            return None;
        };

        let (provider_limits, model_limits) = (
            provider_config.rate_limits(),
            model_config.and_then(|m| m.rate_limits()),
        );

        let input_tokens = crate::token_counter::count_input_tokens(request);

        log::debug!("Token accounting: input={input_tokens} (output tokens not counted for rate limiting)",);

        let token_request = TokenRateLimitRequest {
            client_id: client_identity.client_id.clone(),
            group: client_identity.group.clone(),
            provider: provider_name.clone(),
            model: Some(route.model_name().to_string()),
            input_tokens,
        };

        match token_rate_limiter
            .check_request(&token_request, provider_limits, model_limits)
            .await
        {
            Ok(duration) => duration,
            Err(e) => {
                log::error!("Error checking token rate limit: {e}");
                None
            }
        }
    }

    /// Check rate limits and return an error if exceeded.
    async fn check_and_enforce_rate_limit(
        &self,
        request: &UnifiedRequest,
        context: &RequestContext,
        route: &ResolvedModelRoute<'_>,
    ) -> crate::Result<()> {
        if let Some(wait_duration) = self.check_token_rate_limit(request, context, route).await {
            if wait_duration == std::time::Duration::MAX {
                log::debug!("Request requires more tokens than rate limit allows - cannot be fulfilled");

                return Err(LlmError::RateLimitExceeded {
                    message: "Token rate limit exceeded. Request requires more tokens than the configured limit allows and cannot be fulfilled.".to_string(),
                });
            } else {
                log::debug!("Request rate limited, need to wait {wait_duration:?}");

                return Err(LlmError::RateLimitExceeded {
                    message: "Token rate limit exceeded. Please try again later.".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn wire_default_base_url(_system_name: &str, wire: Wire) -> String {
    KNOWN_PROVIDERS
        .iter()
        .find(|(_, _, w)| *w == wire)
        .map(|(_, url, _)| url.to_string())
        .unwrap_or_else(|| BUILTIN_DEFAULT_BASE_URL.to_string())
}

/// Build a provider that was not configured at startup: either a bare `url@model` request or a
/// known-provider-table match without a matching entry in `llm.providers`. Always forwards the
/// caller's own credentials (BYOK) since there is no configured API key to use instead.
fn build_ad_hoc_provider(system_name: &str, base_url: &str, wire: Wire) -> crate::Result<Box<dyn Provider>> {
    let ad_hoc_config = ApiProviderConfig {
        api_key: None,
        base_url: Some(base_url.to_string()),
        forward_token: true,
        model_filter: None,
        models: Default::default(),
        rate_limits: None,
        headers: Vec::new(),
    };

    let provider: Box<dyn Provider> = match wire {
        Wire::OpenAi => Box::new(OpenAIProvider::new(system_name.to_string(), ad_hoc_config)?),
        Wire::Anthropic => Box::new(AnthropicProvider::new(system_name.to_string(), ad_hoc_config)?),
    };

    Ok(provider)
}

impl LlmService for LlmServer {
    async fn models(&self) -> ModelsResponse {
        let models = self.shared.model_discovery.get_all_models(&self.shared.providers).await;

        ModelsResponse {
            object: ObjectType::List,
            data: models,
        }
    }

    async fn completions(&self, request: UnifiedRequest, context: &RequestContext) -> crate::Result<UnifiedResponse> {
        self.unified_completions(request, context).await
    }

    async fn completions_stream(
        &self,
        request: UnifiedRequest,
        context: &RequestContext,
    ) -> crate::Result<ChatCompletionStream> {
        self.unified_completions_stream(request, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use indoc::indoc;
    use std::sync::Arc;

    struct DummyProvider {
        name: String,
    }

    impl DummyProvider {
        fn new(name: impl Into<String>) -> Self {
            Self { name: name.into() }
        }
    }

    #[async_trait]
    impl Provider for DummyProvider {
        async fn chat_completion(
            &self,
            _request: crate::messages::unified::UnifiedRequest,
            _context: &crate::request::RequestContext,
        ) -> crate::Result<crate::messages::unified::UnifiedResponse> {
            Err(crate::error::LlmError::InternalError(None))
        }

        async fn chat_completion_stream(
            &self,
            _request: crate::messages::unified::UnifiedRequest,
            _context: &crate::request::RequestContext,
        ) -> crate::Result<crate::provider::ChatCompletionStream> {
            Err(crate::error::LlmError::StreamingNotSupported)
        }

        async fn list_models(&self) -> anyhow::Result<Vec<crate::messages::openai::Model>> {
            Ok(Vec::new())
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn supports_streaming(&self) -> bool {
            false
        }
    }

    fn build_test_server(toml: &str) -> LlmServer {
        let config: LlmConfig = toml::from_str(toml).expect("valid LLM config");
        let provider_names: Vec<String> = config.providers.keys().cloned().collect();

        let providers: Vec<Box<dyn Provider>> = provider_names
            .iter()
            .map(|name| Box::new(DummyProvider::new(name.clone())) as Box<dyn Provider>)
            .collect();

        let model_discovery = ModelDiscovery::new();

        LlmServer {
            shared: Arc::new(LlmServerInner {
                providers,
                config,
                token_rate_limiter: None,
                model_discovery,
            }),
        }
    }

    #[test]
    fn routes_configured_provider_by_exact_name() {
        let server = build_test_server(indoc! {r#"
            [providers.openai]
            type = "openai"
            api_key = "test"
        "#});

        let route = server
            .resolve_model_route("openai@gpt-4o-mini", &RequestContext::default())
            .expect("route should resolve");

        assert!(matches!(route, ResolvedModelRoute::Configured { .. }));
        assert_eq!(route.model_name(), "gpt-4o-mini");
        assert_eq!(route.provider_name(&server.shared.providers), "openai");
    }

    #[test]
    fn routes_known_provider_without_configuration_ad_hoc() {
        let server = build_test_server("");

        let route = server
            .resolve_model_route("groq@llama-3.1-70b", &RequestContext::default())
            .expect("route should resolve");

        match route {
            ResolvedModelRoute::AdHoc {
                system_name,
                base_url,
                ..
            } => {
                assert_eq!(system_name, "groq");
                assert_eq!(base_url, "https://api.groq.com/openai/v1");
            }
            ResolvedModelRoute::Configured { .. } => panic!("expected ad-hoc route"),
        }
    }

    #[test]
    fn routes_absolute_url_prefix_ad_hoc() {
        let server = build_test_server("");

        let route = server
            .resolve_model_route("https://my-proxy.internal/v1@gpt-4o", &RequestContext::default())
            .expect("route should resolve");

        match route {
            ResolvedModelRoute::AdHoc {
                system_name,
                base_url,
                model_name,
                ..
            } => {
                assert_eq!(system_name, "UNKNOWN");
                assert_eq!(base_url, "https://my-proxy.internal/v1");
                assert_eq!(model_name, "gpt-4o");
            }
            ResolvedModelRoute::Configured { .. } => panic!("expected ad-hoc route"),
        }
    }

    #[test]
    fn falls_back_to_default_base_url_for_unknown_prefix() {
        let server = build_test_server("");

        let route = server
            .resolve_model_route("mystery@some-model", &RequestContext::default())
            .expect("route should resolve");

        match route {
            ResolvedModelRoute::AdHoc {
                system_name,
                model_name,
                ..
            } => {
                assert_eq!(system_name, "UNKNOWN");
                assert_eq!(model_name, "mystery@some-model");
            }
            ResolvedModelRoute::Configured { .. } => panic!("expected ad-hoc route"),
        }
    }

    #[test]
    fn rejects_model_without_at_separator() {
        let server = build_test_server("");

        let error = server
            .resolve_model_route("gpt-4o-mini", &RequestContext::default())
            .expect_err("should reject missing @ separator");

        assert!(matches!(error, LlmError::InvalidModelFormat(_)));
    }
}
