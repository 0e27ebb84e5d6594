use std::time::Duration;

use config::{RateLimitStorage as RateLimitStorageConfig, TelemetryConfig, TokenRateLimitsConfig};

use crate::error::RateLimitError;
use crate::storage::{MemoryStorage, RateLimitStorage, RedisStorage, TokenRateLimitContext, TracedRedisStorage};

enum Backend {
    Memory(MemoryStorage),
    Redis(TracedRedisStorage),
}

/// Enforces per-client input-token budgets against LLM providers and models.
///
/// Only constructed when at least one provider or model has token rate limits configured; see
/// the LLM server's builder.
pub struct TokenRateLimitManager {
    backend: Backend,
}

impl TokenRateLimitManager {
    /// Builds a manager backed by whichever storage `storage` selects. Shares the same storage
    /// backend kind as [`crate::RateLimitManager`], but tracks an independent set of counters.
    pub async fn new(storage: &RateLimitStorageConfig, _telemetry: &TelemetryConfig) -> Result<Self, RateLimitError> {
        let backend = match storage {
            RateLimitStorageConfig::Memory => Backend::Memory(MemoryStorage::new()),
            RateLimitStorageConfig::Redis(redis) => {
                Backend::Redis(TracedRedisStorage::new(RedisStorage::new(&redis.url, redis.key_prefix.clone())?))
            }
        };

        Ok(Self { backend })
    }

    /// Checks whether `request` fits within the client's token budget, given the model's limits
    /// (if configured) falling back to the provider's. Returns `Ok(None)` when no limits apply,
    /// `Ok(Some(duration))` with how long to wait when the budget is exhausted but satisfiable,
    /// and a `Duration::MAX` wait when the request alone exceeds the budget and can never
    /// succeed.
    pub async fn check_request(
        &self,
        request: &TokenRateLimitRequest,
        provider_limits: Option<&TokenRateLimitsConfig>,
        model_limits: Option<&TokenRateLimitsConfig>,
    ) -> Result<Option<Duration>, RateLimitError> {
        let Some(per_user) = model_limits.or(provider_limits).and_then(|limits| limits.per_user.as_ref()) else {
            return Ok(None);
        };

        let (limit, interval) = request
            .group
            .as_deref()
            .and_then(|group| per_user.groups.get(group))
            .map(|group_limit| (group_limit.input_token_limit, group_limit.interval))
            .unwrap_or((per_user.input_token_limit, per_user.interval));

        if request.input_tokens as u64 > limit {
            return Ok(Some(Duration::MAX));
        }

        let limit = u32::try_from(limit).unwrap_or(u32::MAX);

        let context = TokenRateLimitContext {
            client_id: &request.client_id,
            group: request.group.as_deref(),
            provider: &request.provider,
            model: request.model.as_deref(),
        };

        let result = match &self.backend {
            Backend::Memory(storage) => {
                storage
                    .check_and_consume_tokens(&context, request.input_tokens, limit, interval)
                    .await
            }
            Backend::Redis(storage) => {
                storage
                    .check_and_consume_tokens(&context, request.input_tokens, limit, interval)
                    .await
            }
        }?;

        if result.allowed {
            Ok(None)
        } else {
            Ok(Some(result.retry_after.unwrap_or(interval)))
        }
    }
}

/// A single token-budget check against an LLM provider/model.
#[derive(Debug, Clone)]
pub struct TokenRateLimitRequest {
    /// The authenticated client identity.
    pub client_id: String,
    /// The client's group, if client identification resolved one.
    pub group: Option<String>,
    /// The LLM provider the request is routed to.
    pub provider: String,
    /// The model the request is routed to, if known.
    pub model: Option<String>,
    /// Input tokens this request would consume.
    pub input_tokens: u32,
}
