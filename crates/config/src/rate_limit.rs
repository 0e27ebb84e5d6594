//! Request-level and token-budget rate limiting configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use duration_str::deserialize_duration;
use serde::Deserialize;

/// Rate limiting applied to incoming HTTP requests, independent of LLM token budgets.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Whether request rate limiting is enforced.
    pub enabled: bool,

    /// Backend used to track request counts.
    pub storage: RateLimitStorage,

    /// Limit applied across all callers.
    pub global: Option<GlobalRateLimit>,

    /// Limit applied per source IP.
    pub per_ip: Option<PerIpRateLimit>,
}

/// Where rate limit counters are tracked.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitStorage {
    /// Counters live in process memory. Lost on restart, not shared across replicas.
    #[default]
    Memory,
    /// Counters live in Redis, shared across gateway replicas.
    Redis(RedisRateLimitConfig),
}

/// Connection details for the Redis-backed rate limit storage.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisRateLimitConfig {
    /// Redis connection URL.
    pub url: String,
    /// Prefix applied to every rate limit key, to share a Redis instance safely.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "gateway:rate_limit".to_string()
}

/// A request budget shared across all callers.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GlobalRateLimit {
    /// Maximum requests allowed per interval.
    pub limit: u64,
    /// Window the limit applies over.
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
}

/// A request budget applied per source IP.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerIpRateLimit {
    /// Maximum requests allowed per interval.
    pub limit: u64,
    /// Window the limit applies over.
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
}

/// Token-budget rate limits for an LLM provider or model.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TokenRateLimitsConfig {
    /// Limits applied per authenticated client identity.
    pub per_user: Option<PerUserRateLimits>,
}

/// Per-client token budget, with optional overrides for specific client groups.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerUserRateLimits {
    /// Default input token budget for clients not matched by `groups`.
    pub input_token_limit: u64,
    /// Window the budget applies over.
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
    /// Per-group overrides, keyed by the group name from client identification.
    #[serde(default)]
    pub groups: BTreeMap<String, TokenRateLimit>,
}

/// A single token budget: N input tokens per interval.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenRateLimit {
    /// Input token budget.
    pub input_token_limit: u64,
    /// Window the budget applies over.
    #[serde(deserialize_with = "deserialize_duration")]
    pub interval: Duration,
}
