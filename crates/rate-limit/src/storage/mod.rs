mod memory;
mod redis;

use std::net::IpAddr;
use std::time::Duration;

use thiserror::Error;

pub(crate) use memory::MemoryStorage;
pub(crate) use redis::RedisStorage;
pub(crate) use redis::tracing::TracedRedisStorage;

/// What a request-count check is scoped to.
#[derive(Debug, Clone, Copy)]
pub enum RateLimitContext<'a> {
    /// Shared across every caller.
    Global,
    /// Scoped to a single source IP.
    PerIp {
        /// The caller's IP address.
        ip: &'a IpAddr,
    },
    /// Scoped to a single downstream MCP server.
    PerServer {
        /// The server's name, as configured.
        server: &'a str,
    },
    /// Scoped to a single tool on a single downstream MCP server.
    PerTool {
        /// The server's name, as configured.
        server: &'a str,
        /// The tool's name.
        tool: &'a str,
    },
}

/// What a token-budget check is scoped to.
#[derive(Debug, Clone, Copy)]
pub struct TokenRateLimitContext<'a> {
    /// The authenticated client identity, from client identification.
    pub client_id: &'a str,
    /// The client's group, if client identification resolved one.
    pub group: Option<&'a str>,
    /// The LLM provider name the request is routed to.
    pub provider: &'a str,
    /// The model name the request is routed to, if known.
    pub model: Option<&'a str>,
}

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateLimitResult {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// How long the caller should wait before the budget replenishes, if known.
    pub retry_after: Option<Duration>,
}

/// Failure of the underlying storage backend, independent of whether a limit was hit.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Couldn't reach or check out a connection to the backend.
    #[error("connection error: {0}")]
    Connection(String),
    /// The backend rejected or failed to execute the rate limit query.
    #[error("query error: {0}")]
    Query(String),
    /// Anything else, including bugs in quota construction.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Backend that tracks and enforces rate limit counters.
///
/// Implemented by an in-process (`governor` + `mini-moka`) backend and a Redis-backed one, so a
/// single gateway replica and a fleet behind Redis share the same enforcement semantics.
pub(crate) trait RateLimitStorage: Send + Sync {
    /// Consume one unit of budget for `context`, returning whether it was within `limit` per
    /// `interval`.
    async fn check_and_consume(
        &self,
        context: &RateLimitContext<'_>,
        limit: u32,
        interval: Duration,
    ) -> Result<RateLimitResult, StorageError>;

    /// Consume `tokens` units of budget for `context`, returning whether it was within `limit`
    /// per `interval`.
    async fn check_and_consume_tokens(
        &self,
        context: &TokenRateLimitContext<'_>,
        tokens: u32,
        limit: u32,
        interval: Duration,
    ) -> Result<RateLimitResult, StorageError>;
}
