use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use config::{McpConfig, RateLimitConfig, RateLimitStorage as RateLimitStorageConfig, TelemetryConfig};

use crate::error::RateLimitError;
use crate::storage::{MemoryStorage, RateLimitContext, RateLimitStorage, RedisStorage, TracedRedisStorage};

enum Backend {
    Memory(MemoryStorage),
    Redis(TracedRedisStorage),
}

impl Backend {
    fn new(storage: &RateLimitStorageConfig) -> Result<Self, RateLimitError> {
        match storage {
            RateLimitStorageConfig::Memory => Ok(Self::Memory(MemoryStorage::new())),
            RateLimitStorageConfig::Redis(redis) => {
                let storage = RedisStorage::new(&redis.url, redis.key_prefix.clone())?;
                Ok(Self::Redis(TracedRedisStorage::new(storage)))
            }
        }
    }

    async fn check_and_consume(
        &self,
        context: &RateLimitContext<'_>,
        limit: u32,
        interval: Duration,
    ) -> Result<crate::storage::RateLimitResult, RateLimitError> {
        let result = match self {
            Self::Memory(storage) => storage.check_and_consume(context, limit, interval).await,
            Self::Redis(storage) => storage.check_and_consume(context, limit, interval).await,
        }?;

        Ok(result)
    }
}

/// Enforces request-count budgets: global, per source IP, and per downstream MCP server/tool.
///
/// Built once at startup from [`RateLimitConfig`] and shared across the HTTP server's request
/// path through `Arc`.
pub struct RateLimitManager {
    config: RateLimitConfig,
    mcp: McpConfig,
    backend: Backend,
}

impl RateLimitManager {
    /// Builds a manager backed by whichever storage `config.storage` selects.
    pub async fn new(config: RateLimitConfig, mcp: McpConfig, _telemetry: &TelemetryConfig) -> anyhow::Result<Self> {
        let backend = Backend::new(&config.storage)?;

        Ok(Self { config, mcp, backend })
    }

    /// Checks the global and per-IP budgets for an incoming HTTP request.
    pub async fn check_request(&self, request: &RateLimitRequest) -> Result<(), RateLimitError> {
        if let Some(global) = &self.config.global {
            self.enforce(RateLimitContext::Global, global.limit as u32, global.interval)
                .await?;
        }

        if let Some(per_ip) = &self.config.per_ip {
            self.enforce(
                RateLimitContext::PerIp { ip: &request.ip },
                per_ip.limit as u32,
                per_ip.interval,
            )
            .await?;
        }

        Ok(())
    }

    /// Checks the per-server budget configured for a downstream MCP server, if any.
    pub async fn check_mcp_server(&self, server: &str) -> Result<(), RateLimitError> {
        let Some(limits) = self.mcp.servers.get(server).and_then(|s| s.rate_limits()) else {
            return Ok(());
        };

        self.enforce(RateLimitContext::PerServer { server }, limits.limit, limits.interval)
            .await
    }

    /// Checks the per-tool budget for a tool on a downstream MCP server. Tools don't carry their
    /// own limit in configuration; they share their server's budget, tracked independently per
    /// tool so one noisy tool can't starve the others.
    pub async fn check_mcp_tool(&self, server: &str, tool: &str) -> Result<(), RateLimitError> {
        let Some(limits) = self.mcp.servers.get(server).and_then(|s| s.rate_limits()) else {
            return Ok(());
        };

        self.enforce(RateLimitContext::PerTool { server, tool }, limits.limit, limits.interval)
            .await
    }

    async fn enforce(&self, context: RateLimitContext<'_>, limit: u32, interval: Duration) -> Result<(), RateLimitError> {
        let result = self.backend.check_and_consume(&context, limit, interval).await?;

        if result.allowed { Ok(()) } else { Err(RateLimitError::Exceeded) }
    }
}

/// What to check a request's budget against. Built via [`RateLimitRequest::builder`].
#[derive(Debug, Clone)]
pub struct RateLimitRequest {
    /// The caller's IP, used for the per-IP budget.
    pub ip: IpAddr,
}

impl RateLimitRequest {
    /// Starts building a request.
    pub fn builder() -> RateLimitRequestBuilder {
        RateLimitRequestBuilder::default()
    }
}

/// Builder for [`RateLimitRequest`].
#[derive(Debug, Default)]
pub struct RateLimitRequestBuilder {
    ip: Option<IpAddr>,
}

impl RateLimitRequestBuilder {
    /// Sets the caller's IP.
    pub fn ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    /// Finishes the request, defaulting to the unspecified address if no IP was set.
    pub fn build(self) -> RateLimitRequest {
        RateLimitRequest {
            ip: self.ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        }
    }
}
