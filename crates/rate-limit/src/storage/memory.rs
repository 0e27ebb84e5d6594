use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{
    Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use mini_moka::sync::Cache;

use super::{RateLimitContext, RateLimitResult, RateLimitStorage, StorageError, TokenRateLimitContext};

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// In-process rate limit counters. Each distinct (scope, limit, interval) combination gets its
/// own `governor` token bucket, cached by key so repeated requests from the same caller reuse
/// the same bucket instead of resetting it.
pub(crate) struct MemoryStorage {
    limiters: Cache<String, Arc<Limiter>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            // Buckets for callers that stop sending traffic are dropped after a few idle
            // intervals so memory doesn't grow unbounded with one-off IPs.
            limiters: Cache::builder().time_to_idle(Duration::from_secs(3600)).build(),
        }
    }

    fn limiter_for(&self, key: String, limit: u32, interval: Duration) -> Result<Arc<Limiter>, StorageError> {
        if let Some(limiter) = self.limiters.get(&key) {
            return Ok(limiter);
        }

        let quota = build_quota(limit, interval)?;
        let limiter = Arc::new(RateLimiter::direct(quota));
        self.limiters.insert(key, limiter.clone());

        Ok(limiter)
    }

    fn check(&self, key: String, amount: u32, limit: u32, interval: Duration) -> Result<RateLimitResult, StorageError> {
        let limiter = self.limiter_for(key, limit, interval)?;

        let cells = NonZeroU32::new(amount.max(1)).expect("amount.max(1) is never zero");

        match limiter.check_n(cells) {
            Ok(Ok(())) => Ok(RateLimitResult {
                allowed: true,
                retry_after: None,
            }),
            Ok(Err(not_until)) => Ok(RateLimitResult {
                allowed: false,
                retry_after: Some(not_until.wait_time_from(governor::clock::Clock::now(&DefaultClock::default()))),
            }),
            // The request alone needs more cells than the bucket can ever hold.
            Err(_insufficient_capacity) => Ok(RateLimitResult {
                allowed: false,
                retry_after: None,
            }),
        }
    }
}

fn build_quota(limit: u32, interval: Duration) -> Result<Quota, StorageError> {
    let limit = NonZeroU32::new(limit.max(1)).expect("limit.max(1) is never zero");
    let period = interval
        .checked_div(limit.get())
        .filter(|period| !period.is_zero())
        .unwrap_or(Duration::from_nanos(1));

    Quota::with_period(period)
        .ok_or_else(|| StorageError::Internal("rate limit interval produced an invalid quota period".to_string()))
        .map(|quota| quota.allow_burst(limit))
}

impl RateLimitStorage for MemoryStorage {
    async fn check_and_consume(
        &self,
        context: &RateLimitContext<'_>,
        limit: u32,
        interval: Duration,
    ) -> Result<RateLimitResult, StorageError> {
        let key = match context {
            RateLimitContext::Global => "global".to_string(),
            RateLimitContext::PerIp { ip } => format!("ip:{ip}"),
            RateLimitContext::PerServer { server } => format!("mcp-server:{server}"),
            RateLimitContext::PerTool { server, tool } => format!("mcp-tool:{server}:{tool}"),
        };

        self.check(key, 1, limit, interval)
    }

    async fn check_and_consume_tokens(
        &self,
        context: &TokenRateLimitContext<'_>,
        tokens: u32,
        limit: u32,
        interval: Duration,
    ) -> Result<RateLimitResult, StorageError> {
        let key = format!(
            "tokens:{}:{}:{}",
            context.client_id,
            context.group.unwrap_or("-"),
            context.model.unwrap_or(context.provider)
        );

        self.check(key, tokens, limit, interval)
    }
}
