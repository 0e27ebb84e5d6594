pub(crate) mod tracing;

use std::time::Duration;

use deadpool::managed::{Manager, Metrics, Pool, RecycleResult};
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

use super::{RateLimitContext, RateLimitResult, RateLimitStorage, StorageError, TokenRateLimitContext};

/// Snapshot of the connection pool's occupancy, reported on every check for observability.
pub(crate) struct PoolStatus {
    pub size: usize,
    pub available: usize,
}

struct ConnectionManager {
    client: redis::Client,
}

impl Manager for ConnectionManager {
    type Type = MultiplexedConnection;
    type Error = redis::RedisError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        self.client.get_multiplexed_async_connection().await
    }

    async fn recycle(&self, conn: &mut Self::Type, _metrics: &Metrics) -> RecycleResult<Self::Error> {
        redis::cmd("PING").query_async::<String>(conn).await?;
        Ok(())
    }
}

/// Fixed-window rate limit counters tracked in Redis, shared across gateway replicas.
pub(crate) struct RedisStorage {
    pool: Pool<ConnectionManager>,
    key_prefix: String,
}

impl RedisStorage {
    pub fn new(url: &str, key_prefix: String) -> Result<Self, StorageError> {
        let client = redis::Client::open(url).map_err(|err| StorageError::Connection(err.to_string()))?;
        let pool = Pool::builder(ConnectionManager { client })
            .build()
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        Ok(Self { pool, key_prefix })
    }

    pub fn pool_status(&self) -> PoolStatus {
        let status = self.pool.status();

        PoolStatus {
            size: status.size,
            available: status.available.max(0) as usize,
        }
    }

    fn key(&self, scope: &str, discriminant: &str) -> String {
        format!("{}:{scope}:{discriminant}", self.key_prefix)
    }

    async fn incr_and_check(&self, key: &str, amount: u32, limit: u32, interval: Duration) -> Result<RateLimitResult, StorageError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let ttl_secs = interval.as_secs().max(1) as i64;

        // First write on a fresh window wins the NX and sets the expiry; later ones just add to
        // the counter without touching the TTL, so the window doesn't slide forward on traffic.
        let (count,): (u64,) = redis::pipe()
            .atomic()
            .cmd("SET")
            .arg(key)
            .arg(0)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .ignore()
            .cmd("INCRBY")
            .arg(key)
            .arg(amount)
            .query_async(&mut *conn)
            .await
            .map_err(|err| StorageError::Query(err.to_string()))?;

        if count <= limit as u64 {
            return Ok(RateLimitResult {
                allowed: true,
                retry_after: None,
            });
        }

        let ttl_ms: i64 = conn.pttl(key).await.map_err(|err| StorageError::Query(err.to_string()))?;

        Ok(RateLimitResult {
            allowed: false,
            retry_after: Some(Duration::from_millis(ttl_ms.max(0) as u64)),
        })
    }
}

impl RateLimitStorage for RedisStorage {
    async fn check_and_consume(
        &self,
        context: &RateLimitContext<'_>,
        limit: u32,
        interval: Duration,
    ) -> Result<RateLimitResult, StorageError> {
        let key = match context {
            RateLimitContext::Global => self.key("global", "all"),
            RateLimitContext::PerIp { ip } => self.key("ip", &ip.to_string()),
            RateLimitContext::PerServer { server } => self.key("mcp-server", server),
            RateLimitContext::PerTool { server, tool } => self.key("mcp-tool", &format!("{server}:{tool}")),
        };

        self.incr_and_check(&key, 1, limit, interval).await
    }

    async fn check_and_consume_tokens(
        &self,
        context: &TokenRateLimitContext<'_>,
        tokens: u32,
        limit: u32,
        interval: Duration,
    ) -> Result<RateLimitResult, StorageError> {
        let discriminant = format!(
            "{}:{}:{}",
            context.client_id,
            context.group.unwrap_or("-"),
            context.model.unwrap_or(context.provider)
        );
        let key = self.key("tokens", &discriminant);

        self.incr_and_check(&key, tokens, limit, interval).await
    }
}
