use thiserror::Error;

pub use crate::storage::StorageError;

/// Failure returned by [`crate::RateLimitManager::check_request`] and friends.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The caller has exceeded a configured budget. Carries no retry hint by design: the
    /// server layer intentionally doesn't send `Retry-After` headers to match downstream
    /// LLM provider behavior.
    #[error("rate limit exceeded")]
    Exceeded,
    /// The storage backend itself failed (e.g. Redis unreachable). Distinct from `Exceeded`
    /// so callers can map it to a 5xx instead of a 429.
    #[error("rate limit storage error: {0}")]
    Storage(#[from] StorageError),
}
