use std::path::PathBuf;
use std::time::Duration;

use duration_str::deserialize_duration;
use serde::Deserialize;

/// Configuration for the `/v1/responses` orchestration endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResponsesConfig {
    /// Whether the Responses API endpoint is mounted.
    pub enabled: bool,
    /// Path the endpoint is nested under.
    pub path: String,
    /// Hard cap on model round-trips within one response.
    pub max_turns: usize,
    /// Per-request deadline, counted from the first turn.
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
    /// Independent timeout for a single tool execution.
    #[serde(deserialize_with = "deserialize_duration")]
    pub tool_timeout: Duration,
}

impl Default for ResponsesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/v1/responses".to_string(),
            max_turns: 10,
            request_timeout: Duration::from_secs(120),
            tool_timeout: Duration::from_secs(60),
        }
    }
}

/// Configuration for the vector store service backing `file_search`/`agentic_search`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VectorStoreConfig {
    /// Whether `/v1/vector_stores*` and `/v1/files*` are mounted.
    pub enabled: bool,
    /// Where chunk/embedding snapshots are persisted. `None` keeps everything in memory.
    pub storage: VectorStoreBackend,
    /// Embedding client selection.
    pub embedding: EmbeddingConfig,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage: VectorStoreBackend::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

/// Where vector store chunk/embedding snapshots live.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum VectorStoreBackend {
    /// Nothing survives a restart.
    #[default]
    Memory,
    /// One JSON snapshot file per `(vector_store_id, file_id)` pair under `directory`.
    Persistent {
        /// Directory snapshots are written to; created on first use.
        directory: PathBuf,
    },
}

/// Which `EmbeddingClient` implementation backs semantic search.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", deny_unknown_fields)]
pub enum EmbeddingConfig {
    /// Deterministic local hashing embedder; no external calls, stable across restarts.
    Hash {
        /// Embedding vector width.
        #[serde(default = "default_hash_dimensions")]
        dimensions: usize,
    },
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::Hash {
            dimensions: default_hash_dimensions(),
        }
    }
}

fn default_hash_dimensions() -> usize {
    256
}
