use std::collections::BTreeMap;

use jiff::Timestamp;
use search::{Attributes, ChunkingStrategy};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiresAfter {
    /// Only `"last_active_at"` is supported; mirrors the upstream API's single anchor today.
    pub anchor: String,
    pub days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VectorStoreStatus {
    InProgress,
    Completed,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStore {
    pub id: String,
    pub name: String,
    pub status: VectorStoreStatus,
    pub metadata: BTreeMap<String, String>,
    pub file_counts: FileCounts,
    pub expires_after: Option<ExpiresAfter>,
    #[serde(with = "jiff::fmt::serde::timestamp::second::required")]
    pub created_at: Timestamp,
    #[serde(with = "jiff::fmt::serde::timestamp::second::required")]
    pub last_active_at: Timestamp,
    #[serde(with = "jiff::fmt::serde::timestamp::second::optional")]
    pub expires_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileCounts {
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    InProgress,
    Completed,
    Failed { error: String },
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreFile {
    pub id: String,
    pub vector_store_id: String,
    pub filename: String,
    pub status: FileStatus,
    pub attributes: Attributes,
    pub chunking_strategy: ChunkingStrategy,
    #[serde(with = "jiff::fmt::serde::timestamp::second::required")]
    pub created_at: Timestamp,
    pub usage_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct CreateVectorStoreRequest {
    pub name: String,
    pub metadata: BTreeMap<String, String>,
    pub expires_after: Option<ExpiresAfter>,
}

#[derive(Debug, Clone)]
pub struct AttachFileRequest {
    pub file_id: String,
    pub filename: String,
    pub content: String,
    pub attributes: Attributes,
    pub chunking_strategy: Option<ChunkingStrategy>,
}
