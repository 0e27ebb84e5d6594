use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector store {0} not found")]
    VectorStoreNotFound(String),

    #[error("file {file_id} is not attached to vector store {vector_store_id}")]
    VectorStoreFileNotFound { vector_store_id: String, file_id: String },

    #[error("file {0} not found")]
    FileNotFound(String),

    #[error("invalid chunking strategy: {0}")]
    InvalidChunkingStrategy(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimensionMismatch { expected: usize, actual: usize },

    #[error(transparent)]
    Search(#[from] search::SearchError),

    #[error("reranking failed: {0}")]
    Rerank(String),
}

impl VectorStoreError {
    /// HTTP status mirroring `crates/llm::error::LlmError::status_code`'s pattern: not-found
    /// variants map to 404, everything else to the closest fit for the `{error:{...}}` envelope.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::VectorStoreNotFound(_) | Self::VectorStoreFileNotFound { .. } | Self::FileNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidChunkingStrategy(_) | Self::EmbeddingDimensionMismatch { .. } => StatusCode::BAD_REQUEST,
            Self::Search(_) | Self::Rerank(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::VectorStoreNotFound(_) | Self::VectorStoreFileNotFound { .. } | Self::FileNotFound(_) => "not_found",
            Self::InvalidChunkingStrategy(_) | Self::EmbeddingDimensionMismatch { .. } => "validation_error",
            Self::Search(_) | Self::Rerank(_) => "internal_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, VectorStoreError>;
