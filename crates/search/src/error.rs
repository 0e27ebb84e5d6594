use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("file {0} not found in the index")]
    FileNotFound(String),

    #[error("embedding has dimension {actual}, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("chunking produced no chunks for file {0}")]
    EmptyDocument(String),

    #[error("embedding provider failed: {0}")]
    EmbeddingFailed(String),

    #[error("lexical index error: {0}")]
    LexicalIndex(String),

    #[error("persistence error: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;
