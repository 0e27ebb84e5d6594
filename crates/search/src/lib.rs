//! Vector Search Provider (chunking, embedding, cosine-ranked semantic search), the lexical index
//! and reciprocal-rank-fusion helper hybrid search combines it with, and the optional reranking
//! seam. The vector store service owns lifecycle (stores, files, expiration); this crate only
//! knows about chunks and scores.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod hybrid;
pub mod rerank;
pub mod semantic;
pub mod types;

pub use embedding::{EmbeddingClient, HashEmbeddingClient};
pub use error::{Result, SearchError};
pub use hybrid::{DEFAULT_RRF_K, LexicalIndex, reciprocal_rank_fusion};
pub use rerank::{NoopReranker, Reranker};
pub use semantic::SemanticIndex;
pub use types::{AttributeValue, Attributes, Chunk, ChunkingStrategy, ComparisonOp, CompoundOp, Filter, RankedChunk, RankerKind, RankingOptions, SearchHit};
