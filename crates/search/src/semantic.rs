//! Vector Search Provider: per-file chunking + embedding, cosine-ranked semantic search, and a
//! JSON-per-file snapshot so an index survives a restart without a database dependency.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::chunk::chunk_text;
use crate::embedding::EmbeddingClient;
use crate::error::{Result, SearchError};
use crate::types::{Attributes, Chunk, ChunkingStrategy, RankedChunk, RankingOptions};

/// In-memory semantic index over one or more vector stores' files, backed by an injected
/// [`EmbeddingClient`] and, optionally, a directory of one-JSON-file-per-indexed-file snapshots.
pub struct SemanticIndex {
    embedding_client: Arc<dyn EmbeddingClient>,
    files: DashMap<String, Vec<Chunk>>,
    persistence_dir: Option<PathBuf>,
    file_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SemanticIndex {
    pub fn new(embedding_client: Arc<dyn EmbeddingClient>) -> Self {
        Self {
            embedding_client,
            files: DashMap::new(),
            persistence_dir: None,
            file_locks: DashMap::new(),
        }
    }

    /// Load any existing snapshots from `dir` and keep writing future updates back to it.
    pub async fn with_persistence(embedding_client: Arc<dyn EmbeddingClient>, dir: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SearchError::Persistence(e.to_string()))?;

        let index = Self {
            embedding_client,
            files: DashMap::new(),
            persistence_dir: Some(dir.clone()),
            file_locks: DashMap::new(),
        };

        let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| SearchError::Persistence(e.to_string()))?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| SearchError::Persistence(e.to_string()))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let contents = tokio::fs::read(&path).await.map_err(|e| SearchError::Persistence(e.to_string()))?;
            let chunks: Vec<Chunk> = serde_json::from_slice(&contents).map_err(|e| SearchError::Persistence(e.to_string()))?;

            if let Some(file_id) = chunks.first().map(|c| c.file_id.clone()) {
                index.files.insert(file_id, chunks);
            }
        }

        Ok(index)
    }

    /// Chunk, embed, and index `content` for `file_id`, replacing any prior chunks for that file
    /// in one atomic swap so a concurrent search never observes a half-updated file.
    pub async fn index_file(
        &self,
        file_id: &str,
        vector_store_id: &str,
        filename: &str,
        content: &str,
        strategy: ChunkingStrategy,
        attributes: Attributes,
    ) -> Result<usize> {
        let texts = chunk_text(content, strategy)?;
        if texts.is_empty() {
            return Err(SearchError::EmptyDocument(file_id.to_string()));
        }

        let embeddings = self
            .embedding_client
            .embed(&texts)
            .await
            .map_err(|e| SearchError::EmbeddingFailed(e.to_string()))?;

        let expected_dim = self.embedding_client.dimensions();
        for embedding in &embeddings {
            if embedding.len() != expected_dim {
                return Err(SearchError::DimensionMismatch {
                    expected: expected_dim,
                    actual: embedding.len(),
                });
            }
        }

        let chunks: Vec<Chunk> = texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(chunk_index, (text, embedding))| Chunk {
                chunk_id: format!("{file_id}:{chunk_index}"),
                file_id: file_id.to_string(),
                vector_store_id: vector_store_id.to_string(),
                filename: filename.to_string(),
                chunk_index,
                text,
                embedding,
                attributes: attributes.clone(),
            })
            .collect();

        let count = chunks.len();
        self.with_file_lock(file_id, || async {
            self.files.insert(file_id.to_string(), chunks.clone());
            self.persist(file_id, &chunks).await
        })
        .await?;

        Ok(count)
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<bool> {
        let existed = self
            .with_file_lock(file_id, || async {
                let removed = self.files.remove(file_id).is_some();

                if let Some(dir) = &self.persistence_dir {
                    let path = snapshot_path(dir, file_id);
                    if path.exists() {
                        tokio::fs::remove_file(&path).await.map_err(|e| SearchError::Persistence(e.to_string()))?;
                    }
                }

                Ok(removed)
            })
            .await?;

        Ok(existed)
    }

    pub fn get_metadata(&self, file_id: &str) -> Option<usize> {
        self.files.get(file_id).map(|chunks| chunks.len())
    }

    /// Rank every chunk in scope by cosine similarity to the embedded query, normalized to
    /// `[0, 1]` (`(cosine + 1) / 2`), filtered by `store_ids`/`filter`, and above
    /// `ranking.score_threshold`.
    pub async fn search(
        &self,
        query: &str,
        store_ids: &[String],
        filter: Option<&crate::types::Filter>,
        ranking: &RankingOptions,
        max_results: usize,
    ) -> Result<Vec<RankedChunk>> {
        let query_embedding = self
            .embedding_client
            .embed(&[query.to_string()])
            .await
            .map_err(|e| SearchError::EmbeddingFailed(e.to_string()))?
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut scored: Vec<RankedChunk> = Vec::new();

        for entry in self.files.iter() {
            for chunk in entry.value() {
                if !store_ids.is_empty() && !store_ids.iter().any(|id| id == &chunk.vector_store_id) {
                    continue;
                }

                if let Some(filter) = filter {
                    if !filter.evaluate(&chunk.attributes) {
                        continue;
                    }
                }

                let cosine = cosine_similarity(&query_embedding, &chunk.embedding);
                let normalized = (cosine + 1.0) / 2.0;

                if normalized < ranking.score_threshold {
                    continue;
                }

                scored.push(RankedChunk {
                    chunk_id: chunk.chunk_id.clone(),
                    score: normalized,
                });
            }
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(max_results);
        Ok(scored)
    }

    pub fn chunk_by_id(&self, chunk_id: &str) -> Option<Chunk> {
        let file_id = chunk_id.rsplit_once(':').map(|(f, _)| f).unwrap_or(chunk_id);
        self.files.get(file_id)?.iter().find(|c| c.chunk_id == chunk_id).cloned()
    }

    pub fn chunks_for_file(&self, file_id: &str) -> Option<Vec<Chunk>> {
        self.files.get(file_id).map(|c| c.clone())
    }

    async fn persist(&self, file_id: &str, chunks: &[Chunk]) -> Result<()> {
        let Some(dir) = &self.persistence_dir else {
            return Ok(());
        };

        let path = snapshot_path(dir, file_id);
        let bytes = serde_json::to_vec(chunks).map_err(|e| SearchError::Persistence(e.to_string()))?;
        write_with_retry(&path, &bytes).await
    }

    /// Serialize access to a single file's snapshot behind a per-file lock, retrying with
    /// exponential backoff if the lock is already held (modeling contention with an external
    /// writer to the same snapshot directory, even though this process only ever holds it itself).
    async fn with_file_lock<F, Fut, T>(&self, file_id: &str, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let lock = self.file_locks.entry(file_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone();

        let mut delay = Duration::from_millis(10);
        let guard = loop {
            match lock.try_lock() {
                Ok(guard) => break guard,
                Err(_) if delay < Duration::from_millis(200) => {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
                Err(_) => break lock.lock().await,
            }
        };

        let result = f().await;
        drop(guard);
        result
    }
}

fn snapshot_path(dir: &Path, file_id: &str) -> PathBuf {
    dir.join(format!("{file_id}.json"))
}

async fn write_with_retry(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut delay = Duration::from_millis(10);
    let mut attempts = 0;

    loop {
        let tmp_path = path.with_extension("json.tmp");
        match tokio::fs::write(&tmp_path, bytes).await.and(Ok(())) {
            Ok(()) => {
                return tokio::fs::rename(&tmp_path, path).await.map_err(|e| SearchError::Persistence(e.to_string()));
            }
            Err(e) if attempts < 5 => {
                attempts += 1;
                tokio::time::sleep(delay).await;
                delay *= 2;
                log::warn!("retrying snapshot write for {}: {e}", path.display());
            }
            Err(e) => return Err(SearchError::Persistence(e.to_string())),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::embedding::HashEmbeddingClient;

    fn index() -> SemanticIndex {
        SemanticIndex::new(Arc::new(HashEmbeddingClient::new(16)))
    }

    #[tokio::test]
    async fn indexing_then_searching_finds_the_file() {
        let index = index();
        index
            .index_file(
                "file_1",
                "vs_1",
                "doc.txt",
                "the quick brown fox jumps over the lazy dog",
                ChunkingStrategy::default(),
                BTreeMap::new(),
            )
            .await
            .unwrap();

        let hits = index
            .search(
                "the quick brown fox jumps over the lazy dog",
                &["vs_1".to_string()],
                None,
                &RankingOptions::default(),
                10,
            )
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "file_1:0");
        assert!(hits[0].score > 0.9);
    }

    #[tokio::test]
    async fn store_scoping_excludes_other_stores() {
        let index = index();
        index
            .index_file("file_1", "vs_1", "doc.txt", "alpha beta gamma", ChunkingStrategy::default(), BTreeMap::new())
            .await
            .unwrap();

        let hits = index
            .search("alpha beta gamma", &["vs_2".to_string()], None, &RankingOptions::default(), 10)
            .await
            .unwrap();

        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn reindexing_replaces_prior_chunks() {
        let index = index();
        index
            .index_file("file_1", "vs_1", "doc.txt", "first version of the document", ChunkingStrategy::default(), BTreeMap::new())
            .await
            .unwrap();
        index
            .index_file("file_1", "vs_1", "doc.txt", "second version entirely", ChunkingStrategy::default(), BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(index.get_metadata("file_1"), Some(1));
        assert!(index.chunks_for_file("file_1").unwrap()[0].text.contains("second"));
    }

    #[tokio::test]
    async fn dimension_mismatch_is_rejected() {
        struct WrongDim;
        #[async_trait::async_trait]
        impl EmbeddingClient for WrongDim {
            async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
            }
            fn dimensions(&self) -> usize {
                16
            }
        }

        let index = SemanticIndex::new(Arc::new(WrongDim));
        let result = index
            .index_file("file_1", "vs_1", "doc.txt", "some text", ChunkingStrategy::default(), BTreeMap::new())
            .await;

        assert!(matches!(result, Err(SearchError::DimensionMismatch { .. })));
    }
}
