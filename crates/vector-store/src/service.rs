use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use jiff::Span;
use search::{Attributes, ChunkingStrategy, EmbeddingClient, Filter, LexicalIndex, NoopReranker, RankerKind, RankingOptions, Reranker, SemanticIndex};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::error::{Result, VectorStoreError};
use crate::types::{AttachFileRequest, CreateVectorStoreRequest, ExpiresAfter, FileCounts, FileStatus, VectorStore, VectorStoreFile, VectorStoreStatus};

struct Inner {
    stores: DashMap<String, VectorStore>,
    files: DashMap<String, VectorStoreFile>,
    store_files: DashMap<String, Vec<String>>,
    semantic: Arc<SemanticIndex>,
    lexical: Arc<LexicalIndex>,
    reranker: Arc<dyn Reranker>,
    clock: Arc<dyn Clock>,
}

/// Vector Store Service: CRUD + lifecycle for vector stores and their files, and the search
/// pipeline that combines semantic search, optional hybrid fusion, and reranking. Cheaply
/// cloneable (an `Arc` handle) so attach jobs can outlive the request that started them.
#[derive(Clone)]
pub struct VectorStoreService(Arc<Inner>);

impl VectorStoreService {
    pub fn new(embedding_client: Arc<dyn EmbeddingClient>) -> Result<Self> {
        Ok(Self(Arc::new(Inner {
            stores: DashMap::new(),
            files: DashMap::new(),
            store_files: DashMap::new(),
            semantic: Arc::new(SemanticIndex::new(embedding_client)),
            lexical: Arc::new(LexicalIndex::new()?),
            reranker: Arc::new(NoopReranker),
            clock: Arc::new(SystemClock),
        })))
    }

    pub async fn with_persistence(embedding_client: Arc<dyn EmbeddingClient>, dir: PathBuf) -> Result<Self> {
        Ok(Self(Arc::new(Inner {
            stores: DashMap::new(),
            files: DashMap::new(),
            store_files: DashMap::new(),
            semantic: Arc::new(SemanticIndex::with_persistence(embedding_client, dir).await?),
            lexical: Arc::new(LexicalIndex::new()?),
            reranker: Arc::new(NoopReranker),
            clock: Arc::new(SystemClock),
        })))
    }

    /// Swaps in a reranker. Intended to be called once, right after construction and before the
    /// service is cloned anywhere else — every store/file created after this point lives on.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.0 = Arc::new(Inner {
            stores: DashMap::new(),
            files: DashMap::new(),
            store_files: DashMap::new(),
            semantic: self.0.semantic.clone(),
            lexical: self.0.lexical.clone(),
            reranker,
            clock: self.0.clock.clone(),
        });
        self
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.0 = Arc::new(Inner {
            stores: DashMap::new(),
            files: DashMap::new(),
            store_files: DashMap::new(),
            semantic: self.0.semantic.clone(),
            lexical: self.0.lexical.clone(),
            reranker: self.0.reranker.clone(),
            clock,
        });
        self
    }

    pub fn create_store(&self, request: CreateVectorStoreRequest) -> VectorStore {
        let now = self.0.clock.now();
        let id = format!("vs_{}", Uuid::new_v4().simple());
        let expires_at = request.expires_after.as_ref().map(|e| now.checked_add(Span::new().days(e.days)).expect("expiry overflow"));

        let store = VectorStore {
            id: id.clone(),
            name: request.name,
            status: VectorStoreStatus::Completed,
            metadata: request.metadata,
            file_counts: FileCounts::default(),
            expires_after: request.expires_after,
            created_at: now,
            last_active_at: now,
            expires_at,
        };

        self.0.stores.insert(id.clone(), store.clone());
        self.0.store_files.insert(id, Vec::new());
        store
    }

    pub fn list_stores(&self) -> Vec<VectorStore> {
        let ids: Vec<String> = self.0.stores.iter().map(|e| e.key().clone()).collect();
        for id in &ids {
            self.refresh_expiration(id);
        }

        let mut stores: Vec<VectorStore> = self.0.stores.iter().map(|e| e.value().clone()).collect();
        stores.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        stores
    }

    pub fn get_store(&self, id: &str) -> Result<VectorStore> {
        self.refresh_expiration(id);
        self.0.stores.get(id).map(|s| s.clone()).ok_or_else(|| VectorStoreError::VectorStoreNotFound(id.to_string()))
    }

    pub fn update_store(
        &self,
        id: &str,
        name: Option<String>,
        metadata: Option<std::collections::BTreeMap<String, String>>,
        expires_after: Option<Option<ExpiresAfter>>,
    ) -> Result<VectorStore> {
        self.refresh_expiration(id);

        let mut store = self.0.stores.get_mut(id).ok_or_else(|| VectorStoreError::VectorStoreNotFound(id.to_string()))?;

        if let Some(name) = name {
            store.name = name;
        }
        if let Some(metadata) = metadata {
            store.metadata = metadata;
        }
        if let Some(expires_after) = expires_after {
            store.expires_at = expires_after.as_ref().map(|e| store.last_active_at.checked_add(Span::new().days(e.days)).expect("expiry overflow"));
            store.expires_after = expires_after;
        }

        Ok(store.clone())
    }

    pub fn delete_store(&self, id: &str) -> Result<()> {
        self.0.stores.remove(id).ok_or_else(|| VectorStoreError::VectorStoreNotFound(id.to_string()))?;

        if let Some((_, file_ids)) = self.0.store_files.remove(id) {
            for file_id in file_ids {
                self.0.files.remove(&file_id);
                let _ = self.0.semantic.delete_file(&file_id);
                let _ = self.0.lexical.delete_file(&file_id);
            }
        }

        Ok(())
    }

    pub async fn attach_file(&self, store_id: &str, request: AttachFileRequest) -> Result<VectorStoreFile> {
        self.get_store(store_id)?;

        let strategy = request.chunking_strategy.unwrap_or_default();
        if strategy.overlap_tokens >= strategy.max_tokens {
            return Err(VectorStoreError::InvalidChunkingStrategy(format!(
                "overlap_tokens ({}) must be less than max_tokens ({})",
                strategy.overlap_tokens, strategy.max_tokens
            )));
        }

        let now = self.0.clock.now();
        let record = VectorStoreFile {
            id: request.file_id.clone(),
            vector_store_id: store_id.to_string(),
            filename: request.filename.clone(),
            status: FileStatus::InProgress,
            attributes: request.attributes.clone(),
            chunking_strategy: strategy,
            created_at: now,
            usage_bytes: request.content.len() as u64,
        };

        self.0.files.insert(record.id.clone(), record.clone());
        self.0.store_files.entry(store_id.to_string()).or_default().push(record.id.clone());
        self.recompute_file_counts(store_id);

        let service = self.clone();
        let store_id = store_id.to_string();
        let file_id = record.id.clone();
        let filename = request.filename;
        let content = request.content;
        let attributes = request.attributes;

        tokio::spawn(async move {
            service.run_indexing(&store_id, &file_id, &filename, &content, strategy, attributes).await;
        });

        Ok(record)
    }

    async fn run_indexing(&self, store_id: &str, file_id: &str, filename: &str, content: &str, strategy: ChunkingStrategy, attributes: Attributes) {
        let outcome = self.0.semantic.index_file(file_id, store_id, filename, content, strategy, attributes).await;

        match outcome {
            Ok(_) => {
                if let Some(chunks) = self.0.semantic.chunks_for_file(file_id) {
                    if let Err(e) = self.0.lexical.reindex_file(file_id, &chunks) {
                        log::warn!("lexical reindex failed for file {file_id}: {e}");
                    }
                }
                self.set_file_status(file_id, FileStatus::Completed);
            }
            Err(e) => {
                log::warn!("indexing failed for file {file_id}: {e}");
                self.set_file_status(file_id, FileStatus::Failed { error: e.to_string() });
            }
        }

        self.recompute_file_counts(store_id);
    }

    fn set_file_status(&self, file_id: &str, status: FileStatus) {
        if let Some(mut file) = self.0.files.get_mut(file_id) {
            file.status = status;
        }
    }

    pub fn detach_file(&self, store_id: &str, file_id: &str) -> Result<()> {
        self.get_store(store_id)?;

        let file = self
            .0
            .files
            .get(file_id)
            .filter(|f| f.vector_store_id == store_id)
            .ok_or_else(|| VectorStoreError::VectorStoreFileNotFound {
                vector_store_id: store_id.to_string(),
                file_id: file_id.to_string(),
            })?;
        drop(file);

        self.0.files.remove(file_id);
        if let Some(mut ids) = self.0.store_files.get_mut(store_id) {
            ids.retain(|id| id != file_id);
        }
        let _ = self.0.semantic.delete_file(file_id);
        let _ = self.0.lexical.delete_file(file_id);
        self.recompute_file_counts(store_id);

        Ok(())
    }

    pub fn list_files(&self, store_id: &str) -> Result<Vec<VectorStoreFile>> {
        self.get_store(store_id)?;

        let ids = self.0.store_files.get(store_id).map(|v| v.clone()).unwrap_or_default();
        Ok(ids.iter().filter_map(|id| self.0.files.get(id).map(|f| f.clone())).collect())
    }

    pub fn update_file_attributes(&self, store_id: &str, file_id: &str, attributes: Attributes) -> Result<VectorStoreFile> {
        self.get_store(store_id)?;

        let mut file = self
            .0
            .files
            .get_mut(file_id)
            .filter(|f| f.vector_store_id == store_id)
            .ok_or_else(|| VectorStoreError::VectorStoreFileNotFound {
                vector_store_id: store_id.to_string(),
                file_id: file_id.to_string(),
            })?;

        file.attributes = attributes;
        Ok(file.clone())
    }

    pub fn get_file(&self, store_id: &str, file_id: &str) -> Result<VectorStoreFile> {
        self.get_store(store_id)?;

        self.0
            .files
            .get(file_id)
            .filter(|f| f.vector_store_id == store_id)
            .map(|f| f.clone())
            .ok_or_else(|| VectorStoreError::VectorStoreFileNotFound {
                vector_store_id: store_id.to_string(),
                file_id: file_id.to_string(),
            })
    }

    /// Semantic (and, when the ranker calls for it, hybrid-fused) search across `store_ids`,
    /// with file attributes merged over the chunk's frozen attributes and reranking applied.
    pub async fn search(
        &self,
        store_ids: &[String],
        query: &str,
        filter: Option<&Filter>,
        ranking: &RankingOptions,
        max_num_results: usize,
    ) -> Result<Vec<search::SearchHit>> {
        let active: Vec<String> = store_ids
            .iter()
            .filter(|id| matches!(self.get_store(id), Ok(s) if s.status != VectorStoreStatus::Expired))
            .cloned()
            .collect();

        let pool_size = max_num_results.max(50);
        let semantic_hits = self.0.semantic.search(query, &active, filter, ranking, pool_size).await?;

        let fused = if ranking.ranker.wants_hybrid() {
            let lexical_hits = self.0.lexical.search(query, &active, pool_size)?;
            search::reciprocal_rank_fusion(&semantic_hits, &lexical_hits, search::DEFAULT_RRF_K, pool_size)
        } else {
            semantic_hits
        };

        let candidates: Vec<search::SearchHit> = fused
            .into_iter()
            .filter_map(|ranked| {
                let chunk = self.0.semantic.chunk_by_id(&ranked.chunk_id)?;
                Some(search::SearchHit {
                    chunk_id: chunk.chunk_id,
                    file_id: chunk.file_id.clone(),
                    filename: chunk.filename,
                    chunk_index: chunk.chunk_index,
                    text: chunk.text,
                    score: ranked.score,
                    attributes: self.merged_attributes(&chunk.file_id, chunk.attributes),
                })
            })
            .collect();

        let reranked = self
            .0
            .reranker
            .rerank(query, candidates, max_num_results)
            .await
            .map_err(|e| VectorStoreError::Rerank(e.to_string()))?;

        for id in &active {
            self.touch_last_active(id);
        }

        Ok(reranked)
    }

    /// File-level attributes (which may have been updated since indexing) take precedence over
    /// the chunk's attributes captured at index time.
    fn merged_attributes(&self, file_id: &str, chunk_attributes: Attributes) -> Attributes {
        let mut merged = chunk_attributes;
        if let Some(file) = self.0.files.get(file_id) {
            for (key, value) in &file.attributes {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    fn touch_last_active(&self, store_id: &str) {
        if let Some(mut store) = self.0.stores.get_mut(store_id) {
            store.last_active_at = self.0.clock.now();
            if let Some(expires_after) = &store.expires_after {
                let days = expires_after.days;
                store.expires_at = Some(store.last_active_at.checked_add(Span::new().days(days)).expect("expiry overflow"));
            }
        }
    }

    fn refresh_expiration(&self, store_id: &str) {
        if let Some(mut store) = self.0.stores.get_mut(store_id) {
            if store.status != VectorStoreStatus::Expired {
                if let Some(expires_at) = store.expires_at {
                    if self.0.clock.now() >= expires_at {
                        store.status = VectorStoreStatus::Expired;
                    }
                }
            }
        }
    }

    fn recompute_file_counts(&self, store_id: &str) {
        let file_ids = self.0.store_files.get(store_id).map(|v| v.clone()).unwrap_or_default();
        let mut counts = FileCounts::default();

        for file_id in &file_ids {
            if let Some(file) = self.0.files.get(file_id) {
                counts.total += 1;
                match &file.status {
                    FileStatus::InProgress => counts.in_progress += 1,
                    FileStatus::Completed => counts.completed += 1,
                    FileStatus::Failed { .. } => counts.failed += 1,
                    FileStatus::Cancelled => counts.cancelled += 1,
                }
            }
        }

        if let Some(mut store) = self.0.stores.get_mut(store_id) {
            store.file_counts = counts;
        }
    }

    /// Background task that periodically marks stores as expired, so a store nobody reads still
    /// transitions visibly rather than only expiring lazily on next access.
    pub fn spawn_expiration_sweeper(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let ids: Vec<String> = service.0.stores.iter().map(|e| e.key().clone()).collect();
                for id in ids {
                    service.refresh_expiration(&id);
                }
            }
        })
    }
}

fn parse_ranking_options(value: &Value) -> RankingOptions {
    let ranker = value.get("ranker").and_then(Value::as_str).map(RankerKind::from_str).unwrap_or(RankerKind::Auto);
    let score_threshold = value.get("score_threshold").and_then(Value::as_f64).unwrap_or(0.0) as f32;
    RankingOptions { ranker, score_threshold }
}

#[async_trait]
impl tools::FileSearchBackend for VectorStoreService {
    async fn search(&self, request: tools::FileSearchRequest) -> anyhow::Result<Value> {
        let filter = request
            .filters
            .as_ref()
            .map(|v| serde_json::from_value::<Filter>(v.clone()))
            .transpose()?;

        let ranking = request.ranking.as_ref().map(parse_ranking_options).unwrap_or_default();

        let hits = self
            .search(&request.vector_store_ids, &request.query, filter.as_ref(), &ranking, request.max_num_results)
            .await?;

        let data: Vec<Value> = hits
            .iter()
            .map(|hit| {
                json!({
                    "file_id": hit.file_id,
                    "filename": hit.filename,
                    "score": hit.score,
                    "content": [{"type": "text", "text": hit.text}],
                    "annotations": [{
                        "type": "file_citation",
                        "index": hit.chunk_index,
                        "file_id": hit.file_id,
                        "filename": hit.filename,
                    }],
                    "attributes": hit.attributes,
                })
            })
            .collect();

        Ok(json!({"data": data, "search_query": request.query}))
    }
}
