use async_trait::async_trait;

use crate::types::SearchHit;

/// Optional reranking step applied after semantic/hybrid scoring and before truncation. No
/// built-in cross-encoder ships in this build; the default [`NoopReranker`] preserves whatever
/// order the caller already produced.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, candidates: Vec<SearchHit>, k: usize) -> anyhow::Result<Vec<SearchHit>>;
}

pub struct NoopReranker;

#[async_trait]
impl Reranker for NoopReranker {
    async fn rerank(&self, _query: &str, mut candidates: Vec<SearchHit>, k: usize) -> anyhow::Result<Vec<SearchHit>> {
        candidates.truncate(k);
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn hit(id: &str, score: f32) -> SearchHit {
        SearchHit {
            chunk_id: id.to_string(),
            file_id: "file_1".to_string(),
            filename: "doc.txt".to_string(),
            chunk_index: 0,
            text: String::new(),
            score,
            attributes: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn noop_reranker_preserves_order_and_truncates() {
        let candidates = vec![hit("a", 0.9), hit("b", 0.8), hit("c", 0.7)];
        let reranked = NoopReranker.rerank("query", candidates, 2).await.unwrap();
        assert_eq!(reranked.iter().map(|h| h.chunk_id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
