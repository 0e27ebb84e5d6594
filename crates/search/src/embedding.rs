use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// External embedding provider. The vector store service injects a concrete implementation
/// (typically a thin client over an embeddings endpoint); this crate only depends on the trait so
/// it never needs to know which model or API is behind it.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Fixed per-store dimension. Every chunk indexed into the same store must embed to this
    /// length; a mismatch is an [`crate::error::SearchError::DimensionMismatch`].
    fn dimensions(&self) -> usize;
}

/// Deterministic fallback embedding client: hashes each text into a unit vector. Has no semantic
/// value beyond exact/near-duplicate detection, but gives the rest of the pipeline (chunking,
/// indexing, ranking, fusion) a real embedding to exercise without depending on network access for
/// a request the caller hasn't configured a provider for.
pub struct HashEmbeddingClient {
    dimensions: usize,
}

impl HashEmbeddingClient {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| hash_vector(text, self.dimensions)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn hash_vector(text: &str, dimensions: usize) -> Vec<f32> {
    let mut vector = Vec::with_capacity(dimensions);
    let mut counter: u32 = 0;

    while vector.len() < dimensions {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(counter.to_le_bytes());
        let digest = hasher.finalize();

        for chunk in digest.chunks(4) {
            if vector.len() == dimensions {
                break;
            }
            let bytes: [u8; 4] = chunk.try_into().unwrap_or([0; 4]);
            let raw = u32::from_le_bytes(bytes) as f32 / u32::MAX as f32;
            vector.push(raw * 2.0 - 1.0);
        }

        counter += 1;
    }

    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut vector {
            *x /= norm;
        }
    }

    vector
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_embeds_identically() {
        let client = HashEmbeddingClient::new(16);
        let a = client.embed(&["hello world".to_string()]).await.unwrap();
        let b = client.embed(&["hello world".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_text_embeds_differently() {
        let client = HashEmbeddingClient::new(16);
        let a = client.embed(&["hello".to_string()]).await.unwrap();
        let b = client.embed(&["goodbye".to_string()]).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn vectors_are_unit_length() {
        let client = HashEmbeddingClient::new(32);
        let v = &client.embed(&["anything".to_string()]).await.unwrap()[0];
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }
}
