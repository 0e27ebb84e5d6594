//! Static, token-bounded chunking via the `cl100k_base` BPE, matching the tokenizer the
//! `llm` crate's own `token_counter` module uses for budget accounting.

use tiktoken_rs::CoreBPE;

use crate::error::{Result, SearchError};
use crate::types::ChunkingStrategy;

/// Split `text` into overlapping windows of at most `strategy.max_tokens` tokens, sliding forward
/// by `max_tokens - overlap_tokens` each step. The final window may be shorter. An input that
/// encodes to zero tokens (empty or whitespace-only text) produces zero chunks.
pub fn chunk_text(text: &str, strategy: ChunkingStrategy) -> Result<Vec<String>> {
    if strategy.overlap_tokens >= strategy.max_tokens {
        return Err(SearchError::Persistence(format!(
            "invalid chunking strategy: overlap_tokens ({}) must be less than max_tokens ({})",
            strategy.overlap_tokens, strategy.max_tokens
        )));
    }

    let bpe = bpe().map_err(|e| SearchError::Persistence(e.to_string()))?;
    let tokens = bpe.encode_with_special_tokens(text);

    if tokens.is_empty() {
        return Ok(Vec::new());
    }

    let stride = strategy.max_tokens - strategy.overlap_tokens;
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + strategy.max_tokens).min(tokens.len());
        let slice = tokens[start..end].to_vec();
        let decoded = bpe.decode(slice).map_err(|e| SearchError::Persistence(e.to_string()))?;
        chunks.push(decoded);

        if end == tokens.len() {
            break;
        }

        start += stride;
    }

    Ok(chunks)
}

fn bpe() -> anyhow::Result<CoreBPE> {
    tiktoken_rs::cl100k_base()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("the quick brown fox", ChunkingStrategy::default()).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("quick"));
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        let chunks = chunk_text("   ", ChunkingStrategy::default()).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn long_text_overlaps_between_windows() {
        let text = (0..5000).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");
        let strategy = ChunkingStrategy {
            max_tokens: 256,
            overlap_tokens: 32,
        };
        let chunks = chunk_text(&text, strategy).unwrap();
        assert!(chunks.len() > 1);

        let bpe = bpe().unwrap();
        for chunk in &chunks {
            assert!(bpe.encode_with_special_tokens(chunk).len() <= strategy.max_tokens);
        }
    }

    #[test]
    fn rejects_overlap_not_smaller_than_window() {
        let strategy = ChunkingStrategy {
            max_tokens: 100,
            overlap_tokens: 100,
        };
        assert!(chunk_text("hello", strategy).is_err());
    }
}
