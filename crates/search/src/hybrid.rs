//! Full-text lexical index (component 4) and the reciprocal-rank-fusion helper that combines its
//! results with the semantic index's (component 3) to produce hybrid search's ranked output.

use std::sync::Mutex;

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::document::TantivyDocument;
use tantivy::schema::{IndexRecordOption, STORED, STRING, Schema, TEXT, Value};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Term};

use crate::error::{Result, SearchError};
use crate::types::{Chunk, RankedChunk};

struct Fields {
    chunk_id: tantivy::schema::Field,
    file_id: tantivy::schema::Field,
    vector_store_id: tantivy::schema::Field,
    filename: tantivy::schema::Field,
    text: tantivy::schema::Field,
}

/// In-memory inverted index over every indexed chunk's text, rebuilt from the semantic index's
/// snapshots on startup (it carries no persistence of its own — it's a derived view, not a source
/// of truth).
pub struct LexicalIndex {
    index: Index,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    fields: Fields,
}

impl LexicalIndex {
    pub fn new() -> Result<Self> {
        let mut builder = Schema::builder();
        let chunk_id = builder.add_text_field("chunk_id", STRING | STORED);
        let file_id = builder.add_text_field("file_id", STRING | STORED);
        let vector_store_id = builder.add_text_field("vector_store_id", STRING | STORED);
        let filename = builder.add_text_field("filename", TEXT | STORED);
        let text = builder.add_text_field("text", TEXT | STORED);
        let schema = builder.build();

        let index = Index::create_in_ram(schema);
        let writer = index.writer(50_000_000).map_err(|e| SearchError::LexicalIndex(e.to_string()))?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .map_err(|e: tantivy::TantivyError| SearchError::LexicalIndex(e.to_string()))?;

        Ok(Self {
            index,
            writer: Mutex::new(writer),
            reader,
            fields: Fields {
                chunk_id,
                file_id,
                vector_store_id,
                filename,
                text,
            },
        })
    }

    /// Replace every chunk belonging to `chunks[0].file_id` with the given chunks. Assumes all
    /// chunks in the slice share a file id, matching how the semantic index re-indexes a file.
    pub fn reindex_file(&self, file_id: &str, chunks: &[Chunk]) -> Result<()> {
        let mut writer = self.writer.lock().expect("lexical index writer lock poisoned");

        writer.delete_term(Term::from_field_text(self.fields.file_id, file_id));

        for chunk in chunks {
            writer
                .add_document(tantivy::doc!(
                    self.fields.chunk_id => chunk.chunk_id.as_str(),
                    self.fields.file_id => chunk.file_id.as_str(),
                    self.fields.vector_store_id => chunk.vector_store_id.as_str(),
                    self.fields.filename => chunk.filename.as_str(),
                    self.fields.text => chunk.text.as_str(),
                ))
                .map_err(|e| SearchError::LexicalIndex(e.to_string()))?;
        }

        writer.commit().map_err(|e| SearchError::LexicalIndex(e.to_string()))?;
        Ok(())
    }

    pub fn delete_file(&self, file_id: &str) -> Result<()> {
        let mut writer = self.writer.lock().expect("lexical index writer lock poisoned");
        writer.delete_term(Term::from_field_text(self.fields.file_id, file_id));
        writer.commit().map_err(|e| SearchError::LexicalIndex(e.to_string()))?;
        Ok(())
    }

    pub fn search(&self, query: &str, store_ids: &[String], max_results: usize) -> Result<Vec<RankedChunk>> {
        let searcher = self.reader.searcher();
        let parser = QueryParser::for_index(&self.index, vec![self.fields.text, self.fields.filename]);
        let text_query = parser.parse_query(query).map_err(|e| SearchError::LexicalIndex(e.to_string()))?;

        let query: Box<dyn Query> = if store_ids.is_empty() {
            text_query
        } else {
            let scope: Vec<(Occur, Box<dyn Query>)> = store_ids
                .iter()
                .map(|id| {
                    let term = Term::from_field_text(self.fields.vector_store_id, id);
                    (Occur::Should, Box::new(TermQuery::new(term, IndexRecordOption::Basic)) as Box<dyn Query>)
                })
                .collect();

            Box::new(BooleanQuery::new(vec![(Occur::Must, text_query), (Occur::Must, Box::new(BooleanQuery::new(scope)))]))
        };

        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(max_results))
            .map_err(|e| SearchError::LexicalIndex(e.to_string()))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address).map_err(|e| SearchError::LexicalIndex(e.to_string()))?;
            let Some(chunk_id) = doc.get_first(self.fields.chunk_id).and_then(|v| v.as_str()) else {
                continue;
            };

            hits.push(RankedChunk {
                chunk_id: chunk_id.to_string(),
                score,
            });
        }

        Ok(hits)
    }
}

/// Reciprocal rank fusion: `score(c) = sum over lists containing c of 1 / (k + rank_in_list(c))`,
/// with 1-indexed ranks. Ties break by lower semantic rank, then lower lexical rank, then
/// lexicographic chunk id.
pub fn reciprocal_rank_fusion(semantic: &[RankedChunk], lexical: &[RankedChunk], k: f64, max_results: usize) -> Vec<RankedChunk> {
    use std::collections::HashMap;

    let mut scores: HashMap<&str, f64> = HashMap::new();
    let mut semantic_rank: HashMap<&str, usize> = HashMap::new();
    let mut lexical_rank: HashMap<&str, usize> = HashMap::new();

    for (i, hit) in semantic.iter().enumerate() {
        let rank = i + 1;
        semantic_rank.insert(hit.chunk_id.as_str(), rank);
        *scores.entry(hit.chunk_id.as_str()).or_insert(0.0) += 1.0 / (k + rank as f64);
    }

    for (i, hit) in lexical.iter().enumerate() {
        let rank = i + 1;
        lexical_rank.insert(hit.chunk_id.as_str(), rank);
        *scores.entry(hit.chunk_id.as_str()).or_insert(0.0) += 1.0 / (k + rank as f64);
    }

    let mut ids: Vec<&str> = scores.keys().copied().collect();
    ids.sort_by(|a, b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                semantic_rank.get(a).copied().unwrap_or(usize::MAX).cmp(&semantic_rank.get(b).copied().unwrap_or(usize::MAX))
            })
            .then_with(|| lexical_rank.get(a).copied().unwrap_or(usize::MAX).cmp(&lexical_rank.get(b).copied().unwrap_or(usize::MAX)))
            .then_with(|| a.cmp(b))
    });

    ids.truncate(max_results);
    ids.into_iter()
        .map(|id| RankedChunk {
            chunk_id: id.to_string(),
            score: scores[id] as f32,
        })
        .collect()
}

/// Default fusion constant from the hybrid search specification.
pub const DEFAULT_RRF_K: f64 = 60.0;

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(ids: &[&str]) -> Vec<RankedChunk> {
        ids.iter().map(|id| RankedChunk { chunk_id: id.to_string(), score: 0.0 }).collect()
    }

    #[test]
    fn fusion_matches_the_worked_example() {
        // semantic = [a, b, c], lexical = [b, c, a], K = 60.
        // a: 1/61 (sem rank 1) + 1/63 (lex rank 3)
        // b: 1/62 (sem rank 2) + 1/61 (lex rank 1)
        // c: 1/63 (sem rank 3) + 1/62 (lex rank 2)
        let semantic = ranked(&["a", "b", "c"]);
        let lexical = ranked(&["b", "c", "a"]);

        let fused = reciprocal_rank_fusion(&semantic, &lexical, DEFAULT_RRF_K, 10);

        let a = 1.0 / 61.0 + 1.0 / 63.0;
        let b = 1.0 / 62.0 + 1.0 / 61.0;
        let c = 1.0 / 63.0 + 1.0 / 62.0;
        assert!(b > a && a > c, "expected b > a > c, got b={b} a={a} c={c}");

        assert_eq!(fused.iter().map(|h| h.chunk_id.as_str()).collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn ties_break_by_semantic_rank_then_lexical_rank_then_id() {
        // Two chunks that only appear in the semantic list, tied in score (same rank would be
        // impossible since ranks are unique, so instead construct a tie through a chunk present
        // only in one list vs. another present only in the other at a mirrored rank).
        let semantic = ranked(&["x"]);
        let lexical = ranked(&["y"]);

        let fused = reciprocal_rank_fusion(&semantic, &lexical, DEFAULT_RRF_K, 10);
        // Both score 1/61; x has a semantic rank (1), y does not (MAX) -> x sorts first.
        assert_eq!(fused[0].chunk_id, "x");
        assert_eq!(fused[1].chunk_id, "y");
    }

    #[test]
    fn max_results_truncates_fused_output() {
        let semantic = ranked(&["a", "b", "c", "d"]);
        let lexical = ranked(&[]);
        let fused = reciprocal_rank_fusion(&semantic, &lexical, DEFAULT_RRF_K, 2);
        assert_eq!(fused.len(), 2);
    }
}
