use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A scalar attribute value attached to a file or carried through to its chunks. Filters compare
/// against these; the comparison variant of [`Filter`] fails closed (returns `false`) on a type
/// mismatch rather than attempting coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    String(String),
    Number(f64),
    Bool(bool),
}

pub type Attributes = BTreeMap<String, AttributeValue>;

/// One retrievable unit of a file: a token-bounded slice of its text plus whatever embedding and
/// attributes it carries. `chunk_id` is `{file_id}:{chunk_index}`, which both uniquely identifies
/// the chunk and keeps the hybrid index's document id derivable without a side table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub file_id: String,
    pub vector_store_id: String,
    pub filename: String,
    pub chunk_index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
    pub attributes: Attributes,
}

/// A comparison or boolean-compound filter over chunk/file attributes, matching the request-side
/// `filters` shape the `file_search` tool and the vector store search endpoint both accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    Comparison {
        key: String,
        #[serde(rename = "type")]
        op: ComparisonOp,
        value: AttributeValue,
    },
    Compound {
        op: CompoundOp,
        filters: Vec<Filter>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompoundOp {
    And,
    Or,
}

impl Filter {
    /// Evaluate the filter tree against a chunk's attributes. A comparison whose key is absent,
    /// or whose value isn't the same variant as the filter's `value`, evaluates to `false` rather
    /// than raising an error — soundness here means "never matches something it shouldn't", not
    /// "rejects malformed input", per the filter-soundness invariant.
    pub fn evaluate(&self, attributes: &Attributes) -> bool {
        match self {
            Filter::Comparison { key, op, value } => {
                let Some(actual) = attributes.get(key) else {
                    return false;
                };
                compare(actual, *op, value)
            }
            Filter::Compound { op, filters } => match op {
                CompoundOp::And => filters.iter().all(|f| f.evaluate(attributes)),
                CompoundOp::Or => filters.iter().any(|f| f.evaluate(attributes)),
            },
        }
    }
}

fn compare(actual: &AttributeValue, op: ComparisonOp, expected: &AttributeValue) -> bool {
    match (actual, expected) {
        (AttributeValue::String(a), AttributeValue::String(b)) => match op {
            ComparisonOp::Eq => a == b,
            ComparisonOp::Ne => a != b,
            ComparisonOp::Gt => a > b,
            ComparisonOp::Gte => a >= b,
            ComparisonOp::Lt => a < b,
            ComparisonOp::Lte => a <= b,
        },
        (AttributeValue::Number(a), AttributeValue::Number(b)) => match op {
            ComparisonOp::Eq => a == b,
            ComparisonOp::Ne => a != b,
            ComparisonOp::Gt => a > b,
            ComparisonOp::Gte => a >= b,
            ComparisonOp::Lt => a < b,
            ComparisonOp::Lte => a <= b,
        },
        (AttributeValue::Bool(a), AttributeValue::Bool(b)) => match op {
            ComparisonOp::Eq => a == b,
            ComparisonOp::Ne => a != b,
            _ => false,
        },
        _ => false,
    }
}

/// A ranked hit from either the semantic or lexical index, before fusion. `score` is the raw
/// per-index score (cosine similarity or BM25); rank is implied by position.
#[derive(Debug, Clone)]
pub struct RankedChunk {
    pub chunk_id: String,
    pub score: f32,
}

/// A search hit after scoring (and, if applicable, fusion), ready for the caller to merge with
/// file attributes and map into an annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub file_id: String,
    pub filename: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankerKind {
    Default,
    None,
    Auto,
}

impl RankerKind {
    pub fn from_str(s: &str) -> Self {
        match s {
            "none" => Self::None,
            "auto" => Self::Auto,
            _ => Self::Default,
        }
    }

    /// Whether hybrid (lexical + semantic) fusion should run for this ranker selection. Only
    /// `default`/unset skips it; everything else, including unrecognized custom ranker names,
    /// opts in, per "used whenever ranker is not one of default/none".
    pub fn wants_hybrid(self) -> bool {
        !matches!(self, Self::Default)
    }
}

#[derive(Debug, Clone)]
pub struct RankingOptions {
    pub ranker: RankerKind,
    pub score_threshold: f32,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            ranker: RankerKind::Default,
            score_threshold: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkingStrategy {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkingStrategy {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            overlap_tokens: 200,
        }
    }
}
