//! `/v1/embeddings`: proxies text to the configured [`search::EmbeddingClient`] and reports an
//! approximate token count in the response's `usage`, mirroring the accounting
//! `crates/llm::token_counter` does for chat completions.

use std::sync::{Arc, OnceLock};

use axum::{Json, Router, extract::State, response::{IntoResponse, Response}, routing::post};
use search::EmbeddingClient;
use serde::Deserialize;
use serde_json::json;
use tiktoken_rs::CoreBPE;

/// Shared state backing the `/v1/embeddings` handler.
pub struct EmbeddingsState {
    client: Arc<dyn EmbeddingClient>,
    model: String,
}

impl EmbeddingsState {
    pub fn new(client: Arc<dyn EmbeddingClient>, model: String) -> Self {
        Self { client, model }
    }
}

pub fn router() -> Router<Arc<EmbeddingsState>> {
    Router::new().route("/", post(create_embeddings))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddingsInput {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
struct EmbeddingsRequest {
    input: EmbeddingsInput,
    #[serde(default)]
    model: Option<String>,
}

async fn create_embeddings(State(state): State<Arc<EmbeddingsState>>, Json(request): Json<EmbeddingsRequest>) -> Response {
    let texts = match request.input {
        EmbeddingsInput::One(text) => vec![text],
        EmbeddingsInput::Many(texts) => texts,
    };

    let prompt_tokens: u32 = texts.iter().map(|text| count_tokens(text)).sum();

    match state.client.embed(&texts).await {
        Ok(vectors) => {
            let data: Vec<_> = vectors
                .into_iter()
                .enumerate()
                .map(|(index, embedding)| json!({ "object": "embedding", "embedding": embedding, "index": index }))
                .collect();

            Json(json!({
                "object": "list",
                "data": data,
                "model": request.model.unwrap_or_else(|| state.model.clone()),
                "usage": { "prompt_tokens": prompt_tokens, "total_tokens": prompt_tokens },
            }))
            .into_response()
        }
        Err(error) => (
            http::StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "type": "internal_error", "message": error.to_string(), "code": 500 } })),
        )
            .into_response(),
    }
}

fn count_tokens(text: &str) -> u32 {
    static ENCODER: OnceLock<CoreBPE> = OnceLock::new();
    let bpe = ENCODER.get_or_init(|| tiktoken_rs::cl100k_base().expect("cl100k_base ranks are statically embedded"));
    bpe.encode_with_special_tokens(text).len() as u32
}
