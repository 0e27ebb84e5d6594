//! `/v1/vector_stores*` and `/v1/files*`: vector store CRUD, file attach/detach, and search.
//!
//! Thin axum glue over [`vector_store::VectorStoreService`]/[`vector_store::FileStore`]; request
//! bodies are deserialized into local DTOs here because the service's own argument types
//! (`CreateVectorStoreRequest`, `AttachFileRequest`, `RankingOptions`) are plain Rust structs, not
//! wire types, the same split `responses_api` keeps between `ResponseRequest` and its store.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use search::{Attributes, ChunkingStrategy, Filter, RankerKind, RankingOptions};
use serde::Deserialize;
use serde_json::json;
use vector_store::{AttachFileRequest, CreateVectorStoreRequest, ExpiresAfter, FileStore, VectorStoreError, VectorStoreService};

/// Shared state backing every `/v1/vector_stores*` and `/v1/files*` handler.
pub struct VectorStoreState {
    service: VectorStoreService,
    files: Arc<dyn FileStore>,
}

impl VectorStoreState {
    pub fn new(service: VectorStoreService, files: Arc<dyn FileStore>) -> Self {
        Self { service, files }
    }
}

pub fn vector_stores_router() -> Router<Arc<VectorStoreState>> {
    Router::new()
        .route("/", post(create_store).get(list_stores))
        .route("/{id}", get(get_store).post(update_store).delete(delete_store))
        .route("/{id}/search", post(search_store))
        .route("/{id}/files", post(attach_file).get(list_files))
        .route("/{id}/files/{file_id}", get(get_file).delete(detach_file))
        .route("/{id}/files/{file_id}/attributes", post(update_file_attributes))
}

pub fn files_router() -> Router<Arc<VectorStoreState>> {
    Router::new()
        .route("/", post(upload_file))
        .route("/{id}", get(get_uploaded_file).delete(delete_uploaded_file))
        .route("/{id}/content", get(get_file_content))
}

#[derive(Deserialize)]
struct CreateStoreBody {
    #[serde(default)]
    name: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
    #[serde(default)]
    expires_after: Option<ExpiresAfter>,
}

async fn create_store(State(state): State<Arc<VectorStoreState>>, Json(body): Json<CreateStoreBody>) -> Response {
    let store = state.service.create_store(CreateVectorStoreRequest {
        name: body.name,
        metadata: body.metadata,
        expires_after: body.expires_after,
    });

    (http::StatusCode::CREATED, Json(store)).into_response()
}

async fn list_stores(State(state): State<Arc<VectorStoreState>>) -> Response {
    Json(json!({ "object": "list", "data": state.service.list_stores() })).into_response()
}

async fn get_store(State(state): State<Arc<VectorStoreState>>, Path(id): Path<String>) -> Response {
    match state.service.get_store(&id) {
        Ok(store) => Json(store).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Deserialize)]
struct UpdateStoreBody {
    name: Option<String>,
    metadata: Option<BTreeMap<String, String>>,
    #[serde(default, deserialize_with = "double_option")]
    expires_after: Option<Option<ExpiresAfter>>,
}

/// Distinguishes "field omitted" from "field set to null" for a nullable update.
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<ExpiresAfter>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

async fn update_store(State(state): State<Arc<VectorStoreState>>, Path(id): Path<String>, Json(body): Json<UpdateStoreBody>) -> Response {
    match state.service.update_store(&id, body.name, body.metadata, body.expires_after) {
        Ok(store) => Json(store).into_response(),
        Err(error) => error_response(error),
    }
}

async fn delete_store(State(state): State<Arc<VectorStoreState>>, Path(id): Path<String>) -> Response {
    match state.service.delete_store(&id) {
        Ok(()) => Json(json!({ "id": id, "object": "vector_store", "deleted": true })).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Deserialize)]
struct SearchBody {
    query: String,
    #[serde(default)]
    filters: Option<Filter>,
    #[serde(default)]
    ranking_options: Option<RankingOptionsBody>,
    #[serde(default = "default_max_results")]
    max_num_results: usize,
}

fn default_max_results() -> usize {
    10
}

#[derive(Deserialize)]
struct RankingOptionsBody {
    #[serde(default)]
    ranker: Option<String>,
    #[serde(default)]
    score_threshold: f32,
}

async fn search_store(State(state): State<Arc<VectorStoreState>>, Path(id): Path<String>, Json(body): Json<SearchBody>) -> Response {
    let ranking = body
        .ranking_options
        .map(|r| RankingOptions {
            ranker: r.ranker.as_deref().map(RankerKind::from_str).unwrap_or(RankerKind::Default),
            score_threshold: r.score_threshold,
        })
        .unwrap_or_default();

    match state
        .service
        .search(&[id], &body.query, body.filters.as_ref(), &ranking, body.max_num_results)
        .await
    {
        Ok(hits) => Json(json!({ "object": "list", "data": hits })).into_response(),
        Err(error) => error_response(error),
    }
}

#[derive(Deserialize)]
struct AttachFileBody {
    file_id: String,
    filename: String,
    content: String,
    #[serde(default)]
    attributes: Attributes,
    #[serde(default)]
    chunking_strategy: Option<ChunkingStrategy>,
}

async fn attach_file(State(state): State<Arc<VectorStoreState>>, Path(id): Path<String>, Json(body): Json<AttachFileBody>) -> Response {
    match state
        .service
        .attach_file(
            &id,
            AttachFileRequest {
                file_id: body.file_id,
                filename: body.filename,
                content: body.content,
                attributes: body.attributes,
                chunking_strategy: body.chunking_strategy,
            },
        )
        .await
    {
        Ok(file) => (http::StatusCode::CREATED, Json(file)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn list_files(State(state): State<Arc<VectorStoreState>>, Path(id): Path<String>) -> Response {
    match state.service.list_files(&id) {
        Ok(files) => Json(json!({ "object": "list", "data": files })).into_response(),
        Err(error) => error_response(error),
    }
}

async fn get_file(State(state): State<Arc<VectorStoreState>>, Path((id, file_id)): Path<(String, String)>) -> Response {
    match state.service.get_file(&id, &file_id) {
        Ok(file) => Json(file).into_response(),
        Err(error) => error_response(error),
    }
}

async fn detach_file(State(state): State<Arc<VectorStoreState>>, Path((id, file_id)): Path<(String, String)>) -> Response {
    match state.service.detach_file(&id, &file_id) {
        Ok(()) => Json(json!({ "id": file_id, "object": "vector_store.file", "deleted": true })).into_response(),
        Err(error) => error_response(error),
    }
}

async fn update_file_attributes(State(state): State<Arc<VectorStoreState>>, Path((id, file_id)): Path<(String, String)>, Json(attributes): Json<Attributes>) -> Response {
    match state.service.update_file_attributes(&id, &file_id, attributes) {
        Ok(file) => Json(file).into_response(),
        Err(error) => error_response(error),
    }
}

async fn upload_file(State(state): State<Arc<VectorStoreState>>, mut multipart: Multipart) -> Response {
    let mut filename = None;
    let mut purpose = None;
    let mut content = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(error) => return (http::StatusCode::BAD_REQUEST, Json(json!({ "error": { "type": "validation_error", "message": error.to_string() } }))).into_response(),
        };

        match field.name() {
            Some("file") => {
                filename = field.file_name().map(str::to_string);
                content = match field.bytes().await {
                    Ok(bytes) => Some(bytes.to_vec()),
                    Err(error) => {
                        return (http::StatusCode::BAD_REQUEST, Json(json!({ "error": { "type": "validation_error", "message": error.to_string() } }))).into_response();
                    }
                };
            }
            Some("purpose") => {
                purpose = field.text().await.ok();
            }
            _ => {}
        }
    }

    let (Some(filename), Some(content)) = (filename, content) else {
        return (
            http::StatusCode::BAD_REQUEST,
            Json(json!({ "error": { "type": "validation_error", "message": "multipart body must include a `file` field" } })),
        )
            .into_response();
    };

    let file = state.files.create(filename, purpose.unwrap_or_else(|| "assistants".to_string()), content);
    (http::StatusCode::CREATED, Json(uploaded_file_envelope(&file))).into_response()
}

fn uploaded_file_envelope(file: &vector_store::UploadedFile) -> serde_json::Value {
    json!({
        "id": file.id,
        "object": "file",
        "bytes": file.bytes,
        "created_at": file.created_at.as_second(),
        "filename": file.filename,
        "purpose": file.purpose,
    })
}

async fn get_uploaded_file(State(state): State<Arc<VectorStoreState>>, Path(id): Path<String>) -> Response {
    match state.files.get(&id) {
        Ok(file) => Json(uploaded_file_envelope(&file)).into_response(),
        Err(error) => error_response(error),
    }
}

async fn delete_uploaded_file(State(state): State<Arc<VectorStoreState>>, Path(id): Path<String>) -> Response {
    match state.files.delete(&id) {
        Ok(()) => Json(json!({ "id": id, "object": "file", "deleted": true })).into_response(),
        Err(error) => error_response(error),
    }
}

async fn get_file_content(State(state): State<Arc<VectorStoreState>>, Path(id): Path<String>) -> Response {
    match state.files.get(&id) {
        Ok(file) => ([(http::header::CONTENT_TYPE, "application/octet-stream")], file.content).into_response(),
        Err(error) => error_response(error),
    }
}

fn error_response(error: VectorStoreError) -> Response {
    let status = error.status_code();
    let body = json!({
        "error": {
            "type": error.error_type(),
            "message": error.to_string(),
            "code": status.as_u16(),
        }
    });

    (status, Json(body)).into_response()
}
