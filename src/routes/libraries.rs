use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Router,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use crate::{
    AppState,
    error::AppError,
    models::{ColumnMapping, ImportSummary, Library, WordEntry},
    services::{
        file_processor::{self, UploadSource},
        importer::{self, ResolvedMapping},
    },
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/libraries", get(list_libraries).post(create_library))
        .route("/libraries/:id", get(get_library).put(update_library).delete(delete_library))
        .route("/libraries/:id/import", post(import_into_library))
        .route("/libraries/:id/words", get(list_words))
        .route("/libraries/:id/words/:word_id/learned", put(set_learned))
}

#[derive(Debug, Deserialize)]
pub struct LibraryRequest {
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    #[serde(flatten)]
    source: UploadSource,
    mapping: Option<ColumnMapping>,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    message: String,
    data: ImportSummary,
    mapping: ResolvedMapping,
}

#[derive(Debug, Default, Deserialize)]
pub struct WordsQuery {
    learned: Option<bool>,
    search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LearnedRequest {
    learned: bool,
}

async fn list_libraries(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Library>>, AppError> {
    Ok(Json(state.store.list_libraries()?))
}

async fn create_library(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LibraryRequest>,
) -> Result<(StatusCode, Json<Library>), AppError> {
    let library = state.store.create_library(&request.name, request.description.as_deref())?;
    Ok((StatusCode::CREATED, Json(library)))
}

async fn get_library(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Library>, AppError> {
    Ok(Json(state.store.get_library(id)?))
}

async fn update_library(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<LibraryRequest>,
) -> Result<Json<Library>, AppError> {
    Ok(Json(state.store.update_library(id, &request.name, request.description.as_deref())?))
}

async fn delete_library(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    state.store.delete_library(id)?;
    Ok(Json(json!({ "message": "Library deleted successfully" })))
}

#[axum::debug_handler]
async fn import_into_library(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<ImportRequest>,
) -> Result<Json<ImportResponse>, AppError> {
    let start = std::time::Instant::now();
    tracing::info!("Starting CSV import into library {}", id);

    let content = file_processor::read_upload(&request.source, state.config.max_file_size).await?;
    // SQLite work runs off the async workers
    let mapping = request.mapping;
    let worker = state.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        importer::import_csv(&worker.store, &worker.detector, id, &content, mapping.as_ref())
    })
    .await
    .map_err(|e| AppError::Internal(format!("Import task failed: {}", e)))??;

    tracing::info!("CSV import into library {} completed in {:?}", id, start.elapsed());

    Ok(Json(ImportResponse {
        message: "CSV processed successfully".to_string(),
        data: outcome.summary,
        mapping: outcome.mapping,
    }))
}

async fn list_words(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(query): Query<WordsQuery>,
) -> Result<Json<Vec<WordEntry>>, AppError> {
    Ok(Json(state.store.list_words(id, query.learned, query.search.as_deref())?))
}

async fn set_learned(
    State(state): State<Arc<AppState>>,
    Path((id, word_id)): Path<(i64, i64)>,
    Json(request): Json<LearnedRequest>,
) -> Result<Json<WordEntry>, AppError> {
    Ok(Json(state.store.set_learned(id, word_id, request.learned)?))
}
