use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Router,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use crate::{
    AppState,
    error::AppError,
    services::{
        columns::types::{DetectionReport, MappingSuggestions},
        file_processor::{self, UploadSource},
    },
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/imports/detect", post(detect_columns))
        .route("/imports/suggestions", post(mapping_suggestions))
}

#[derive(Debug, Deserialize)]
pub struct SuggestionsRequest {
    columns: Vec<String>,
}

#[axum::debug_handler]
async fn detect_columns(
    State(state): State<Arc<AppState>>,
    Json(source): Json<UploadSource>,
) -> Result<(StatusCode, Json<DetectionReport>), AppError> {
    let start = std::time::Instant::now();
    let content = file_processor::read_upload(&source, state.config.max_file_size).await?;

    let report = state.detector.detect_columns(&content);
    let status = match report.error() {
        Some(_) => StatusCode::UNPROCESSABLE_ENTITY,
        None => StatusCode::OK,
    };
    tracing::info!(
        "Column detection finished in {:?}: word={:?}, meaning={:?}",
        start.elapsed(),
        report.word_column(),
        report.meaning_column()
    );

    Ok((status, Json(report)))
}

async fn mapping_suggestions(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SuggestionsRequest>,
) -> Json<MappingSuggestions> {
    Json(state.detector.get_mapping_suggestions(&request.columns))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::services::word_store::WordStore;

    fn state() -> Arc<AppState> {
        Arc::new(AppState::new(Config::default(), WordStore::open_in_memory().unwrap()))
    }

    fn inline(content: &str) -> UploadSource {
        UploadSource { content: Some(content.to_string()), file: None }
    }

    #[test]
    fn test_detect_endpoint_returns_selection() {
        let content = "word,meaning\nabate,\"to lessen, to subside\"\n";
        let (status, Json(report)) = tokio_test::block_on(
            detect_columns(State(state()), Json(inline(content)))
        ).unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report.word_column(), Some("word"));
        assert_eq!(report.meaning_column(), Some("meaning"));
    }

    #[test]
    fn test_detect_endpoint_reports_malformed_input_as_data() {
        let (status, Json(report)) = tokio_test::block_on(
            detect_columns(State(state()), Json(inline("word,meaning\n")))
        ).unwrap();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(report.error(), Some("No data rows found in CSV"));
    }

    #[test]
    fn test_detect_endpoint_enforces_size_limit() {
        let mut config = Config::default();
        config.max_file_size = 8;
        let state = Arc::new(AppState::new(config, WordStore::open_in_memory().unwrap()));
        let result = tokio_test::block_on(
            detect_columns(State(state), Json(inline("word,meaning\ncat,pet\n")))
        );
        assert!(matches!(result, Err(AppError::PayloadTooLarge(_))));
    }

    #[test]
    fn test_suggestions_endpoint() {
        let request = SuggestionsRequest {
            columns: vec!["Word".to_string(), "Meaning".to_string(), "Notes".to_string()],
        };
        let Json(suggestions) = tokio_test::block_on(
            mapping_suggestions(State(state()), Json(request))
        );
        assert_eq!(suggestions.word_suggestions, vec!["Word"]);
        assert_eq!(suggestions.meaning_suggestions, vec!["Meaning"]);
    }
}
