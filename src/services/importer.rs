use std::collections::HashMap;
use serde::Serialize;
use tracing::{info, debug};

use crate::error::AppError;
use crate::models::{ColumnMapping, ImportSummary, NewWord, DEFAULT_DIFFICULTY};
use crate::services::columns::types::DetectionReport;
use crate::services::columns::utils::{csv_reader, header_names, normalize_name};
use crate::services::columns::ColumnDetector;
use crate::services::word_store::WordStore;

/// Column mapping with both required roles filled in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMapping {
    pub word_column: String,
    pub meaning_column: String,
    pub pronunciation_column: Option<String>,
    pub example_column: Option<String>,
    pub difficulty_column: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub summary: ImportSummary,
    pub mapping: ResolvedMapping,
}

fn read_headers(content: &str) -> Result<Vec<String>, AppError> {
    let mut reader = csv_reader(content);
    let headers = header_names(reader.headers()?);
    if headers.is_empty() {
        return Err(AppError::InvalidInput("No columns found in CSV".to_string()));
    }
    Ok(headers)
}

fn require_column(headers: &[String], column: &str) -> Result<String, AppError> {
    if headers.iter().any(|h| h == column) {
        Ok(column.to_string())
    } else {
        Err(AppError::InvalidInput(format!(
            "Column '{}' not found. Found columns: {}", column, headers.join(", ")
        )))
    }
}

fn optional_column(headers: &[String], requested: Option<&str>, conventional: &str) -> Result<Option<String>, AppError> {
    match requested {
        Some(column) => require_column(headers, column).map(Some),
        None => Ok(headers.iter().find(|h| normalize_name(h) == conventional).cloned()),
    }
}

/// Fills any role the caller left out with the detector's choice.
pub fn resolve_mapping(
    detector: &ColumnDetector,
    content: &str,
    requested: Option<&ColumnMapping>,
) -> Result<ResolvedMapping, AppError> {
    let headers = read_headers(content)?;
    let requested = requested.cloned().unwrap_or_default();

    let mut word_column = requested.word_column.as_deref()
        .map(|c| require_column(&headers, c))
        .transpose()?;
    let mut meaning_column = requested.meaning_column.as_deref()
        .map(|c| require_column(&headers, c))
        .transpose()?;

    if word_column.is_none() || meaning_column.is_none() {
        let report = detector.detect_columns(content);
        if let DetectionReport::Failed { error } = &report {
            return Err(AppError::InvalidInput(error.clone()));
        }
        word_column = word_column.or_else(|| report.word_column().map(str::to_string));
        meaning_column = meaning_column.or_else(|| report.meaning_column().map(str::to_string));

        if word_column.is_none() || meaning_column.is_none() {
            return Err(AppError::MappingRequired {
                message: "Could not determine the word and meaning columns; choose them manually".to_string(),
                analysis: report.analysis().cloned().map(Box::new),
            });
        }
    }

    let (Some(word_column), Some(meaning_column)) = (word_column, meaning_column) else {
        return Err(AppError::Internal("Column mapping was left incomplete".to_string()));
    };

    Ok(ResolvedMapping {
        pronunciation_column: optional_column(&headers, requested.pronunciation_column.as_deref(), "pronunciation")?,
        example_column: optional_column(&headers, requested.example_column.as_deref(), "example")?,
        difficulty_column: optional_column(&headers, requested.difficulty_column.as_deref(), "difficulty")?,
        word_column,
        meaning_column,
    })
}

/// Reads every data row. Rows without a word or meaning become error
/// messages instead of records; row numbers count the header as row 1.
pub fn parse_rows(content: &str, mapping: &ResolvedMapping) -> Result<(Vec<NewWord>, Vec<String>), AppError> {
    let mut reader = csv_reader(content);
    let headers = header_names(reader.headers()?);
    let index: HashMap<&str, usize> = headers.iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut words = Vec::new();
    let mut errors = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row_number = i + 2;
        let cell = |column: Option<&str>| -> Option<String> {
            column
                .and_then(|c| index.get(c))
                .and_then(|&idx| record.get(idx))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let word = cell(Some(mapping.word_column.as_str())).map(|w| w.to_lowercase());
        let meaning = cell(Some(mapping.meaning_column.as_str()));
        let (Some(word), Some(meaning)) = (word, meaning) else {
            errors.push(format!("Row {}: Word and meaning are required", row_number));
            continue;
        };

        words.push(NewWord {
            row_number,
            word,
            meaning,
            pronunciation: cell(mapping.pronunciation_column.as_deref()),
            example: cell(mapping.example_column.as_deref()),
            difficulty: cell(mapping.difficulty_column.as_deref())
                .unwrap_or_else(|| DEFAULT_DIFFICULTY.to_string()),
        });
    }

    debug!("Parsed {} rows with {} errors", words.len(), errors.len());
    Ok((words, errors))
}

pub fn import_csv(
    store: &WordStore,
    detector: &ColumnDetector,
    library_id: i64,
    content: &str,
    requested: Option<&ColumnMapping>,
) -> Result<ImportOutcome, AppError> {
    // fail before parsing when the library is missing
    store.get_library(library_id)?;

    let mapping = resolve_mapping(detector, content, requested)?;
    info!(
        "Importing into library {} using word column '{}' and meaning column '{}'",
        library_id, mapping.word_column, mapping.meaning_column
    );

    let (words, errors) = parse_rows(content, &mapping)?;
    let mut summary = store.import_words(library_id, &words)?;
    summary.errors = errors;

    Ok(ImportOutcome { summary, mapping })
}
