use indexmap::IndexMap;
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::HashMap;
use thiserror::Error;

/// Data rows read after the header for content scoring.
pub const SAMPLE_ROWS: usize = 5;
/// Non-empty values kept per column for display.
pub const SAMPLE_SIZE: usize = 3;
/// Lowest score a column needs to be selected for a role.
pub const MIN_SCORE: u32 = 3;

pub const WORD_INDICATORS: &[&str] = &[
    "word", "term", "vocabulary", "vocab", "lexicon", "expression",
    "phrase", "item", "entry", "headword", "lemma",
];

pub const MEANING_INDICATORS: &[&str] = &[
    "meaning", "definition", "def", "description", "explanation",
    "translation", "sense", "interpretation", "significance",
    "import", "denotation", "connotation",
];

/// One sampled data row keyed by header name. Duplicate headers keep the last cell.
pub type SampledRow = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Word,
    Meaning,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColumnScore {
    pub word_score: u32,
    pub meaning_score: u32,
    pub avg_length: f64,
    pub sample_values: SmallVec<[String; SAMPLE_SIZE]>,
}

impl ColumnScore {
    pub fn score_for(&self, role: Role) -> u32 {
        match role {
            Role::Word => self.word_score,
            Role::Meaning => self.meaning_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnAnalysis {
    pub available_columns: Vec<String>,
    pub column_scores: IndexMap<String, ColumnScore>,
    pub detected_word_column: Option<String>,
    pub detected_meaning_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDetection {
    pub word_column: Option<String>,
    pub meaning_column: Option<String>,
    pub analysis: ColumnAnalysis,
}

/// Outcome of `ColumnDetector::detect_columns`. Malformed input is reported
/// as the `Failed` variant, which serializes to `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetectionReport {
    Detected(ColumnDetection),
    Failed { error: String },
}

impl DetectionReport {
    pub fn word_column(&self) -> Option<&str> {
        match self {
            DetectionReport::Detected(d) => d.word_column.as_deref(),
            DetectionReport::Failed { .. } => None,
        }
    }

    pub fn meaning_column(&self) -> Option<&str> {
        match self {
            DetectionReport::Detected(d) => d.meaning_column.as_deref(),
            DetectionReport::Failed { .. } => None,
        }
    }

    pub fn analysis(&self) -> Option<&ColumnAnalysis> {
        match self {
            DetectionReport::Detected(d) => Some(&d.analysis),
            DetectionReport::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            DetectionReport::Detected(_) => None,
            DetectionReport::Failed { error } => Some(error),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectionError {
    #[error("No columns found in CSV")]
    EmptyInput,
    #[error("No data rows found in CSV")]
    NoDataRows,
    /// Reader error. The reader is flexible and its input is already UTF-8,
    /// so this is a safeguard rather than an expected outcome.
    #[error("Failed to analyze CSV: {0}")]
    ParseFailure(String),
}

impl From<csv::Error> for DetectionError {
    fn from(err: csv::Error) -> Self {
        DetectionError::ParseFailure(err.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappingSuggestions {
    pub word_suggestions: Vec<String>,
    pub meaning_suggestions: Vec<String>,
}
