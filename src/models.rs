use serde::{Deserialize, Serialize};

pub const DEFAULT_DIFFICULTY: &str = "medium";
pub const MASTER_LIBRARY_NAME: &str = "All Words";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Library {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_master: bool,
    pub created_at: String,
    pub word_count: i64,
    pub learned_count: i64,
    pub unlearned_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordEntry {
    pub word_id: i64,
    pub word: String,
    pub meaning: String,
    pub pronunciation: Option<String>,
    pub example: Option<String>,
    pub difficulty: String,
    pub is_learned: bool,
    pub learned_at: Option<String>,
    pub added_at: String,
}

/// A CSV row ready to be committed to a library.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWord {
    pub row_number: usize,
    pub word: String,
    pub meaning: String,
    pub pronunciation: Option<String>,
    pub example: Option<String>,
    pub difficulty: String,
}

/// Which CSV headers feed which word fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub word_column: Option<String>,
    pub meaning_column: Option<String>,
    #[serde(default)]
    pub pronunciation_column: Option<String>,
    #[serde(default)]
    pub example_column: Option<String>,
    #[serde(default)]
    pub difficulty_column: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub words_added: usize,
    pub words_skipped: usize,
    pub errors: Vec<String>,
}
