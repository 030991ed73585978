use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, warn};

use super::types::*;
use super::utils::*;

/// Guesses which CSV columns hold the vocabulary word and its meaning.
///
/// Each column is scored on its header name (indicator keywords) and on the
/// shape of the first few data values. Scoring is per column with no
/// normalization across columns.
#[derive(Debug, Clone)]
pub struct ColumnDetector {
    word_indicators: &'static [&'static str],
    meaning_indicators: &'static [&'static str],
    sample_rows: usize,
    min_score: u32,
}

impl Default for ColumnDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnDetector {
    pub fn new() -> Self {
        Self {
            word_indicators: WORD_INDICATORS,
            meaning_indicators: MEANING_INDICATORS,
            sample_rows: SAMPLE_ROWS,
            min_score: MIN_SCORE,
        }
    }

    pub fn detect_columns(&self, content: &str) -> DetectionReport {
        match self.try_detect(content) {
            Ok(detection) => DetectionReport::Detected(detection),
            Err(e) => {
                warn!("Column detection failed: {}", e);
                DetectionReport::Failed { error: e.to_string() }
            }
        }
    }

    fn try_detect(&self, content: &str) -> Result<ColumnDetection, DetectionError> {
        let (headers, rows) = read_sample(content, self.sample_rows)?;
        let column_scores = self.analyze_columns(&headers, &rows);

        let word_column = self.find_best_match(&column_scores, Role::Word);
        let meaning_column = self.find_best_match(&column_scores, Role::Meaning);
        debug!(
            "Detected word column {:?}, meaning column {:?} from {} sampled rows",
            word_column, meaning_column, rows.len()
        );

        Ok(ColumnDetection {
            word_column: word_column.clone(),
            meaning_column: meaning_column.clone(),
            analysis: ColumnAnalysis {
                available_columns: headers,
                column_scores,
                detected_word_column: word_column,
                detected_meaning_column: meaning_column,
            },
        })
    }

    fn analyze_columns(&self, headers: &[String], rows: &[SampledRow]) -> IndexMap<String, ColumnScore> {
        let mut column_scores = IndexMap::with_capacity(headers.len());

        for name in headers {
            let mut score = ColumnScore::default();
            let normalized = normalize_name(name);
            score.word_score += name_score(&normalized, self.word_indicators);
            score.meaning_score += name_score(&normalized, self.meaning_indicators);

            let values: Vec<&str> = rows.iter()
                .filter_map(|row| row.get(name))
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .collect();

            if !values.is_empty() {
                score_content(&mut score, &values);
            }

            debug!(
                "Column {:?}: word_score={}, meaning_score={}, avg_length={:.1}",
                name, score.word_score, score.meaning_score, score.avg_length
            );
            // duplicate header names: later column replaces the earlier score in place
            column_scores.insert(name.clone(), score);
        }

        column_scores
    }

    /// Highest-scoring column for `role`; the first column in header order wins ties.
    fn find_best_match(&self, column_scores: &IndexMap<String, ColumnScore>, role: Role) -> Option<String> {
        let mut best: Option<(&String, u32)> = None;
        for (name, score) in column_scores {
            let value = score.score_for(role);
            if best.map_or(value > 0, |(_, top)| value > top) {
                best = Some((name, value));
            }
        }

        best.filter(|(_, top)| *top >= self.min_score)
            .map(|(name, _)| name.clone())
    }

    /// Name-only suggestions for a manual mapping form. A column can be
    /// suggested for both roles but appears at most once per role.
    pub fn get_mapping_suggestions<S: AsRef<str>>(&self, column_names: &[S]) -> MappingSuggestions {
        let mut suggestions = MappingSuggestions::default();

        for name in column_names {
            let name = name.as_ref();
            let normalized = normalize_name(name);
            if self.word_indicators.iter().any(|k| normalized.contains(k)) {
                suggestions.word_suggestions.push(name.to_string());
            }
            if self.meaning_indicators.iter().any(|k| normalized.contains(k)) {
                suggestions.meaning_suggestions.push(name.to_string());
            }
        }

        suggestions
    }
}

fn name_score(normalized: &str, indicators: &[&str]) -> u32 {
    indicators.iter()
        .filter(|indicator| normalized.contains(**indicator))
        .map(|indicator| if normalized == *indicator { 15 } else { 10 })
        .sum()
}

fn score_content(score: &mut ColumnScore, values: &[&str]) {
    let total_length: usize = values.iter().map(|v| char_len(v)).sum();
    score.avg_length = total_length as f64 / values.len() as f64;
    score.sample_values = values.iter()
        .take(SAMPLE_SIZE)
        .map(|v| v.to_string())
        .collect::<SmallVec<_>>();

    if score.avg_length < 20.0 {
        score.word_score += 5;
    } else if score.avg_length > 50.0 {
        score.meaning_score += 5;
    }

    let word_patterns = values.iter().filter(|v| is_word_shaped(v)).count();
    let meaning_patterns = values.iter().filter(|v| is_meaning_shaped(v)).count();

    if word_patterns > meaning_patterns {
        score.word_score += 3;
    } else if meaning_patterns > word_patterns {
        score.meaning_score += 3;
    }
}
