use csv::{ReaderBuilder, StringRecord};
use super::types::{DetectionError, SampledRow};

pub fn csv_reader(content: &str) -> csv::Reader<&[u8]> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes())
}

pub fn header_names(record: &StringRecord) -> Vec<String> {
    record.iter().map(|name| name.to_string()).collect()
}

/// Reads the header row and up to `limit` data rows. Rows past `limit` are
/// never parsed.
pub fn read_sample(content: &str, limit: usize) -> Result<(Vec<String>, Vec<SampledRow>), DetectionError> {
    let mut reader = csv_reader(content);
    let headers = header_names(reader.headers()?);
    if headers.is_empty() {
        return Err(DetectionError::EmptyInput);
    }

    let mut rows = Vec::with_capacity(limit);
    for record in reader.records().take(limit) {
        let record = record?;
        rows.push(to_row(&headers, &record));
    }

    if rows.is_empty() {
        return Err(DetectionError::NoDataRows);
    }

    Ok((headers, rows))
}

pub fn to_row(headers: &[String], record: &StringRecord) -> SampledRow {
    headers.iter()
        .zip(record.iter())
        .map(|(name, value)| (name.clone(), value.to_string()))
        .collect()
}

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Length in characters, not bytes.
pub fn char_len(value: &str) -> usize {
    value.chars().count()
}

/// Short values of a few tokens look like headwords.
pub fn is_word_shaped(value: &str) -> bool {
    value.split_whitespace().count() <= 3 && char_len(value) < 25
}

/// Long values or values carrying sentence punctuation look like definitions.
pub fn is_meaning_shaped(value: &str) -> bool {
    char_len(value) > 30 || value.contains('.') || value.contains(',')
}
