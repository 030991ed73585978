use bytes::{Bytes, BytesMut};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::AppError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Deserialize)]
pub struct FileInfo {
    #[serde(rename = "type")]
    pub file_type: String,
    pub signed_url: String,
}

/// Where an upload's CSV text comes from: inline in the request or a signed URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadSource {
    pub content: Option<String>,
    pub file: Option<FileInfo>,
}

pub fn validate_file_type(file_type: &str) -> Result<(), AppError> {
    let file_type = file_type.trim().to_lowercase();
    if file_type == "csv" || file_type == "text/csv" || file_type.ends_with(".csv") {
        Ok(())
    } else {
        warn!("Unsupported file type: {}", file_type);
        Err(AppError::InvalidInput("File must be a CSV file".to_string()))
    }
}

pub fn check_size(len: usize, max_size: usize) -> Result<(), AppError> {
    if len == 0 {
        return Err(AppError::InvalidInput("No file uploaded".to_string()));
    }
    if len > max_size {
        return Err(AppError::PayloadTooLarge(format!(
            "Upload is {} bytes; the limit is {} bytes", len, max_size
        )));
    }
    Ok(())
}

pub fn decode_upload(data: &[u8], max_size: usize) -> Result<String, AppError> {
    check_size(data.len(), max_size)?;
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    String::from_utf8(data.to_vec())
        .map_err(|e| AppError::InvalidInput(format!("File is not valid UTF-8: {}", e)))
}

fn too_large(len: usize, max_size: usize) -> AppError {
    AppError::PayloadTooLarge(format!(
        "Upload is at least {} bytes; the limit is {} bytes", len, max_size
    ))
}

/// Appends a downloaded chunk, failing as soon as the total passes `max_size`.
pub fn append_chunk(buffer: &mut BytesMut, chunk: &[u8], max_size: usize) -> Result<(), AppError> {
    let total = buffer.len() + chunk.len();
    if total > max_size {
        return Err(too_large(total, max_size));
    }
    buffer.extend_from_slice(chunk);
    Ok(())
}

/// Downloads a remote upload, stopping once it exceeds `max_size`.
pub async fn load_file_from_url(url: &str, max_size: usize) -> Result<Bytes, AppError> {
    let client = Client::new();
    let mut response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::FileProcessingError(format!("Failed to fetch file: {}", e)))?;

    if !response.status().is_success() {
        return Err(AppError::FileProcessingError(
            format!("Failed to fetch file. Status: {}", response.status())
        ));
    }

    if let Some(len) = response.content_length() {
        if len > max_size as u64 {
            warn!("Rejecting remote file of {} bytes before download", len);
            return Err(too_large(usize::try_from(len).unwrap_or(usize::MAX), max_size));
        }
    }

    let mut buffer = BytesMut::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| AppError::FileProcessingError(format!("Failed to read response bytes: {}", e)))?
    {
        append_chunk(&mut buffer, &chunk, max_size)?;
    }

    Ok(buffer.freeze())
}

pub async fn read_upload(source: &UploadSource, max_size: usize) -> Result<String, AppError> {
    match (&source.content, &source.file) {
        (Some(content), None) => {
            check_size(content.len(), max_size)?;
            Ok(content.strip_prefix('\u{feff}').unwrap_or(content).to_string())
        }
        (None, Some(file)) => {
            validate_file_type(&file.file_type)?;
            let start = std::time::Instant::now();
            let data = load_file_from_url(&file.signed_url, max_size).await?;
            info!("File downloaded, size: {}KB, took: {:?}", data.len() / 1024, start.elapsed());
            decode_upload(&data, max_size)
        }
        (Some(_), Some(_)) => Err(AppError::InvalidInput(
            "Provide either content or file, not both".to_string()
        )),
        (None, None) => Err(AppError::InvalidInput("No file uploaded".to_string())),
    }
}
