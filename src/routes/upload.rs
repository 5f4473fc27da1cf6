//! Multipart upload staging
//!
//! Both job endpoints take one media file plus a JSON `payload` form field.
//! The file is written into a per-request temporary directory that is removed
//! when the [`StagedUpload`] is dropped.

use std::path::{Path, PathBuf};

use anyhow::Context;
use axum::extract::Multipart;
use serde::de::DeserializeOwned;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};

pub const PAYLOAD_FIELD: &str = "payload";

/// An uploaded media file and its raw JSON payload
#[derive(Debug)]
pub struct StagedUpload {
    pub dir: TempDir,
    pub file: PathBuf,
    pub payload: String,
}

/// Read the multipart body, staging `file_field` on disk
pub async fn stage_upload(mut multipart: Multipart, file_field: &str) -> AppResult<StagedUpload> {
    let dir = tempfile::tempdir().context("Failed to create upload directory")?;
    let mut file = None;
    let mut payload = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(name) if name == file_field => {
                let file_name = staged_file_name(field.file_name());
                let data = field.bytes().await?;
                if data.is_empty() {
                    return Err(AppError::BadRequest(format!("{} is empty", file_field)));
                }

                let path = dir.path().join(file_name);
                tokio::fs::write(&path, &data)
                    .await
                    .context("Failed to stage uploaded file")?;
                info!(field = file_field, path = %path.display(), bytes = data.len(), "Upload staged");
                file = Some(path);
            }
            Some(PAYLOAD_FIELD) => payload = Some(field.text().await?),
            other => debug!(field = ?other, "Ignoring unexpected form field"),
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest(format!("Missing {} field", file_field)))?;
    let payload =
        payload.ok_or_else(|| AppError::BadRequest(format!("Missing {} field", PAYLOAD_FIELD)))?;

    Ok(StagedUpload { dir, file, payload })
}

/// Parse the JSON payload field
pub fn parse_payload<T: DeserializeOwned>(raw: &str) -> AppResult<T> {
    serde_json::from_str(raw).map_err(|e| AppError::BadRequest(format!("Invalid JSON payload: {}", e)))
}

/// Keep only the final component of a client-supplied file name
fn staged_file_name(client_name: Option<&str>) -> String {
    client_name
        .and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .unwrap_or("upload")
        .to_string()
}
