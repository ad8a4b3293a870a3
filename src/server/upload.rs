//! Handle `POST /api/upload`

use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use super::AppState;
use crate::error::RemoteError;

const FILE_FIELD: &str = "file";
const PATH_FIELD: &str = "repoPath";
const FALLBACK_NAME: &str = "upload";
const UPLOAD_FAILED: &str = "Upload Failed due to GitHub API or Server Error";

/// Why an upload was refused or failed
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Server error: GITHUB_TOKEN not set.")]
    MissingToken,
    #[error("No file uploaded.")]
    NoFile,
    #[error("{0}")]
    Multipart(String),
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl UploadError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            UploadError::MissingToken | UploadError::Remote(_) => StatusCode::INTERNAL_SERVER_ERROR,
            UploadError::NoFile | UploadError::Multipart(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let body = match &self {
            UploadError::Remote(e) => json!({ "message": UPLOAD_FAILED, "error": e.to_string() }),
            other => json!({ "message": other.to_string() }),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Successful upload reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub content_url: String,
    pub raw_url_path: String,
}

/// A parsed upload body
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub content: Vec<u8>,
    pub original_name: String,
    /// Caller-chosen destination, as sent
    pub repo_path: Option<String>,
}

impl UploadRequest {
    /// Destination path in the repository.
    ///
    /// Leading slashes of a caller path are dropped; no path, or one that is
    /// empty once stripped, falls back to `<prefix>/<original name>`.
    pub fn destination(&self, prefix: &str) -> String {
        let requested = self
            .repo_path
            .as_deref()
            .map(|p| p.trim_start_matches('/'))
            .filter(|p| !p.is_empty());

        match requested {
            Some(path) => path.to_string(),
            None => {
                let prefix = prefix.trim_matches('/');
                if prefix.is_empty() {
                    self.original_name.clone()
                } else {
                    format!("{}/{}", prefix, self.original_name)
                }
            }
        }
    }
}

/// Pull the file and optional path out of a multipart body.
/// Returns `None` when no `file` part carries a filename.
async fn read_upload(multipart: &mut Multipart) -> Result<Option<UploadRequest>, UploadError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut repo_path = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.body_text()))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            // A `file` part without a filename is a plain text field, not an upload
            Some(FILE_FIELD) if file.is_none() && field.file_name().is_some() => {
                let name = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .unwrap_or(FALLBACK_NAME)
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| UploadError::Multipart(e.body_text()))?;
                file = Some((name, bytes.to_vec()));
            }
            Some(PATH_FIELD) => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| UploadError::Multipart(e.body_text()))?;
                repo_path = Some(text);
            }
            // Unknown fields are skipped by the next `next_field` call
            _ => {}
        }
    }

    Ok(file.map(|(original_name, content)| UploadRequest {
        content,
        original_name,
        repo_path,
    }))
}

/// Store an uploaded file in the repository, then bump the upload counter
pub async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, UploadError> {
    if state.config.github_token.is_none() {
        tracing::error!("Rejecting upload: GITHUB_TOKEN not set");
        return Err(UploadError::MissingToken);
    }

    let mut multipart = multipart.map_err(|e| UploadError::Multipart(e.body_text()))?;
    let request = read_upload(&mut multipart)
        .await?
        .ok_or(UploadError::NoFile)?;

    let path = request.destination(&state.config.upload_prefix);
    tracing::info!(
        "Upload of {} ({} bytes) to {}",
        request.original_name,
        request.content.len(),
        path
    );

    let outcome = state
        .writer
        .write(&path, &request.original_name, &request.content)
        .await
        .map_err(|e| {
            tracing::error!("GitHub API Error: {}", e);
            UploadError::Remote(e)
        })?;

    // Best effort; cannot fail the upload
    state.counter.increment().await;

    let message = if outcome.is_update {
        "File updated successfully."
    } else {
        "New file uploaded successfully."
    };

    Ok(Json(UploadResponse {
        message: message.to_string(),
        content_url: outcome.content_url,
        raw_url_path: outcome.raw_url_path,
    }))
}
