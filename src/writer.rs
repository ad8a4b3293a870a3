//! Create-or-update of a single file in the remote repository.

use std::sync::Arc;

use chrono::Local;

use crate::{
    error::{RemoteError, RemoteResult},
    remote::{encode_content, CommitRequest, RepositoryClient},
};

/// Result of a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Browser URL of the written file
    pub content_url: String,
    /// Repository-relative path of the written file
    pub raw_url_path: String,
    pub is_update: bool,
}

/// Writes uploaded payloads to one branch of the remote repository
#[derive(Clone)]
pub struct ContentWriter {
    client: Arc<dyn RepositoryClient>,
    branch: String,
}

impl ContentWriter {
    pub fn new(client: Arc<dyn RepositoryClient>, branch: impl Into<String>) -> Self {
        Self {
            client,
            branch: branch.into(),
        }
    }

    /// Write `content` to `path`, creating the file or replacing its content.
    ///
    /// One read resolves the current revision marker; one write commits. A
    /// failed read other than "not found" aborts before anything is written.
    /// Nothing is retried: a concurrent writer that wins the race makes this
    /// call fail with the remote's conflict error.
    pub async fn write(
        &self,
        path: &str,
        original_name: &str,
        content: &[u8],
    ) -> RemoteResult<WriteOutcome> {
        // 1. Resolve existing revision marker (if any)
        let existing = match self.client.get_content(path, &self.branch).await {
            Ok(file) => Some(file.sha),
            Err(RemoteError::NotFound { .. }) => None,
            Err(e) => {
                tracing::error!("Failed to fetch {} before writing: {}", path, e);
                return Err(e);
            }
        };
        let is_update = existing.is_some();
        tracing::debug!(
            "{} {} on {} (marker: {:?})",
            if is_update { "updating" } else { "creating" },
            path,
            self.branch,
            existing
        );

        // 2. Commit the new content
        let commit = CommitRequest {
            message: commit_message(is_update, original_name, &local_time()),
            content: encode_content(content),
            sha: existing,
            branch: self.branch.clone(),
        };
        let result = self.client.put_content(path, commit).await.map_err(|e| {
            tracing::error!("Failed to commit {}: {}", path, e);
            e
        })?;

        tracing::info!(
            "Committed {} ({} bytes, {}) -> {}",
            result.path,
            content.len(),
            if is_update { "update" } else { "create" },
            result.sha
        );

        Ok(WriteOutcome {
            content_url: result.html_url,
            raw_url_path: result.path,
            is_update,
        })
    }
}

fn local_time() -> String {
    Local::now().format("%-I:%M:%S %p").to_string()
}

fn commit_message(is_update: bool, original_name: &str, time: &str) -> String {
    let action = if is_update { "Update" } else { "Create" };
    format!("{}: {} ({})", action, original_name, time)
}
