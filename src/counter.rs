//! Best-effort upload counter kept as a JSON file in the remote repository.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    error::RemoteError,
    remote::{decode_content, encode_content, CommitRequest, RepositoryClient, RevisionMarker},
};

/// Contents of the counter file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    #[serde(default)]
    pub count: u64,
}

impl CounterState {
    /// Parse counter file bytes; `None` when they are not a counter record
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let text = std::str::from_utf8(bytes).ok()?;
        // Only an object is a counter record; serde would also accept `[n]`
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value).ok()
    }

    /// Pretty JSON with two-space indentation
    pub fn to_json(&self) -> String {
        // Serializing a struct of one integer cannot fail
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|_| format!("{{\"count\": {}}}", self.count))
    }
}

/// Increments the counter file after each successful upload.
///
/// Failures never reach the caller: they are logged and the increment is
/// dropped. Concurrent increments can read the same value and lose one.
#[derive(Clone)]
pub struct CounterUpdater {
    client: Arc<dyn RepositoryClient>,
    path: String,
    branch: String,
}

impl CounterUpdater {
    pub fn new(
        client: Arc<dyn RepositoryClient>,
        path: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            client,
            path: path.into(),
            branch: branch.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Read, increment and commit the counter
    pub async fn increment(&self) {
        // 1. Current value and marker
        let (current, sha) = match self.client.get_content(&self.path, &self.branch).await {
            Ok(file) => {
                let current = file
                    .content
                    .as_deref()
                    .and_then(|encoded| decode_content(encoded).ok())
                    .and_then(|bytes| CounterState::parse(&bytes));
                let current = current.unwrap_or_else(|| {
                    tracing::warn!(
                        "Could not parse existing counter at {}. Starting count from 0.",
                        self.path
                    );
                    CounterState::default()
                });
                (current, Some(file.sha))
            }
            Err(RemoteError::NotFound { .. }) => (CounterState::default(), None),
            Err(e) => {
                tracing::error!("Error fetching counter {}: {}", self.path, e);
                return;
            }
        };

        // 2. Commit the next value
        let next = CounterState {
            count: current.count.saturating_add(1),
        };
        match self.commit(next, sha).await {
            Ok(()) => tracing::info!(count = next.count, "Counter updated to: {}", next.count),
            Err(e) => tracing::error!("Counter Update Failed: {}", e),
        }
    }

    async fn commit(
        &self,
        state: CounterState,
        sha: Option<RevisionMarker>,
    ) -> Result<(), RemoteError> {
        let commit = CommitRequest {
            message: format!("Auto-increment counter to {}", state.count),
            content: encode_content(state.to_json().as_bytes()),
            sha,
            branch: self.branch.clone(),
        };
        self.client.put_content(&self.path, commit).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MemoryRepository;

    const PATH: &str = "upload_count.json";

    fn updater(repo: &MemoryRepository) -> CounterUpdater {
        CounterUpdater::new(Arc::new(repo.clone()), PATH, "main")
    }

    async fn stored(repo: &MemoryRepository) -> String {
        String::from_utf8(repo.read("main", PATH).await.unwrap()).unwrap()
    }

    #[test]
    fn test_parse() {
        assert_eq!(CounterState::parse(br#"{"count": 7}"#), Some(CounterState { count: 7 }));
        assert_eq!(CounterState::parse(b"{}"), Some(CounterState { count: 0 }));
        assert_eq!(CounterState::parse(b"seven"), None);
        assert_eq!(CounterState::parse(&[0xff, 0xfe]), None);
        assert_eq!(CounterState::parse(br#"{"count": -1}"#), None);
        assert_eq!(CounterState::parse(b"[5]"), None);
        assert_eq!(CounterState::parse(b"5"), None);
    }

    #[test]
    fn test_to_json_is_pretty() {
        assert_eq!(CounterState { count: 1 }.to_json(), "{\n  \"count\": 1\n}");
    }

    #[tokio::test]
    async fn test_absent_counter_starts_at_one() {
        let repo = MemoryRepository::new("octo/uploads");
        updater(&repo).increment().await;

        assert_eq!(stored(&repo).await, "{\n  \"count\": 1\n}");
    }

    #[tokio::test]
    async fn test_existing_counter_increments() {
        let repo = MemoryRepository::new("octo/uploads");
        repo.insert("main", PATH, br#"{"count": 41}"#).await;

        let u = updater(&repo);
        u.increment().await;
        u.increment().await;

        assert_eq!(CounterState::parse(stored(&repo).await.as_bytes()).unwrap().count, 43);
    }

    #[tokio::test]
    async fn test_malformed_counter_is_overwritten() {
        let repo = MemoryRepository::new("octo/uploads");
        repo.insert("main", PATH, b"this is not json").await;

        updater(&repo).increment().await;

        assert_eq!(stored(&repo).await, "{\n  \"count\": 1\n}");
    }

    #[tokio::test]
    async fn test_array_counter_restarts_at_one() {
        let repo = MemoryRepository::new("octo/uploads");
        repo.insert("main", PATH, b"[5]").await;

        updater(&repo).increment().await;

        assert_eq!(stored(&repo).await, "{\n  \"count\": 1\n}");
    }

    #[tokio::test]
    async fn test_fetch_error_skips_write() {
        let repo = MemoryRepository::new("octo/uploads");
        repo.insert("main", PATH, br#"{"count": 5}"#).await;
        repo.fail_reads(PATH, RemoteError::status(502, "Bad Gateway")).await;

        updater(&repo).increment().await;

        assert_eq!(repo.write_count(), 0);
        assert_eq!(stored(&repo).await, r#"{"count": 5}"#);
    }

    #[tokio::test]
    async fn test_write_error_is_swallowed() {
        let repo = MemoryRepository::new("octo/uploads");
        repo.fail_writes(PATH, RemoteError::status(409, "conflict")).await;

        updater(&repo).increment().await;

        assert_eq!(repo.write_count(), 1);
        assert!(repo.read("main", PATH).await.is_none());
    }
}
