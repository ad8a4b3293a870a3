use async_trait::async_trait;

use super::{CommitRequest, CommitResult, RemoteFile};
use crate::error::RemoteResult;

/// Contents API of a version-controlled remote repository.
///
/// Both calls address a single path on a single repository; the branch is
/// chosen by the caller. Implementations perform no locking: a read followed
/// by a write may race with other writers, and the remote is expected to
/// reject a write whose revision marker is stale.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Fetch metadata and encoded content of `path` on `branch`.
    /// Returns `RemoteError::NotFound` if the path has never been written.
    async fn get_content(&self, path: &str, branch: &str) -> RemoteResult<RemoteFile>;

    /// Create `path`, or update it when `commit.sha` names its current revision.
    async fn put_content(&self, path: &str, commit: CommitRequest) -> RemoteResult<CommitResult>;
}
