use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use tokio::sync::Mutex;

use super::{
    decode_content, encode_content, CommitRequest, CommitResult, RemoteFile, RepositoryClient,
    RevisionMarker,
};
use crate::error::{RemoteError, RemoteResult};

/// A stored blob on one branch
#[derive(Debug, Clone)]
struct StoredFile {
    sha: RevisionMarker,
    /// Kept transport-encoded, as the contents API hands it out
    content: String,
}

#[derive(Debug, Default)]
struct Inner {
    /// (branch, path) -> file
    files: BTreeMap<(String, String), StoredFile>,
    /// path -> error returned by every read of that path
    read_faults: BTreeMap<String, RemoteError>,
    /// path -> error returned by every write of that path
    write_faults: BTreeMap<String, RemoteError>,
}

/// In-process remote repository.
///
/// Blob SHAs are computed the way git computes them, and writes are checked
/// against the current SHA the way the contents API checks them, so create,
/// update and conflict behavior matches the real remote. Cloning shares the
/// same underlying store.
#[derive(Clone)]
pub struct MemoryRepository {
    name: String,
    inner: Arc<Mutex<Inner>>,
    reads: Arc<AtomicUsize>,
    writes: Arc<AtomicUsize>,
}

impl MemoryRepository {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryRepository {
            name: name.into(),
            inner: Arc::new(Mutex::new(Inner::default())),
            reads: Arc::new(AtomicUsize::new(0)),
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Compute the git blob SHA-1 of `data`
    pub fn blob_sha(data: &[u8]) -> String {
        let header = format!("blob {}\0", data.len());
        let mut hasher = Sha1::new();
        hasher.update(header.as_bytes());
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    fn html_url(&self, branch: &str, path: &str) -> String {
        format!("memory://{}/blob/{}/{}", self.name, branch, path)
    }

    /// Seed a file without going through the API (not counted as a write)
    pub async fn insert(&self, branch: &str, path: &str, data: &[u8]) -> RevisionMarker {
        let sha = RevisionMarker::new(Self::blob_sha(data));
        let mut inner = self.inner.lock().await;
        inner.files.insert(
            (branch.to_string(), path.to_string()),
            StoredFile {
                sha: sha.clone(),
                content: encode_content(data),
            },
        );
        sha
    }

    /// Decoded content of a file, if present (not counted as a read)
    pub async fn read(&self, branch: &str, path: &str) -> Option<Vec<u8>> {
        let inner = self.inner.lock().await;
        inner
            .files
            .get(&(branch.to_string(), path.to_string()))
            .and_then(|f| decode_content(&f.content).ok())
    }

    /// Current revision marker of a file, if present
    pub async fn revision(&self, branch: &str, path: &str) -> Option<RevisionMarker> {
        let inner = self.inner.lock().await;
        inner
            .files
            .get(&(branch.to_string(), path.to_string()))
            .map(|f| f.sha.clone())
    }

    /// Make every read of `path` fail with `error`
    pub async fn fail_reads(&self, path: &str, error: RemoteError) {
        self.inner
            .lock()
            .await
            .read_faults
            .insert(path.to_string(), error);
    }

    /// Make every write of `path` fail with `error`
    pub async fn fail_writes(&self, path: &str, error: RemoteError) {
        self.inner
            .lock()
            .await
            .write_faults
            .insert(path.to_string(), error);
    }

    /// Number of `get_content` calls served, including failed ones
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `put_content` calls served, including failed ones
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryClient for MemoryRepository {
    async fn get_content(&self, path: &str, branch: &str) -> RemoteResult<RemoteFile> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.lock().await;

        if let Some(err) = inner.read_faults.get(path) {
            return Err(err.clone());
        }

        let file = inner
            .files
            .get(&(branch.to_string(), path.to_string()))
            .ok_or_else(|| RemoteError::NotFound {
                path: path.to_string(),
            })?;

        Ok(RemoteFile {
            path: path.to_string(),
            sha: file.sha.clone(),
            content: Some(file.content.clone()),
            html_url: Some(self.html_url(branch, path)),
        })
    }

    async fn put_content(&self, path: &str, commit: CommitRequest) -> RemoteResult<CommitResult> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock().await;

        if let Some(err) = inner.write_faults.get(path) {
            return Err(err.clone());
        }

        let data = decode_content(&commit.content)
            .map_err(|_| RemoteError::status(422, "content is not valid Base64"))?;

        let key = (commit.branch.clone(), path.to_string());
        match (inner.files.get(&key), &commit.sha) {
            (Some(_), None) => {
                return Err(RemoteError::status(
                    422,
                    "Invalid request.\n\n\"sha\" wasn't supplied.",
                ));
            }
            (Some(existing), Some(sha)) if existing.sha != *sha => {
                return Err(RemoteError::status(
                    409,
                    format!("{} does not match {}", path, sha),
                ));
            }
            (None, Some(sha)) => {
                return Err(RemoteError::status(
                    409,
                    format!("{} does not match {}", path, sha),
                ));
            }
            _ => {}
        }

        let sha = RevisionMarker::new(Self::blob_sha(&data));
        inner.files.insert(
            key,
            StoredFile {
                sha: sha.clone(),
                content: encode_content(&data),
            },
        );
        tracing::debug!("memory: committed {} on {}: {}", path, commit.branch, commit.message);

        Ok(CommitResult {
            path: path.to_string(),
            sha,
            html_url: self.html_url(&commit.branch, path),
        })
    }
}
