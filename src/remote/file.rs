use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque blob SHA assigned by the remote on every write.
/// Required to update an existing path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionMarker(String);

impl RevisionMarker {
    pub fn new(sha: impl Into<String>) -> Self {
        RevisionMarker(sha.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RevisionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A file as returned by the contents API
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteFile {
    pub path: String,
    pub sha: RevisionMarker,
    /// Transport-encoded (base64) content, possibly line-wrapped
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// Body of a create-or-update call
#[derive(Debug, Clone, Serialize)]
pub struct CommitRequest {
    pub message: String,
    /// Base64-encoded payload
    pub content: String,
    /// Omitted on create
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<RevisionMarker>,
    pub branch: String,
}

/// The `content` half of a successful write response
#[derive(Debug, Clone, Deserialize)]
pub struct CommitResult {
    pub path: String,
    pub sha: RevisionMarker,
    #[serde(default)]
    pub html_url: String,
}
