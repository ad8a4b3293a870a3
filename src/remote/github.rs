use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT},
    StatusCode, Url,
};
use serde::Deserialize;

use super::{CommitRequest, CommitResult, RemoteFile, RepositoryClient};
use crate::error::{RemoteError, RemoteResult};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";

/// Error body returned by the GitHub REST API
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
    #[serde(default)]
    documentation_url: Option<String>,
}

/// Envelope of a create-or-update response
#[derive(Debug, Deserialize)]
struct PutResponse {
    content: CommitResult,
}

/// Client for the GitHub REST contents API of one repository
pub struct GithubClient {
    client: reqwest::Client,
    api_url: Url,
    owner: String,
    repo: String,
}

impl GithubClient {
    /// Build a client authenticated with `token` (if any)
    pub fn new(
        api_url: &str,
        owner: impl Into<String>,
        repo: impl Into<String>,
        token: Option<&str>,
    ) -> anyhow::Result<Self> {
        use anyhow::Context;

        let api_url = Url::parse(api_url)
            .with_context(|| format!("Invalid GitHub API URL: {}", api_url))?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));
        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("GitHub token contains invalid header characters")?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("github-uploader/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url,
            owner: owner.into(),
            repo: repo.into(),
        })
    }

    /// URL of `repos/{owner}/{repo}/contents/{path}` with each path segment escaped
    fn contents_url(&self, path: &str) -> RemoteResult<Url> {
        let mut url = self.api_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                RemoteError::Transport(format!("API URL cannot be a base: {}", self.api_url))
            })?;
            segments
                .pop_if_empty()
                .extend(["repos", self.owner.as_str(), self.repo.as_str(), "contents"])
                .extend(path.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    /// Turn a non-success response into a `RemoteError`
    async fn error_from_response(path: &str, response: reqwest::Response) -> RemoteError {
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return RemoteError::NotFound {
                path: path.to_string(),
            };
        }

        let body = response.text().await.unwrap_or_default();
        RemoteError::status(status.as_u16(), error_message(status, &body))
    }
}

/// Pick the most useful message out of an error response body
fn error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(ApiErrorBody {
            message,
            documentation_url: Some(docs),
        }) => format!("{} - {}", message, docs),
        Ok(ApiErrorBody { message, .. }) => message,
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    }
}

#[async_trait]
impl RepositoryClient for GithubClient {
    async fn get_content(&self, path: &str, branch: &str) -> RemoteResult<RemoteFile> {
        let mut url = self.contents_url(path)?;
        url.query_pairs_mut().append_pair("ref", branch);
        tracing::debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(path, response).await);
        }

        let body: serde_json::Value = response.json().await?;
        if body.is_array() {
            return Err(RemoteError::Decode(format!("{} is a directory", path)));
        }
        Ok(serde_json::from_value(body)?)
    }

    async fn put_content(&self, path: &str, commit: CommitRequest) -> RemoteResult<CommitResult> {
        let url = self.contents_url(path)?;
        tracing::debug!("PUT {} ({})", url, commit.message);

        let response = self.client.put(url).json(&commit).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from_response(path, response).await);
        }

        let body: PutResponse = response.json().await?;
        Ok(body.content)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use axum::{
        extract::{Path, Query, State},
        response::{IntoResponse, Response},
        routing::get,
        Json, Router,
    };
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;
    use crate::remote::{decode_content, RevisionMarker};

    fn client(api_url: &str) -> GithubClient {
        GithubClient::new(api_url, "octo", "uploads", Some("t0ken")).unwrap()
    }

    #[test]
    fn test_contents_url() {
        let c = client(DEFAULT_API_URL);
        let url = c.contents_url("files/report 1.pdf").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/octo/uploads/contents/files/report%201.pdf"
        );
    }

    #[test]
    fn test_contents_url_with_enterprise_prefix() {
        let c = client("https://ghe.example.com/api/v3/");
        let url = c.contents_url("/a/b.txt").unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/octo/uploads/contents/a/b.txt"
        );
    }

    #[test]
    fn test_error_message_extraction() {
        let body = r#"{"message":"Bad credentials","documentation_url":"https://docs.github.com/rest"}"#;
        assert_eq!(
            error_message(StatusCode::UNAUTHORIZED, body),
            "Bad credentials - https://docs.github.com/rest"
        );

        let body = r#"{"message":"Invalid request.\n\n\"sha\" wasn't supplied."}"#;
        assert_eq!(
            error_message(StatusCode::UNPROCESSABLE_ENTITY, body),
            "Invalid request.\n\n\"sha\" wasn't supplied."
        );

        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, ""),
            "Bad Gateway"
        );
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream down\n"),
            "upstream down"
        );
    }

    #[test]
    fn test_put_response_parsing() {
        let body = r#"{
            "content": {
                "name": "a.txt",
                "path": "files/a.txt",
                "sha": "95b966ae1c166bd92f8ae7d1c313e738c731dfc3",
                "html_url": "https://github.com/octo/uploads/blob/main/files/a.txt"
            },
            "commit": {"sha": "7638417db6d59f3c431d3e1f261cc637155684cd"}
        }"#;
        let parsed: PutResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.content.path, "files/a.txt");
        assert_eq!(
            parsed.content.html_url,
            "https://github.com/octo/uploads/blob/main/files/a.txt"
        );
    }

    #[test]
    fn test_invalid_api_url() {
        assert!(GithubClient::new("not a url", "octo", "uploads", None).is_err());
    }

    /// Requests seen by the stub API, as JSON records
    type RequestLog = Arc<Mutex<Vec<serde_json::Value>>>;

    async fn stub_get(
        State(log): State<RequestLog>,
        Path(path): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        headers: axum::http::HeaderMap,
    ) -> Response {
        log.lock().unwrap().push(json!({
            "method": "GET",
            "path": path,
            "ref": query.get("ref"),
            "authorization": headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok()),
        }));
        match path.as_str() {
            "files/missing.txt" => (
                StatusCode::NOT_FOUND,
                Json(json!({ "message": "Not Found" })),
            )
                .into_response(),
            "files" => Json(json!([{ "path": "files/a.txt", "sha": "abc123" }])).into_response(),
            _ => Json(json!({
                "path": path,
                "sha": "abc123",
                "content": "aGVs\nbG8=\n",
                "html_url": format!("https://github.com/octo/uploads/blob/dev/{}", path),
            }))
            .into_response(),
        }
    }

    async fn stub_put(
        State(log): State<RequestLog>,
        Path(path): Path<String>,
        Json(body): Json<serde_json::Value>,
    ) -> Response {
        log.lock().unwrap().push(json!({ "method": "PUT", "path": path, "body": body }));
        if path == "files/stale.txt" {
            return (
                StatusCode::CONFLICT,
                Json(json!({ "message": "files/stale.txt does not match abc123" })),
            )
                .into_response();
        }
        Json(json!({
            "content": {
                "name": "a.txt",
                "path": path,
                "sha": "def456",
                "html_url": format!("https://github.com/octo/uploads/blob/dev/{}", path),
            },
            "commit": { "sha": "c0ffee" },
        }))
        .into_response()
    }

    /// Serve a fake contents API on a local port and point a client at it
    async fn stub_api() -> (GithubClient, RequestLog) {
        let log = RequestLog::default();
        let app = Router::new()
            .route(
                "/repos/octo/uploads/contents/{*path}",
                get(stub_get).put(stub_put),
            )
            .with_state(log.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (client(&format!("http://{}", addr)), log)
    }

    #[tokio::test]
    async fn test_get_content_over_http() {
        let (c, log) = stub_api().await;

        let file = c.get_content("files/a.txt", "dev").await.unwrap();
        assert_eq!(file.path, "files/a.txt");
        assert_eq!(file.sha.as_str(), "abc123");
        assert_eq!(
            decode_content(file.content.as_deref().unwrap()).unwrap(),
            b"hello"
        );

        let err = c.get_content("files/missing.txt", "dev").await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::NotFound {
                path: "files/missing.txt".to_string()
            }
        );

        let err = c.get_content("files", "dev").await.unwrap_err();
        assert!(matches!(err, RemoteError::Decode(_)), "{:?}", err);

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0]["ref"], "dev");
        assert_eq!(log[0]["authorization"], "Bearer t0ken");
    }

    #[tokio::test]
    async fn test_put_content_over_http() {
        let (c, log) = stub_api().await;

        let create = CommitRequest {
            message: "Create: a.txt (1:02:03 PM)".to_string(),
            content: "aGk=".to_string(),
            sha: None,
            branch: "dev".to_string(),
        };
        let result = c.put_content("files/a.txt", create.clone()).await.unwrap();
        assert_eq!(result.path, "files/a.txt");
        assert_eq!(result.sha.as_str(), "def456");
        assert_eq!(
            result.html_url,
            "https://github.com/octo/uploads/blob/dev/files/a.txt"
        );

        let update = CommitRequest {
            sha: Some(RevisionMarker::new("abc123")),
            ..create.clone()
        };
        c.put_content("files/a.txt", update).await.unwrap();

        let err = c.put_content("files/stale.txt", create).await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::status(409, "files/stale.txt does not match abc123")
        );

        let log = log.lock().unwrap();
        let created = &log[0]["body"];
        assert!(created.get("sha").is_none());
        assert_eq!(created["branch"], "dev");
        assert_eq!(created["content"], "aGk=");
        assert_eq!(created["message"], "Create: a.txt (1:02:03 PM)");
        assert_eq!(log[1]["body"]["sha"], "abc123");
    }
}
