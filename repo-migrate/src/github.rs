//! # GitHub client
//!
//! Bridges [`repo_migrate_core::contract::RepositoryClient`] to the GitHub
//! contents API over `reqwest`:
//!
//! - `GET  /user` for the credential check
//! - `GET  /repos/{owner}/{repo}` for repository access
//! - `GET  /repos/{owner}/{repo}/contents/{path}` for listings and file reads
//! - `PUT  /repos/{owner}/{repo}/contents/{path}` for writes
//! - `GET  /repos/{owner}/{repo}/git/blobs/{sha}` for files the contents API
//!   will not inline (larger than 1 MB)
//!
//! Every trait method sends exactly one request, so the core's rate limiter
//! sees all traffic. The provider's own rate-limit headers are only logged.
//! Overwriting a file needs its current blob sha, which the core looks up
//! with `file_sha` before the write.

use async_trait::async_trait;
use repo_migrate_core::contract::{ClientError, ContentEntry, RepoRef, RepositoryClient, WriteFile};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::load_config::AppConfig;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
/// Most entries the contents API returns for one directory.
pub const LISTING_LIMIT: usize = 1000;
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = concat!("repo-migrate/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("invalid API url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request {method} {url} failed: {source}")]
    Transport {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {url} returned {status}: {message}")]
    Status {
        method: &'static str,
        url: String,
        status: StatusCode,
        message: String,
    },

    #[error("unexpected response from {url}: {reason}")]
    Unexpected { url: String, reason: String },
}

impl GitHubError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GitHubError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

/// The contents endpoint answers with an array for directories and an
/// object for files.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsResponse {
    Listing(Vec<ContentEntry>),
    Single(ContentEntry),
}

#[derive(Debug, Deserialize)]
struct Blob {
    content: String,
    encoding: String,
}

#[derive(Debug, Serialize)]
struct PutContents<'a> {
    message: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub struct GitHubClient {
    http: Client,
    base: Url,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: &str) -> Result<Self, GitHubError> {
        let base = Url::parse(api_url).map_err(|e| GitHubError::InvalidUrl {
            url: api_url.to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(GitHubError::InvalidUrl {
                url: api_url.to_string(),
                reason: "not a base URL".to_string(),
            });
        }

        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| GitHubError::InvalidToken(e.to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(GitHubError::Client)?;

        info!(api_url = %base, token_set = !token.is_empty(), "Initialized GitHub client");
        Ok(Self { http, base })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, GitHubError> {
        Self::new(&config.api_url, config.token.expose())
    }

    /// Base URL extended with percent-encoded path segments.
    fn endpoint<'s, I>(&self, segments: I) -> Url
    where
        I: IntoIterator<Item = &'s str>,
    {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn repo_url(&self, repo: &RepoRef) -> Url {
        self.endpoint(["repos", repo.owner.as_str(), repo.repo.as_str()])
    }

    fn contents_url(&self, repo: &RepoRef, path: &str) -> Url {
        let head = ["repos", repo.owner.as_str(), repo.repo.as_str(), "contents"];
        let tail = path.split('/').filter(|s| !s.is_empty());
        self.endpoint(head.into_iter().chain(tail))
    }

    fn blob_url(&self, repo: &RepoRef, sha: &str) -> Url {
        self.endpoint(["repos", repo.owner.as_str(), repo.repo.as_str(), "git", "blobs", sha])
    }

    async fn send(
        &self,
        method: &'static str,
        url: &Url,
        request: RequestBuilder,
    ) -> Result<Response, GitHubError> {
        let response = request.send().await.map_err(|e| GitHubError::Transport {
            method,
            url: url.to_string(),
            source: e,
        })?;

        if let Some(remaining) = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
        {
            debug!(method, url = %url, remaining, "GitHub rate limit remaining");
        }

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GitHubError::Status {
            method,
            url: url.to_string(),
            status,
            message: error_message(&body),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, GitHubError> {
        let response = self.send("GET", &url, self.http.get(url.clone())).await?;
        response.json::<T>().await.map_err(|e| GitHubError::Unexpected {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn get_contents(&self, repo: &RepoRef, path: &str) -> Result<ContentsResponse, GitHubError> {
        self.get_json(self.contents_url(repo, path)).await
    }
}

#[async_trait]
impl RepositoryClient for GitHubClient {
    async fn authenticate_check(&self) -> Result<(), ClientError> {
        let url = self.endpoint(["user"]);
        self.send("GET", &url, self.http.get(url.clone())).await?;
        info!("GitHub credential accepted");
        Ok(())
    }

    async fn repo_exists(&self, repo: &RepoRef) -> Result<(), ClientError> {
        let url = self.repo_url(repo);
        self.send("GET", &url, self.http.get(url.clone())).await?;
        debug!(repo = %repo, "Repository accessible");
        Ok(())
    }

    async fn list_contents(
        &self,
        repo: &RepoRef,
        path: &str,
    ) -> Result<Vec<ContentEntry>, ClientError> {
        let entries = match self.get_contents(repo, path).await? {
            ContentsResponse::Listing(entries) => entries,
            ContentsResponse::Single(entry) => vec![entry],
        };
        if entries.len() >= LISTING_LIMIT {
            warn!(
                repo = %repo,
                path,
                count = entries.len(),
                "Directory listing hit the contents API limit, entries beyond it are not migrated"
            );
        }
        debug!(repo = %repo, path, count = entries.len(), "Listed contents");
        Ok(entries)
    }

    async fn get_file_content(
        &self,
        repo: &RepoRef,
        path: &str,
    ) -> Result<ContentEntry, ClientError> {
        match self.get_contents(repo, path).await? {
            ContentsResponse::Single(entry) => Ok(entry),
            ContentsResponse::Listing(_) => Err(GitHubError::Unexpected {
                url: self.contents_url(repo, path).to_string(),
                reason: "path is a directory, not a file".to_string(),
            }
            .into()),
        }
    }

    async fn get_blob(&self, repo: &RepoRef, sha: &str) -> Result<String, ClientError> {
        let url = self.blob_url(repo, sha);
        let blob: Blob = self.get_json(url.clone()).await?;
        if blob.encoding != "base64" {
            return Err(GitHubError::Unexpected {
                url: url.to_string(),
                reason: format!("unsupported blob encoding {}", blob.encoding),
            }
            .into());
        }
        Ok(blob.content)
    }

    async fn file_sha(&self, repo: &RepoRef, path: &str) -> Result<Option<String>, ClientError> {
        match self.get_contents(repo, path).await {
            Ok(ContentsResponse::Single(entry)) => Ok(Some(entry.sha)),
            Ok(ContentsResponse::Listing(_)) => Err(GitHubError::Unexpected {
                url: self.contents_url(repo, path).to_string(),
                reason: "target path is a directory".to_string(),
            }
            .into()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_or_update_file<'a>(&self, req: WriteFile<'a>) -> Result<(), ClientError> {
        let url = self.contents_url(req.repo, req.path);
        let body = PutContents {
            message: req.message,
            content: req.content,
            sha: req.sha,
        };
        let request = self.http.put(url.clone()).json(&body);
        match self.send("PUT", &url, request).await {
            Ok(_) => {
                debug!(repo = %req.repo, path = req.path, updated = req.sha.is_some(), "Wrote file");
                Ok(())
            }
            Err(e) => {
                error!(repo = %req.repo, path = req.path, error = %e, "GitHub rejected file write");
                Err(e.into())
            }
        }
    }
}

/// The `message` field of a GitHub error body, or the raw body.
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) if body.is_empty() => "<empty body>".to_string(),
        Err(_) => body.to_string(),
    }
}
