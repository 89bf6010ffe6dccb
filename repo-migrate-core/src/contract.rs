//! # contract: provider interface consumed by the migration core
//!
//! This module defines the single trait (`RepositoryClient`) the core talks to
//! and the plain data types that cross it. The core never performs HTTP
//! itself: the CLI crate supplies a concrete client (GitHub REST), tests
//! supply `MockRepositoryClient` or an in-memory fake.
//!
//! ## Interface
//! - All methods are async and return boxed errors ([`ClientError`]).
//! - Paths are repository-relative, `/`-separated, and `""` is the root.
//! - File payloads are base64 strings exactly as the provider returns them;
//!   normalisation happens in [`crate::content`].
//! - Each method issues exactly one request to the provider, so the core's
//!   rate limiter accounts for all traffic by throttling each call.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; enable the `test-export-mocks`
//!   feature (on by default) to use `MockRepositoryClient` from other crates.

use std::fmt;

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

/// Error type returned by every provider call.
pub type ClientError = Box<dyn std::error::Error + Send + Sync>;

/// Owner/name pair identifying a repository on the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Kind of a directory listing entry, as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
    /// Anything else the provider may add later.
    #[serde(other)]
    Other,
}

/// One entry of a directory listing: the file descriptor of the migration.
///
/// Identity is `path`. Listings normally leave `content` empty; when it is
/// absent the file is fetched by path before it is copied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
}

impl ContentEntry {
    /// Convenience constructor for listing entries without inline content.
    pub fn new(path: impl Into<String>, kind: EntryKind, sha: impl Into<String>, size: u64) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            name,
            path,
            sha: sha.into(),
            size,
            kind,
            content: None,
            encoding: None,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// Request to create or overwrite a single file in a repository.
pub struct WriteFile<'a> {
    /// Repository that receives the file.
    pub repo: &'a RepoRef,
    /// Repository-relative path of the file.
    pub path: &'a str,
    /// Commit message for the write.
    pub message: &'a str,
    /// Standard base64 of the full file contents, no line breaks.
    pub content: &'a str,
    /// Blob sha of the file being replaced; `None` creates a new file.
    pub sha: Option<&'a str>,
}

/// Trait for the version-control provider operations the migration needs.
///
/// Implemented by the real REST client and by test mocks. The trait is
/// `Send` + `Sync` and intended for async/await usage.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Confirm the configured credential authenticates.
    async fn authenticate_check(&self) -> Result<(), ClientError>;

    /// Confirm the repository exists and is readable with the credential.
    async fn repo_exists(&self, repo: &RepoRef) -> Result<(), ClientError>;

    /// List the entries directly under `path` (`""` for the root).
    async fn list_contents(
        &self,
        repo: &RepoRef,
        path: &str,
    ) -> Result<Vec<ContentEntry>, ClientError>;

    /// Fetch the file at `path`. The base64 payload is in `content` unless
    /// the file is too large for the provider to inline it.
    async fn get_file_content(
        &self,
        repo: &RepoRef,
        path: &str,
    ) -> Result<ContentEntry, ClientError>;

    /// Fetch the base64 payload of a blob by its sha.
    async fn get_blob(&self, repo: &RepoRef, sha: &str) -> Result<String, ClientError>;

    /// Blob sha of the file currently at `path`, or `None` when there is none.
    async fn file_sha(&self, repo: &RepoRef, path: &str) -> Result<Option<String>, ClientError>;

    /// Create the file at `req.path`, or overwrite it when `req.sha` names
    /// the blob currently there.
    async fn create_or_update_file<'a>(&self, req: WriteFile<'a>) -> Result<(), ClientError>;
}
