#![allow(dead_code)]

//! In-memory stand-in for the hosting provider, shared by integration tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use repo_migrate_core::contract::{
    ClientError, ContentEntry, EntryKind, RepoRef, RepositoryClient, WriteFile,
};
use repo_migrate_core::rate_limit::{RateLimitConfig, RateLimiter};

#[derive(Default)]
pub struct InMemoryProvider {
    repos: Mutex<HashMap<RepoRef, BTreeMap<String, Vec<u8>>>>,
    listings: Mutex<HashMap<String, usize>>,
    commits: Mutex<Vec<String>>,
    requests: Mutex<usize>,
    failing_writes: HashSet<String>,
    not_inlined: HashSet<String>,
    latency: Duration,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(self, repo: &RepoRef, files: &[(&str, &str)]) -> Self {
        let tree = files
            .iter()
            .map(|(path, body)| (path.to_string(), body.as_bytes().to_vec()))
            .collect();
        self.repos.lock().unwrap().insert(repo.clone(), tree);
        self
    }

    pub fn failing_write(mut self, path: &str) -> Self {
        self.failing_writes.insert(path.to_string());
        self
    }

    /// Serve `path` like a file too large for the contents API: no inline
    /// payload, readable through the blob endpoint only.
    pub fn not_inlined(mut self, path: &str) -> Self {
        self.not_inlined.insert(path.to_string());
        self
    }

    /// Simulated network time for content reads and writes.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn files(&self, repo: &RepoRef) -> BTreeMap<String, Vec<u8>> {
        self.repos
            .lock()
            .unwrap()
            .get(repo)
            .cloned()
            .unwrap_or_default()
    }

    pub fn listing_counts(&self) -> HashMap<String, usize> {
        self.listings.lock().unwrap().clone()
    }

    pub fn commit_messages(&self) -> Vec<String> {
        self.commits.lock().unwrap().clone()
    }

    /// Calls received across every operation.
    pub fn request_count(&self) -> usize {
        *self.requests.lock().unwrap()
    }

    fn record_request(&self) {
        *self.requests.lock().unwrap() += 1;
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl RepositoryClient for InMemoryProvider {
    async fn authenticate_check(&self) -> Result<(), ClientError> {
        self.record_request();
        Ok(())
    }

    async fn repo_exists(&self, repo: &RepoRef) -> Result<(), ClientError> {
        self.record_request();
        if self.repos.lock().unwrap().contains_key(repo) {
            Ok(())
        } else {
            Err(format!("404 Not Found: {repo}").into())
        }
    }

    async fn list_contents(
        &self,
        repo: &RepoRef,
        path: &str,
    ) -> Result<Vec<ContentEntry>, ClientError> {
        self.record_request();
        *self
            .listings
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default() += 1;

        let repos = self.repos.lock().unwrap();
        let tree = repos.get(repo).ok_or("404 Not Found")?;
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };

        let mut files = Vec::new();
        let mut dirs = BTreeSet::new();
        for (file_path, body) in tree.iter() {
            let Some(rest) = file_path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((dir, _)) => {
                    dirs.insert(format!("{prefix}{dir}"));
                }
                None => files.push(ContentEntry::new(
                    file_path.clone(),
                    EntryKind::File,
                    blob_sha(file_path, body),
                    body.len() as u64,
                )),
            }
        }

        let mut entries: Vec<ContentEntry> = dirs
            .into_iter()
            .map(|d| ContentEntry::new(d.clone(), EntryKind::Dir, format!("sha-{d}"), 0))
            .collect();
        entries.extend(files);
        Ok(entries)
    }

    async fn get_file_content(
        &self,
        repo: &RepoRef,
        path: &str,
    ) -> Result<ContentEntry, ClientError> {
        self.record_request();
        self.simulate_latency().await;
        let repos = self.repos.lock().unwrap();
        let body = repos
            .get(repo)
            .and_then(|tree| tree.get(path))
            .ok_or_else(|| format!("404 Not Found: {path}"))?;
        let mut entry = ContentEntry::new(path, EntryKind::File, blob_sha(path, body), body.len() as u64);
        if self.not_inlined.contains(path) {
            entry.content = Some(String::new());
            entry.encoding = Some("none".to_string());
        } else {
            entry.content = Some(wrapped_base64(body));
            entry.encoding = Some("base64".to_string());
        }
        Ok(entry)
    }

    async fn get_blob(&self, repo: &RepoRef, sha: &str) -> Result<String, ClientError> {
        self.record_request();
        let repos = self.repos.lock().unwrap();
        let body = repos
            .get(repo)
            .and_then(|tree| tree.iter().find(|(path, body)| blob_sha(path, body) == sha))
            .map(|(_, body)| body)
            .ok_or_else(|| format!("404 Not Found: blob {sha}"))?;
        Ok(wrapped_base64(body))
    }

    async fn file_sha(&self, repo: &RepoRef, path: &str) -> Result<Option<String>, ClientError> {
        self.record_request();
        let repos = self.repos.lock().unwrap();
        Ok(repos
            .get(repo)
            .and_then(|tree| tree.get(path))
            .map(|body| blob_sha(path, body)))
    }

    async fn create_or_update_file<'a>(&self, req: WriteFile<'a>) -> Result<(), ClientError> {
        self.record_request();
        self.simulate_latency().await;
        if self.failing_writes.contains(req.path) {
            return Err(format!("422 Unprocessable Entity: {}", req.path).into());
        }
        let body = STANDARD.decode(req.content)?;
        let mut repos = self.repos.lock().unwrap();
        let tree = repos.entry(req.repo.clone()).or_default();
        // Same rule as the contents API: replacing a file needs its current sha.
        let current = tree.get(req.path).map(|old| blob_sha(req.path, old));
        if current.as_deref() != req.sha {
            return Err(format!("409 Conflict: {} does not match", req.path).into());
        }
        tree.insert(req.path.to_string(), body);
        self.commits.lock().unwrap().push(req.message.to_string());
        Ok(())
    }
}

/// Deterministic stand-in for a git blob sha.
pub fn blob_sha(path: &str, body: &[u8]) -> String {
    let sum: u64 = body.iter().map(|&b| u64::from(b)).sum();
    format!("sha-{path}-{}-{sum}", body.len())
}

/// Base64 wrapped at 60 columns like the real contents API.
fn wrapped_base64(body: &[u8]) -> String {
    STANDARD
        .encode(body)
        .as_bytes()
        .chunks(60)
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn source() -> RepoRef {
    RepoRef::new("octo", "source")
}

pub fn target() -> RepoRef {
    RepoRef::new("octo", "target")
}

pub fn unthrottled() -> RateLimiter {
    RateLimiter::new(RateLimitConfig {
        max_requests_per_hour: u32::MAX,
        min_delay: Duration::ZERO,
    })
}
