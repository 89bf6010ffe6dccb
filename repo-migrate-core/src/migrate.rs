//! High-level pipeline: validate → enumerate → copy in batches → summarise.
//!
//! This module provides the orchestration for copying every file of a source
//! repository into a target repository through a [`RepositoryClient`].
//!
//! # Major Types
//! - [`MigrationConfig`]: source/target repositories and batch pacing
//! - [`Migrator`]: runs the pipeline against one client and one rate limiter
//! - [`MigrationSummary`]: per-file outcomes and totals for the run
//!
//! # Responsibilities
//! - Fail fast on validation: nothing is written unless the credential and
//!   both repositories check out
//! - Copy each batch concurrently and wait for every copy to settle; one
//!   file's failure never cancels its siblings or aborts the run
//! - Throttle every provider request through the shared [`RateLimiter`], and
//!   pause a fixed delay between batches on top of that
//!
//! # Error Handling
//! Only configuration and validation problems are returned as
//! [`MigrationError`]. Per-file failures end up in [`MigrationSummary::results`].

use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::content::FileContent;
use crate::contract::{ClientError, ContentEntry, RepoRef, RepositoryClient, WriteFile};
use crate::error::MigrationError;
use crate::rate_limit::RateLimiter;
use crate::walk::{enumerate_files, EnumeratedTree};

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(1000);

/// Path the enumeration starts from.
const ROOT_PATH: &str = "";

/// What to migrate and how to pace it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationConfig {
    pub source: RepoRef,
    pub target: RepoRef,
    /// Number of files copied concurrently per batch. Must be at least 1.
    pub batch_size: usize,
    /// Fixed pause between consecutive batches.
    pub batch_delay: Duration,
}

impl MigrationConfig {
    pub fn new(source: RepoRef, target: RepoRef) -> Self {
        Self {
            source,
            target,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_batch_delay(mut self, batch_delay: Duration) -> Self {
        self.batch_delay = batch_delay;
        self
    }
}

/// Outcome of copying one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationResult {
    pub path: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MigrationResult {
    fn succeeded(path: &str) -> Self {
        Self {
            path: path.to_string(),
            success: true,
            error: None,
        }
    }

    fn failed(path: &str, error: String) -> Self {
        Self {
            path: path.to_string(),
            success: false,
            error: Some(error),
        }
    }
}

/// Report of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationSummary {
    pub total_files: usize,
    pub success_count: usize,
    pub fail_count: usize,
    pub batches: usize,
    /// Listing entries that were neither files nor directories.
    pub skipped_entries: usize,
    /// Source directories that could not be listed.
    pub failed_listings: Vec<String>,
    pub duration: Duration,
    pub results: Vec<MigrationResult>,
}

impl MigrationSummary {
    pub fn is_complete_success(&self) -> bool {
        self.fail_count == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &MigrationResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// Progress after a batch has settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    pub current_batch: usize,
    pub total_batches: usize,
    pub processed_files: usize,
    pub total_files: usize,
    pub elapsed: Duration,
    /// Linear extrapolation from the files processed so far.
    pub estimated_remaining: Option<Duration>,
}

impl BatchProgress {
    pub fn new(
        current_batch: usize,
        total_batches: usize,
        processed_files: usize,
        total_files: usize,
        elapsed: Duration,
    ) -> Self {
        let estimated_remaining = match (
            u32::try_from(processed_files),
            u32::try_from(total_files.saturating_sub(processed_files)),
        ) {
            (Ok(0), _) | (Err(_), _) | (_, Err(_)) => None,
            (Ok(processed), Ok(remaining)) => (elapsed / processed).checked_mul(remaining),
        };
        Self {
            current_batch,
            total_batches,
            processed_files,
            total_files,
            elapsed,
            estimated_remaining,
        }
    }
}

/// Number of batches needed for `total_files` at `batch_size` per batch.
pub fn batch_count(total_files: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    total_files.div_ceil(batch_size)
}

/// Runs migrations for one client. The rate limiter is shared by every
/// request the migrator issues, validation and enumeration included.
pub struct Migrator<C> {
    client: C,
    config: MigrationConfig,
    limiter: RateLimiter,
}

impl<C> Migrator<C>
where
    C: RepositoryClient,
{
    pub fn new(client: C, config: MigrationConfig) -> Self {
        Self::with_rate_limiter(client, config, RateLimiter::default())
    }

    pub fn with_rate_limiter(client: C, config: MigrationConfig, limiter: RateLimiter) -> Self {
        Self {
            client,
            config,
            limiter,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Confirms the credential and access to both repositories. Nothing is
    /// written here.
    pub async fn validate(&self) -> Result<(), MigrationError> {
        info!("[VALIDATE] Checking API access");

        self.limiter.wait_for_next_request().await;
        if let Err(e) = self.client.authenticate_check().await {
            error!(error = %e, "[VALIDATE][ERROR] Credential check failed");
            return Err(MigrationError::validation("authenticate", e));
        }

        for (role, repo) in [("source", &self.config.source), ("target", &self.config.target)] {
            self.limiter.wait_for_next_request().await;
            if let Err(e) = self.client.repo_exists(repo).await {
                error!(role, repo = %repo, error = %e, "[VALIDATE][ERROR] Repository not accessible");
                return Err(MigrationError::validation(format!("{role} repository {repo}"), e));
            }
            debug!(role, repo = %repo, "[VALIDATE] Repository accessible");
        }

        info!("[VALIDATE] Configuration validated successfully");
        Ok(())
    }

    /// Walks the whole source tree.
    pub async fn enumerate(&self) -> EnumeratedTree {
        enumerate_files(&self.client, &self.limiter, &self.config.source, ROOT_PATH).await
    }

    /// Validates, then enumerates the source without writing anything.
    pub async fn list_source_files(&self) -> Result<EnumeratedTree, MigrationError> {
        self.validate().await?;
        Ok(self.enumerate().await)
    }

    /// Copies every file of the source into the target.
    ///
    /// Returns an error only when the config is unusable or validation fails.
    /// A run where some files failed still returns `Ok` with those failures
    /// in the summary.
    pub async fn migrate_repository(&self) -> Result<MigrationSummary, MigrationError> {
        let started = Instant::now();
        info!(
            source = %self.config.source,
            target = %self.config.target,
            batch_size = self.config.batch_size,
            batch_delay_ms = self.config.batch_delay.as_millis() as u64,
            "[MIGRATE] Starting repository migration"
        );

        self.check_config()?;
        self.validate().await?;

        let tree = self.enumerate().await;
        let total_files = tree.files.len();
        let total_batches = batch_count(total_files, self.config.batch_size);
        info!(total_files, total_batches, "[MIGRATE] Found files to migrate");

        let mut results = Vec::with_capacity(total_files);
        let mut success_count = 0;
        let mut fail_count = 0;

        for (index, batch) in tree.files.chunks(self.config.batch_size).enumerate() {
            let current_batch = index + 1;
            info!(
                batch = current_batch,
                total_batches,
                files = batch.len(),
                "[BATCH] Processing batch"
            );

            let outcomes = join_all(batch.iter().map(|entry| self.migrate_file(entry))).await;
            for outcome in outcomes {
                if outcome.success {
                    success_count += 1;
                } else {
                    fail_count += 1;
                }
                results.push(outcome);
            }

            let progress = BatchProgress::new(
                current_batch,
                total_batches,
                results.len(),
                total_files,
                started.elapsed(),
            );
            info!(
                batch = progress.current_batch,
                total_batches = progress.total_batches,
                processed = progress.processed_files,
                total = progress.total_files,
                eta_secs = progress.estimated_remaining.map(|d| d.as_secs()),
                "[BATCH] Batch settled"
            );

            if current_batch < total_batches {
                sleep(self.config.batch_delay).await;
            }
        }

        let summary = MigrationSummary {
            total_files,
            success_count,
            fail_count,
            batches: total_batches,
            skipped_entries: tree.skipped_entries,
            failed_listings: tree.failed_listings,
            duration: started.elapsed(),
            results,
        };
        self.report(&summary);
        Ok(summary)
    }

    /// Copies one file. Never fails: errors become a failed result.
    pub async fn migrate_file(&self, entry: &ContentEntry) -> MigrationResult {
        match self.copy_file(entry).await {
            Ok(bytes) => {
                info!(path = %entry.path, bytes, "[FILE] Migrated");
                MigrationResult::succeeded(&entry.path)
            }
            Err(e) => {
                error!(path = %entry.path, error = %e, "[FILE][ERROR] Failed to migrate");
                MigrationResult::failed(&entry.path, e.to_string())
            }
        }
    }

    async fn copy_file(&self, entry: &ContentEntry) -> Result<usize, ClientError> {
        let payload = match inline_payload(entry) {
            Some(payload) => payload.to_string(),
            None => self.fetch_payload(&entry.path).await?,
        };

        let content = FileContent::from_provider(&payload)?;
        let encoded = content.to_base64();
        let message = format!("Migrate: {}", entry.path);

        self.limiter.wait_for_next_request().await;
        let existing = self.client.file_sha(&self.config.target, &entry.path).await?;
        if existing.is_some() {
            debug!(path = %entry.path, "[FILE] Target file exists, overwriting");
        }

        self.limiter.wait_for_next_request().await;
        self.client
            .create_or_update_file(WriteFile {
                repo: &self.config.target,
                path: &entry.path,
                message: &message,
                content: &encoded,
                sha: existing.as_deref(),
            })
            .await?;
        Ok(content.len())
    }

    /// Reads a source file, going through the blob API when the provider
    /// does not inline its content.
    async fn fetch_payload(&self, path: &str) -> Result<String, ClientError> {
        self.limiter.wait_for_next_request().await;
        let fetched = self.client.get_file_content(&self.config.source, path).await?;
        if let Some(payload) = inline_payload(&fetched) {
            return Ok(payload.to_string());
        }

        debug!(path, sha = %fetched.sha, size = fetched.size, "[FILE] Content not inlined, fetching blob");
        self.limiter.wait_for_next_request().await;
        self.client.get_blob(&self.config.source, &fetched.sha).await
    }

    fn check_config(&self) -> Result<(), MigrationError> {
        if self.config.batch_size == 0 {
            return Err(MigrationError::InvalidConfig {
                field: "batch_size".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    fn report(&self, summary: &MigrationSummary) {
        info!(
            total_files = summary.total_files,
            success_count = summary.success_count,
            fail_count = summary.fail_count,
            skipped_entries = summary.skipped_entries,
            duration_ms = summary.duration.as_millis() as u64,
            "[SUMMARY] Migration finished"
        );
        if summary.is_complete_success() {
            info!("[SUMMARY] Migration completed successfully");
        } else {
            warn!(
                fail_count = summary.fail_count,
                "[SUMMARY] Migration completed with failures"
            );
        }
        let status = self.limiter.status();
        debug!(
            requests_this_window = status.request_count,
            max_requests = status.max_requests,
            reset_in_secs = status.time_until_reset.as_secs(),
            "[SUMMARY] Rate limiter status"
        );
        match serde_json::to_string_pretty(summary) {
            Ok(json) => debug!(json = %json, "[SUMMARY][DEBUG] Summary as JSON"),
            Err(e) => error!(error = ?e, "[SUMMARY][DEBUG] Failed to serialize summary as JSON"),
        }
    }
}

/// Content carried by the listing itself, when it is usable as-is.
fn inline_payload(entry: &ContentEntry) -> Option<&str> {
    let content = entry.content.as_deref()?;
    let base64_encoded = matches!(entry.encoding.as_deref(), None | Some("base64"));
    if !base64_encoded || (content.is_empty() && entry.size > 0) {
        return None;
    }
    Some(content)
}
