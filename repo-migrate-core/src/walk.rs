//! Enumeration of a repository tree through directory listings.
//!
//! The walk keeps an explicit stack of pending entries instead of recursing,
//! and yields files in the same depth-first pre-order a recursive walk
//! would: a directory's files and subtrees appear in listing order.

use tracing::{debug, error, info};

use crate::contract::{ContentEntry, EntryKind, RepoRef, RepositoryClient};
use crate::rate_limit::RateLimiter;

/// Outcome of walking a tree.
#[derive(Debug, Clone, Default)]
pub struct EnumeratedTree {
    /// Files in enumeration order.
    pub files: Vec<ContentEntry>,
    /// Directories listed successfully, the root included.
    pub directories_listed: usize,
    /// Entries that are neither files nor directories.
    pub skipped_entries: usize,
    /// Directories whose listing failed and which contributed no files.
    pub failed_listings: Vec<String>,
}

/// Lists `root` and everything below it in `repo`, one rate-limited request
/// per directory.
///
/// A failed listing is logged and treated as an empty directory so one
/// unreadable subtree does not abort the walk. There is no depth limit and
/// no cycle detection; provider trees are acyclic.
pub async fn enumerate_files<C>(
    client: &C,
    limiter: &RateLimiter,
    repo: &RepoRef,
    root: &str,
) -> EnumeratedTree
where
    C: RepositoryClient + ?Sized,
{
    let mut tree = EnumeratedTree::default();
    let mut pending: Vec<ContentEntry> = Vec::new();

    list_into(client, limiter, repo, root, &mut tree, &mut pending).await;

    while let Some(entry) = pending.pop() {
        match entry.kind {
            EntryKind::File => tree.files.push(entry),
            EntryKind::Dir => {
                list_into(client, limiter, repo, &entry.path, &mut tree, &mut pending).await;
            }
            kind => {
                debug!(path = %entry.path, ?kind, "[ENUMERATE] Skipping entry that is neither file nor directory");
                tree.skipped_entries += 1;
            }
        }
    }

    info!(
        repo = %repo,
        files = tree.files.len(),
        directories = tree.directories_listed,
        skipped = tree.skipped_entries,
        failed_listings = tree.failed_listings.len(),
        "[ENUMERATE] Source tree enumerated"
    );
    tree
}

async fn list_into<C>(
    client: &C,
    limiter: &RateLimiter,
    repo: &RepoRef,
    path: &str,
    tree: &mut EnumeratedTree,
    pending: &mut Vec<ContentEntry>,
) where
    C: RepositoryClient + ?Sized,
{
    limiter.wait_for_next_request().await;
    match client.list_contents(repo, path).await {
        Ok(entries) => {
            tree.directories_listed += 1;
            debug!(path, entries = entries.len(), "[ENUMERATE] Listed directory");
            // Reversed so the stack pops entries in listing order.
            pending.extend(entries.into_iter().rev());
        }
        Err(e) => {
            error!(path, error = %e, "[ENUMERATE] Failed to list directory, skipping it");
            tree.failed_listings.push(path.to_string());
        }
    }
}
