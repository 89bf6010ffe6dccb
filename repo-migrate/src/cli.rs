///
/// This module implements the CLI interface for repo-migrate: command
/// parsing, config loading and the user-visible output of each command.
///
/// All migration logic (enumeration, batching, rate limiting) lives in the
/// [`repo-migrate-core`] crate. This module only wires configuration, the
/// GitHub client and the core [`Migrator`] together.
///
/// ## How To Use
/// - For command-line users: use the installed `repo-migrate` binary with `--help`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`repo-migrate-core`]: ../../repo-migrate-core/
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use repo_migrate_core::migrate::{MigrationSummary, Migrator};
use repo_migrate_core::rate_limit::RateLimiter;

use crate::github::GitHubClient;
use crate::load_config::{load_config, AppConfig};

/// CLI for repo-migrate: copy a GitHub repository's files into another repository.
#[derive(Parser)]
#[clap(
    name = "repo-migrate",
    version,
    about = "Copy the files of one GitHub repository into another through the REST API"
)]
pub struct Cli {
    /// Log level used when RUST_LOG is not set (error, warn, info, debug, trace)
    #[clap(long, global = true, default_value = "info")]
    pub log_level: String,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Copy every file of the source repository into the target repository
    Migrate {
        /// Optional YAML file with non-secret settings; environment variables win
        #[clap(long)]
        config: Option<PathBuf>,
        /// Files copied concurrently per batch (overrides MIGRATION_BATCH_SIZE)
        #[clap(long)]
        batch_size: Option<usize>,
        /// Pause between batches in milliseconds (overrides MIGRATION_DELAY_MS)
        #[clap(long)]
        delay_ms: Option<u64>,
    },
    /// Check the token and access to both repositories, then exit
    Validate {
        #[clap(long)]
        config: Option<PathBuf>,
    },
    /// Print the files that would be migrated without writing anything
    List {
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Async CLI entrypoint for integration tests and main().
///
/// Returns an error for configuration and validation failures only. A
/// migration in which some files failed is reported and returns `Ok`.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Migrate {
            config,
            batch_size,
            delay_ms,
        } => {
            let mut app = load(config.as_deref())?;
            if let Some(batch_size) = batch_size {
                app.migration.batch_size = batch_size;
            }
            if let Some(delay_ms) = delay_ms {
                app.migration.batch_delay = Duration::from_millis(delay_ms);
            }
            tracing::info!(command = "migrate", "Starting migration");
            let migrator = build_migrator(&app)?;
            let summary = migrator
                .migrate_repository()
                .await
                .context("Migration failed")?;
            print_summary(&summary);
            Ok(())
        }
        Commands::Validate { config } => {
            let app = load(config.as_deref())?;
            tracing::info!(command = "validate", "Validating configuration");
            let migrator = build_migrator(&app)?;
            migrator
                .validate()
                .await
                .context("Configuration validation failed")?;
            println!(
                "Configuration validated successfully: {} -> {}",
                app.migration.source, app.migration.target
            );
            Ok(())
        }
        Commands::List { config } => {
            let app = load(config.as_deref())?;
            tracing::info!(command = "list", "Listing source files");
            let migrator = build_migrator(&app)?;
            let tree = migrator
                .list_source_files()
                .await
                .context("Listing source files failed")?;
            for file in &tree.files {
                println!("{}\t{}", file.path, file.size);
            }
            println!(
                "{} files in {} ({} directories, {} skipped entries)",
                tree.files.len(),
                app.migration.source,
                tree.directories_listed,
                tree.skipped_entries
            );
            for path in &tree.failed_listings {
                println!("could not list: {path}");
            }
            Ok(())
        }
    }
}

fn load(path: Option<&Path>) -> Result<AppConfig> {
    load_config(path).context("Invalid configuration")
}

fn build_migrator(app: &AppConfig) -> Result<Migrator<GitHubClient>> {
    let client = GitHubClient::from_config(app).context("Failed to construct GitHub client")?;
    Ok(Migrator::with_rate_limiter(
        client,
        app.migration.clone(),
        RateLimiter::new(app.rate_limit),
    ))
}

fn print_summary(summary: &MigrationSummary) {
    println!();
    println!("Migration Summary:");
    println!("  Successfully migrated: {} files", summary.success_count);
    println!("  Failed to migrate:     {} files", summary.fail_count);
    println!("  Total files:           {}", summary.total_files);
    if summary.skipped_entries > 0 {
        println!("  Skipped entries:       {}", summary.skipped_entries);
    }
    println!("  Duration:              {:.1}s", summary.duration.as_secs_f64());
    for failure in summary.failures() {
        println!(
            "  failed: {} ({})",
            failure.path,
            failure.error.as_deref().unwrap_or("unknown error")
        );
    }
    for path in &summary.failed_listings {
        println!("  could not list: {path}");
    }
    if summary.is_complete_success() {
        println!("Migration completed successfully!");
    } else {
        println!("Migration completed with some failures");
    }
}
