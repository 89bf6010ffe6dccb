/// `load_config` module: builds the run configuration from the environment,
/// optionally layered over a static YAML file.
///
/// # Sources
/// - Environment variables (a `.env` file is loaded by `main` beforehand).
/// - An optional YAML file with the same non-secret settings. Environment
///   values win over file values. The token is read from the environment only.
///
/// # Errors
/// Every required key that is missing is reported at once in
/// [`ConfigError::Missing`], so the user can fix them in one go. Nothing here
/// talks to the provider.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use repo_migrate_core::contract::RepoRef;
use repo_migrate_core::migrate::{MigrationConfig, DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE};
use repo_migrate_core::rate_limit::RateLimitConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::github::DEFAULT_API_URL;

pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
pub const SOURCE_OWNER: &str = "SOURCE_OWNER";
pub const SOURCE_REPO: &str = "SOURCE_REPO";
pub const TARGET_OWNER: &str = "TARGET_OWNER";
pub const TARGET_REPO: &str = "TARGET_REPO";
pub const MIGRATION_BATCH_SIZE: &str = "MIGRATION_BATCH_SIZE";
pub const MIGRATION_DELAY_MS: &str = "MIGRATION_DELAY_MS";
pub const RATE_LIMIT_MAX_PER_HOUR: &str = "RATE_LIMIT_MAX_PER_HOUR";
pub const RATE_LIMIT_MIN_DELAY_MS: &str = "RATE_LIMIT_MIN_DELAY_MS";
pub const GITHUB_API_URL: &str = "GITHUB_API_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// API token. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token(<{} chars>)", self.0.len())
    }
}

/// Everything a run needs.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub token: Token,
    pub api_url: String,
    pub migration: MigrationConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    source: RepoSection,
    #[serde(default)]
    target: RepoSection,
    #[serde(default)]
    migration: MigrationSection,
    #[serde(default)]
    rate_limit: RateLimitSection,
    #[serde(default)]
    api_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RepoSection {
    owner: Option<String>,
    repo: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct MigrationSection {
    batch_size: Option<usize>,
    delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RateLimitSection {
    max_requests_per_hour: Option<u32>,
    min_delay_ms: Option<u64>,
}

/// Loads configuration from the process environment and, if given, a YAML file.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an explicit variable lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let file = match path {
        Some(path) => read_file_config(path)?,
        None => FileConfig::default(),
    };
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    let token = var(GITHUB_TOKEN);
    let source_owner = var(SOURCE_OWNER).or(file.source.owner);
    let source_repo = var(SOURCE_REPO).or(file.source.repo);
    let target_owner = var(TARGET_OWNER).or(file.target.owner);
    let target_repo = var(TARGET_REPO).or(file.target.repo);

    let missing: Vec<&'static str> = [
        (GITHUB_TOKEN, token.is_none()),
        (SOURCE_OWNER, source_owner.is_none()),
        (SOURCE_REPO, source_repo.is_none()),
        (TARGET_OWNER, target_owner.is_none()),
        (TARGET_REPO, target_repo.is_none()),
    ]
    .into_iter()
    .filter_map(|(key, absent)| absent.then_some(key))
    .collect();

    let (
        Some(token),
        Some(source_owner),
        Some(source_repo),
        Some(target_owner),
        Some(target_repo),
    ) = (token, source_owner, source_repo, target_owner, target_repo)
    else {
        error!(missing = ?missing, "Missing required configuration");
        return Err(ConfigError::Missing(missing));
    };

    let batch_size = match var(MIGRATION_BATCH_SIZE) {
        Some(raw) => parse_number(MIGRATION_BATCH_SIZE, &raw)?,
        None => file.migration.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
    };
    if batch_size == 0 {
        return Err(ConfigError::Invalid {
            key: MIGRATION_BATCH_SIZE,
            value: batch_size.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let batch_delay = match var(MIGRATION_DELAY_MS) {
        Some(raw) => Duration::from_millis(parse_number(MIGRATION_DELAY_MS, &raw)?),
        None => file
            .migration
            .delay_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_BATCH_DELAY),
    };

    let defaults = RateLimitConfig::default();
    let max_requests_per_hour = match var(RATE_LIMIT_MAX_PER_HOUR) {
        Some(raw) => parse_number(RATE_LIMIT_MAX_PER_HOUR, &raw)?,
        None => file
            .rate_limit
            .max_requests_per_hour
            .unwrap_or(defaults.max_requests_per_hour),
    };
    if max_requests_per_hour == 0 {
        return Err(ConfigError::Invalid {
            key: RATE_LIMIT_MAX_PER_HOUR,
            value: max_requests_per_hour.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    let min_delay = match var(RATE_LIMIT_MIN_DELAY_MS) {
        Some(raw) => Duration::from_millis(parse_number(RATE_LIMIT_MIN_DELAY_MS, &raw)?),
        None => file
            .rate_limit
            .min_delay_ms
            .map(Duration::from_millis)
            .unwrap_or(defaults.min_delay),
    };

    let api_url = var(GITHUB_API_URL)
        .or(file.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());

    let migration = MigrationConfig::new(
        RepoRef::new(source_owner, source_repo),
        RepoRef::new(target_owner, target_repo),
    )
    .with_batch_size(batch_size)
    .with_batch_delay(batch_delay);

    info!(
        source = %migration.source,
        target = %migration.target,
        batch_size,
        batch_delay_ms = batch_delay.as_millis() as u64,
        max_requests_per_hour,
        api_url = %api_url,
        "Config loaded and merged successfully"
    );

    Ok(AppConfig {
        token: Token(token),
        api_url,
        migration,
        rate_limit: RateLimitConfig {
            max_requests_per_hour,
            min_delay,
        },
    })
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    info!(config_path = ?path, "Loading configuration from file");
    let content = fs::read_to_string(path).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to read config file");
        ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        }
    })?;
    // An empty file is a valid, empty config.
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
        ConfigError::Parse(e)
    })
}

fn parse_number<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
