#![doc = "repo-migrate-core: core logic library for repo-migrate."]

//! This crate contains the migration pipeline, the provider contract and the
//! client-side rate limiter. It performs no HTTP itself: the CLI crate plugs
//! a concrete [`contract::RepositoryClient`] in.
//!
//! # Usage
//! Build a [`migrate::MigrationConfig`], hand it and a client to
//! [`migrate::Migrator`], and call `migrate_repository`.

pub mod content;
pub mod contract;
pub mod error;
pub mod migrate;
pub mod rate_limit;
pub mod walk;

pub use error::MigrationError;
