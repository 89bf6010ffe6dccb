use thiserror::Error;

use crate::contract::ClientError;

/// Fatal errors of a migration run. Per-file failures never surface here:
/// they are recorded in the summary instead.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Credential or repository access check failed before any mutation.
    #[error("validation failed: {step}: {source}")]
    Validation {
        step: String,
        #[source]
        source: ClientError,
    },

    /// The migration settings cannot be used as given.
    #[error("invalid migration config: {field} - {message}")]
    InvalidConfig { field: String, message: String },
}

impl MigrationError {
    pub(crate) fn validation(step: impl Into<String>, source: ClientError) -> Self {
        MigrationError::Validation {
            step: step.into(),
            source,
        }
    }
}
