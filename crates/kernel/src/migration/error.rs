//! Migration error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    /// Nothing is pending for the requested module.
    #[error("no pending migration found for module '{module}'")]
    NotFound { module: String },

    /// A migration step failed to apply.
    #[error("module '{module}': migration to version {version} failed: {details}")]
    StepFailed {
        module: String,
        version: String,
        details: String,
    },

    /// A step's script vanished between discovery and execution.
    #[error("module '{module}': migration script not found: {path}")]
    ScriptNotFound { module: String, path: String },

    /// The upgrade directory exists but cannot be read.
    #[error("cannot read upgrade directory {path}: {source}")]
    UpgradeDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl MigrationError {
    pub fn not_found(module: impl Into<String>) -> Self {
        Self::NotFound {
            module: module.into(),
        }
    }

    pub fn step_failed(
        module: impl Into<String>,
        version: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::StepFailed {
            module: module.into(),
            version: version.into(),
            details: details.into(),
        }
    }
}
