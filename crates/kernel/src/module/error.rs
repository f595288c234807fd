//! Module error types.

use thiserror::Error;

use crate::error::ConfigurationError;

#[derive(Debug, Error)]
pub enum ModuleError {
    /// A module depends on a module that is not enabled.
    #[error("module '{module}': depends on '{dependency}' which is not enabled")]
    MissingDependency { module: String, dependency: String },

    /// Enabled modules depend on each other in a cycle.
    #[error("circular dependency detected involving modules: {cycle}")]
    CircularDependency { cycle: String },

    /// `module.toml` could not be parsed.
    #[error("module '{module}': failed to parse manifest: {details}")]
    InvalidManifest { module: String, details: String },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl ModuleError {
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
