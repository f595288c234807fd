use async_trait::async_trait;

use super::error::MigrationError;
use super::step::MigrationStep;

/// Pseudo-module the application's own migrations are registered under.
pub const DEFAULT_MODULE: &str = "beacon";

/// Hook name migration providers register under.
pub const HOOK_NAME: &str = "DbMigration";

/// A source of database migrations for one module.
#[async_trait]
pub trait MigrationHook: Send + Sync {
    /// Human readable name.
    fn name(&self) -> &str;

    /// The module the migrations belong to.
    fn module_name(&self) -> &str {
        DEFAULT_MODULE
    }

    fn is_module(&self) -> bool {
        self.module_name() != DEFAULT_MODULE
    }

    /// Database privileges the migrations need.
    fn required_privileges(&self) -> Vec<String> {
        Vec::new()
    }

    /// The schema version currently recorded in the database.
    async fn version(&self) -> Result<String, MigrationError>;

    /// Steps newer than [`MigrationHook::version`], oldest first.
    async fn pending_migrations(&self) -> Result<Vec<MigrationStep>, MigrationError>;

    /// Apply a single step.
    async fn apply_step(&self, step: &MigrationStep) -> Result<(), MigrationError>;

    /// Remember that `step` failed.
    async fn record_failure(&self, _step: &MigrationStep, _reason: &str) -> Result<(), MigrationError> {
        Ok(())
    }
}
