//! Database migrations.
//!
//! Migration providers register a [`MigrationHook`] under [`HOOK_NAME`].
//! The [`MigrationManager`] collects the ones with pending steps and
//! applies them, always the application's own migrations first.

mod error;
mod hook;
mod manager;
mod sql;
mod step;

pub use error::MigrationError;
pub use hook::{DEFAULT_MODULE, HOOK_NAME, MigrationHook};
pub use manager::{
    HookSummary, MigrationManager, MigrationState, MigrationSummary, PendingMigration, StepSummary,
};
pub use sql::{PGSQL_UPGRADE_DIR, SqlMigrationHook};
pub use step::{MigrationStep, compare_versions, scan_upgrade_dir};
