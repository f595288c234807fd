//! Migrations from SQL scripts on disk, tracked in PostgreSQL.
//!
//! Scripts live in `<base>/schema/pgsql-upgrades`. Every attempt is
//! recorded in the `beacon_schema` table; the latest successful row per
//! module is that module's schema version.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::{Executor, PgPool, Row};
use tracing::{debug, info};

use super::error::MigrationError;
use super::hook::{DEFAULT_MODULE, MigrationHook};
use super::step::{MigrationStep, scan_upgrade_dir};

/// Upgrade script directory relative to an application or module root.
pub const PGSQL_UPGRADE_DIR: &str = "schema/pgsql-upgrades";

const SCHEMA_TABLE_DDL: &str = "CREATE TABLE IF NOT EXISTS beacon_schema (
    id bigserial PRIMARY KEY,
    module varchar(64) NOT NULL,
    version varchar(64) NOT NULL,
    timestamp bigint NOT NULL,
    success char(1) NOT NULL,
    reason text
)";

const INSERT_ROW: &str =
    "INSERT INTO beacon_schema (module, version, timestamp, success, reason) VALUES ($1, $2, $3, $4, $5)";

/// A [`MigrationHook`] backed by a directory of SQL scripts.
pub struct SqlMigrationHook {
    name: String,
    module: String,
    upgrade_dir: PathBuf,
    descriptions: HashMap<String, String>,
    pool: PgPool,
}

impl SqlMigrationHook {
    /// Migrations of the application itself.
    pub fn framework(base_dir: &Path, pool: PgPool) -> Self {
        Self {
            name: "Beacon".to_string(),
            module: DEFAULT_MODULE.to_string(),
            upgrade_dir: base_dir.join(PGSQL_UPGRADE_DIR),
            descriptions: HashMap::new(),
            pool,
        }
    }

    /// Migrations shipped by a module.
    pub fn for_module(module: &str, module_dir: &Path, pool: PgPool) -> Self {
        Self {
            name: module.to_string(),
            module: module.to_string(),
            upgrade_dir: module_dir.join(PGSQL_UPGRADE_DIR),
            descriptions: HashMap::new(),
            pool,
        }
    }

    /// Descriptions keyed by version, overriding those from file names.
    pub fn with_descriptions(mut self, descriptions: HashMap<String, String>) -> Self {
        self.descriptions = descriptions;
        self
    }

    pub fn upgrade_dir(&self) -> &Path {
        &self.upgrade_dir
    }

    async fn schema_table_exists(&self) -> Result<bool, MigrationError> {
        let row = sqlx::query("SELECT to_regclass('beacon_schema') IS NOT NULL AS present")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("present"))
    }
}

/// Run one upgrade script and record it, in a single transaction.
async fn run_script(pool: &PgPool, module: &str, version: &str, sql: &str) -> Result<(), MigrationError> {
    let mut tx = pool.begin().await?;

    // Scripts hold several statements, which prepared queries reject.
    (&mut *tx)
        .execute(sqlx::raw_sql(sql))
        .await
        .map_err(|e| MigrationError::step_failed(module, version, e.to_string()))?;

    (&mut *tx).execute(sqlx::raw_sql(SCHEMA_TABLE_DDL)).await?;
    sqlx::query(INSERT_ROW)
        .bind(module)
        .bind(version)
        .bind(chrono::Utc::now().timestamp_millis())
        .bind("y")
        .bind(None::<String>)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Record a failed attempt outside of any transaction.
async fn record_failed(pool: &PgPool, module: &str, version: &str, reason: &str) -> Result<(), MigrationError> {
    sqlx::raw_sql(SCHEMA_TABLE_DDL).execute(pool).await?;
    sqlx::query(INSERT_ROW)
        .bind(module)
        .bind(version)
        .bind(chrono::Utc::now().timestamp_millis())
        .bind("n")
        .bind(reason)
        .execute(pool)
        .await?;
    Ok(())
}

#[async_trait]
impl MigrationHook for SqlMigrationHook {
    fn name(&self) -> &str {
        &self.name
    }

    fn module_name(&self) -> &str {
        &self.module
    }

    fn required_privileges(&self) -> Vec<String> {
        ["CREATE", "SELECT", "INSERT", "UPDATE", "DELETE", "ALTER", "DROP"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    async fn version(&self) -> Result<String, MigrationError> {
        if !self.schema_table_exists().await? {
            return Ok("0".to_string());
        }

        let row = sqlx::query(
            "SELECT version FROM beacon_schema WHERE module = $1 AND success = 'y' ORDER BY id DESC LIMIT 1",
        )
        .bind(&self.module)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|r| r.get::<String, _>("version"))
            .unwrap_or_else(|| "0".to_string()))
    }

    async fn pending_migrations(&self) -> Result<Vec<MigrationStep>, MigrationError> {
        let current = self.version().await?;
        let steps = scan_upgrade_dir(&self.upgrade_dir, &current, &self.descriptions)?;
        debug!(
            module = %self.module,
            current = %current,
            pending = steps.len(),
            "scanned upgrade scripts"
        );
        Ok(steps)
    }

    async fn apply_step(&self, step: &MigrationStep) -> Result<(), MigrationError> {
        let path = step.script_path();
        if !path.exists() {
            return Err(MigrationError::ScriptNotFound {
                module: self.module.clone(),
                path: path.display().to_string(),
            });
        }

        let sql = std::fs::read_to_string(path).map_err(|e| {
            MigrationError::step_failed(
                &self.module,
                step.version(),
                format!("failed to read script: {e}"),
            )
        })?;

        run_script(&self.pool, &self.module, step.version(), &sql).await?;

        info!(module = %self.module, version = step.version(), "applied migration");
        Ok(())
    }

    async fn record_failure(&self, step: &MigrationStep, reason: &str) -> Result<(), MigrationError> {
        record_failed(&self.pool, &self.module, step.version(), reason).await
    }
}
