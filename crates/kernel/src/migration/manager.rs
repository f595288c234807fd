//! Pending migrations across the application and its modules.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::error::MigrationError;
use super::hook::{DEFAULT_MODULE, HOOK_NAME, MigrationHook};
use super::step::MigrationStep;
use crate::auth::Unrestricted;
use crate::hook::HookRegistry;

/// Where a pending migration stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum MigrationState {
    Pending,
    Running,
    Applied,
    Failed { version: String, reason: String },
}

/// A hook with at least one step left to apply.
pub struct PendingMigration {
    hook: Arc<dyn MigrationHook>,
    steps: Vec<MigrationStep>,
    state: MigrationState,
    version: String,
}

impl PendingMigration {
    pub fn hook(&self) -> &Arc<dyn MigrationHook> {
        &self.hook
    }

    pub fn steps(&self) -> &[MigrationStep] {
        &self.steps
    }

    pub fn state(&self) -> &MigrationState {
        &self.state
    }

    /// Schema version after the last step applied through this manager.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn module_name(&self) -> &str {
        self.hook.module_name()
    }

    pub fn is_module(&self) -> bool {
        self.hook.is_module()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepSummary {
    pub version: String,
    pub description: Option<String>,
    pub path: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HookSummary {
    pub name: String,
    pub module: String,
    pub is_module: bool,
    pub migrated_version: String,
    pub migrations: Vec<StepSummary>,
}

/// Pending migrations grouped the way they are presented.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationSummary {
    #[serde(rename = "System")]
    pub system: Vec<HookSummary>,
    #[serde(rename = "Modules")]
    pub modules: Vec<HookSummary>,
}

/// Registry of pending migrations, keyed and ordered by module name.
pub struct MigrationManager {
    hooks: Arc<HookRegistry<dyn MigrationHook>>,
    pending: BTreeMap<String, PendingMigration>,
}

impl MigrationManager {
    /// Discover pending migrations from every registered migration hook.
    pub async fn load(hooks: Arc<HookRegistry<dyn MigrationHook>>) -> Self {
        let mut manager = Self {
            hooks,
            pending: BTreeMap::new(),
        };
        manager.refresh().await;
        manager
    }

    /// Rediscover pending migrations.
    ///
    /// Hooks that fail to report their state are logged and skipped.
    pub async fn refresh(&mut self) {
        self.pending.clear();

        for hook in self.hooks.all(HOOK_NAME, &Unrestricted) {
            let module = hook.module_name().to_string();

            let version = match hook.version().await {
                Ok(v) => v,
                Err(e) => {
                    error!(module = %module, error = %e, "failed to read schema version");
                    continue;
                }
            };
            let steps = match hook.pending_migrations().await {
                Ok(steps) => steps,
                Err(e) => {
                    error!(module = %module, error = %e, "failed to collect pending migrations");
                    continue;
                }
            };
            if steps.is_empty() {
                continue;
            }

            self.pending.insert(
                module,
                PendingMigration {
                    hook,
                    steps,
                    state: MigrationState::Pending,
                    version,
                },
            );
        }
    }

    pub fn count(&self) -> usize {
        self.pending.len()
    }

    pub fn has_pending_migrations(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn has_migrations(&self, module: &str) -> bool {
        self.pending.contains_key(module)
    }

    pub fn migration(&self, module: &str) -> Result<&PendingMigration, MigrationError> {
        self.pending
            .get(module)
            .ok_or_else(|| MigrationError::not_found(module))
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingMigration> {
        self.pending.values()
    }

    /// Pending migrations of the application itself.
    pub fn framework_migrations(&self) -> Vec<&PendingMigration> {
        self.pending.values().filter(|m| !m.is_module()).collect()
    }

    pub fn module_migrations(&self) -> Vec<&PendingMigration> {
        self.pending.values().filter(|m| m.is_module()).collect()
    }

    /// Apply the pending steps of `module`.
    ///
    /// Module migrations are refused while the application's own migrations
    /// are pending. Applied steps are dropped from the queue as they
    /// complete. The first failing step stops the run; the migration stays
    /// pending in the `Failed` state with the remaining steps. Returns
    /// whether every step was applied.
    pub async fn apply(&mut self, module: &str) -> bool {
        if module != DEFAULT_MODULE && self.pending.contains_key(DEFAULT_MODULE) {
            error!(
                module,
                "refusing to apply module migrations while application migrations are pending"
            );
            return false;
        }

        let Some(migration) = self.pending.get_mut(module) else {
            warn!(module, "no pending migration");
            return false;
        };

        migration.state = MigrationState::Running;
        let hook = Arc::clone(&migration.hook);
        let mut applied = 0;

        while let Some(step) = migration.steps.first_mut() {
            if let Err(e) = hook.apply_step(step).await {
                let reason = e.to_string();
                error!(module, version = step.version(), error = %reason, "migration failed");
                if let Err(e) = hook.record_failure(step, &reason).await {
                    warn!(module, error = %e, "failed to record migration failure");
                }
                step.set_last_error(Some(reason.clone()));
                migration.state = MigrationState::Failed {
                    version: step.version().to_string(),
                    reason,
                };
                return false;
            }

            // Committed steps leave the queue so a retry resumes after them.
            let done = migration.steps.remove(0);
            migration.version = done.version().to_string();
            applied += 1;
        }

        migration.state = MigrationState::Applied;
        info!(module, steps = applied, "migration complete");
        self.pending.remove(module);
        true
    }

    /// Like [`MigrationManager::apply`], failing when nothing is pending.
    pub async fn apply_by_name(&mut self, module: &str) -> Result<bool, MigrationError> {
        if !self.pending.contains_key(module) {
            return Err(MigrationError::not_found(module));
        }
        Ok(self.apply(module).await)
    }

    /// Apply everything: the application first, then modules by name.
    ///
    /// Stops right away when the application's migration fails; module
    /// failures do not stop the remaining modules.
    pub async fn apply_all(&mut self) -> bool {
        if self.pending.contains_key(DEFAULT_MODULE) && !self.apply(DEFAULT_MODULE).await {
            return false;
        }

        let modules: Vec<String> = self.pending.keys().cloned().collect();
        let mut succeeded = true;
        for module in modules {
            if !self.apply(&module).await {
                succeeded = false;
            }
        }
        succeeded
    }

    pub fn summary(&self) -> MigrationSummary {
        let mut summary = MigrationSummary::default();
        for migration in self.pending.values() {
            let entry = HookSummary {
                name: migration.hook.name().to_string(),
                module: migration.module_name().to_string(),
                is_module: migration.is_module(),
                migrated_version: migration.version.clone(),
                migrations: migration
                    .steps
                    .iter()
                    .map(|s| StepSummary {
                        version: s.version().to_string(),
                        description: s.description().map(str::to_string),
                        path: s.script_path().display().to_string(),
                        error: s.last_error().map(str::to_string),
                    })
                    .collect(),
            };
            if migration.is_module() {
                summary.modules.push(entry);
            } else {
                summary.system.push(entry);
            }
        }
        summary
    }

    /// Union of the privileges every pending migration needs.
    pub fn required_database_privileges(&self) -> Vec<String> {
        let mut privileges: Vec<String> = Vec::new();
        for migration in self.pending.values() {
            for privilege in migration.hook.required_privileges() {
                if !privileges.contains(&privilege) {
                    privileges.push(privilege);
                }
            }
        }
        privileges
    }
}
