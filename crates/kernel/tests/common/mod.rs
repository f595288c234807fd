#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! [`FakeMigrationHook`] stands in for a database: it keeps its schema
//! version in memory and writes every applied step to a shared journal so
//! tests can check the order migrations ran in.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use beacon_kernel::hook::HookRegistry;
use beacon_kernel::migration::{
    HOOK_NAME, MigrationError, MigrationHook, MigrationStep, compare_versions,
};

/// Applied steps as `module@version`, in order.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub struct FakeMigrationHook {
    module: String,
    versions: Vec<String>,
    current: Mutex<String>,
    fail_at: Option<String>,
    fail_once: bool,
    privileges: Vec<String>,
    journal: Journal,
    failures: Mutex<Vec<String>>,
}

impl FakeMigrationHook {
    pub fn new(module: &str, versions: &[&str], journal: &Journal) -> Self {
        Self {
            module: module.to_string(),
            versions: versions.iter().map(|v| v.to_string()).collect(),
            current: Mutex::new("0".to_string()),
            fail_at: None,
            fail_once: false,
            privileges: Vec::new(),
            journal: Arc::clone(journal),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Make the step with `version` fail.
    pub fn failing_at(mut self, version: &str) -> Self {
        self.fail_at = Some(version.to_string());
        self
    }

    /// Make the step with `version` fail on its first attempt only.
    pub fn failing_once_at(mut self, version: &str) -> Self {
        self.fail_at = Some(version.to_string());
        self.fail_once = true;
        self
    }

    pub fn with_privileges(mut self, privileges: &[&str]) -> Self {
        self.privileges = privileges.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.lock().clone()
    }
}

#[async_trait]
impl MigrationHook for FakeMigrationHook {
    fn name(&self) -> &str {
        &self.module
    }

    fn module_name(&self) -> &str {
        &self.module
    }

    fn required_privileges(&self) -> Vec<String> {
        self.privileges.clone()
    }

    async fn version(&self) -> Result<String, MigrationError> {
        Ok(self.current.lock().clone())
    }

    async fn pending_migrations(&self) -> Result<Vec<MigrationStep>, MigrationError> {
        let current = self.current.lock().clone();
        Ok(self
            .versions
            .iter()
            .filter(|v| compare_versions(v, &current).is_gt())
            .map(|v| {
                MigrationStep::new(v.clone(), format!("/fake/{}/{v}.sql", self.module))
                    .with_description(format!("step {v}"))
            })
            .collect())
    }

    async fn apply_step(&self, step: &MigrationStep) -> Result<(), MigrationError> {
        let already_failed = self.fail_once && !self.failures.lock().is_empty();
        if self.fail_at.as_deref() == Some(step.version()) && !already_failed {
            return Err(MigrationError::step_failed(
                &self.module,
                step.version(),
                "syntax error",
            ));
        }
        self.journal
            .lock()
            .push(format!("{}@{}", self.module, step.version()));
        *self.current.lock() = step.version().to_string();
        Ok(())
    }

    async fn record_failure(&self, step: &MigrationStep, reason: &str) -> Result<(), MigrationError> {
        self.failures
            .lock()
            .push(format!("{}: {reason}", step.version()));
        Ok(())
    }
}

/// Register `hook` under the migration hook name, keyed by its module.
pub fn register(hooks: &HookRegistry<dyn MigrationHook>, hook: FakeMigrationHook) -> Arc<FakeMigrationHook> {
    let hook = Arc::new(hook);
    let module = hook.module_name().to_string();
    let owner = (module != beacon_kernel::migration::DEFAULT_MODULE).then_some(module.as_str());
    hooks.register_instance(
        HOOK_NAME,
        &module,
        owner,
        Arc::clone(&hook) as Arc<dyn MigrationHook>,
    );
    hook
}
