//! Application state for one invocation.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

use beacon_kernel::auth::User;
use beacon_kernel::hook::HookRegistry;
use beacon_kernel::menu::Menu;
use beacon_kernel::migration::{DEFAULT_MODULE, HOOK_NAME, MigrationHook, MigrationManager, SqlMigrationHook};
use beacon_kernel::module::{Module, ModuleManager};
use beacon_kernel::navigation::{ItemKind, Navigation, NavigationLoader, RendererRegistry};

use crate::config::Config;
use crate::db;

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,

    /// Module manager with every enabled module loaded.
    modules: ModuleManager,

    /// Migration hooks of the application and its modules.
    migration_hooks: Arc<HookRegistry<dyn MigrationHook>>,

    renderers: RendererRegistry,

    /// PostgreSQL connection pool, absent without `DATABASE_URL`.
    db: Option<PgPool>,
}

impl AppState {
    /// Load modules and register their hooks.
    pub fn new(config: Config) -> Result<Self> {
        let db = db::create_pool(&config)?;

        let mut modules = ModuleManager::new(&config.config_dir, config.module_paths.clone());
        modules
            .load_enabled_modules()
            .context("failed to load modules")?;

        let migration_hooks: Arc<HookRegistry<dyn MigrationHook>> = Arc::new(HookRegistry::new());
        if let Some(pool) = &db {
            let base_dir = config.base_dir.clone();
            let pool = pool.clone();
            migration_hooks.register(HOOK_NAME, DEFAULT_MODULE, None, move || {
                Ok(Arc::new(SqlMigrationHook::framework(&base_dir, pool.clone()))
                    as Arc<dyn MigrationHook>)
            });
        }
        modules.register_hooks(&migration_hooks, db.as_ref());

        info!(
            modules = modules.loaded_modules().len(),
            database = db.is_some(),
            "application state initialized"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                modules,
                migration_hooks,
                renderers: RendererRegistry::default(),
                db,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn modules(&self) -> &ModuleManager {
        &self.inner.modules
    }

    pub fn loaded_modules(&self) -> &[Module] {
        self.inner.modules.loaded_modules()
    }

    pub fn migration_hooks(&self) -> Arc<HookRegistry<dyn MigrationHook>> {
        Arc::clone(&self.inner.migration_hooks)
    }

    pub fn renderers(&self) -> &RendererRegistry {
        &self.inner.renderers
    }

    pub fn db(&self) -> Option<&PgPool> {
        self.inner.db.as_ref()
    }

    /// A user with the permissions granted in `roles.ini`.
    pub fn user(&self, username: &str, groups: &[String]) -> User {
        User::load(&self.inner.config.config_dir, username, groups)
    }

    /// The main menu as seen by `user`.
    pub fn menu(&self, user: Option<&User>) -> Menu {
        Menu::load(
            user,
            self.inner.config.logging.logs_to_file(),
            self.loaded_modules(),
        )
    }

    /// Navigation of one kind as seen by `user`.
    pub fn navigation(&self, kind: ItemKind, user: &User) -> Navigation {
        NavigationLoader::new(&self.inner.config.config_dir, self.loaded_modules()).load(kind, user)
    }

    /// Discover pending migrations.
    pub async fn migrations(&self) -> MigrationManager {
        MigrationManager::load(self.migration_hooks()).await
    }
}
