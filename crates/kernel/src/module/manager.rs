//! Installed, enabled and loaded modules.
//!
//! A module is installed when it is a directory below one of the module
//! paths, and enabled when `<config>/enabledModules/<name>` links to it.
//! Loading registers enabled modules in dependency order.

use std::collections::BTreeMap;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sqlx::PgPool;
use tracing::{debug, info, warn};

use super::dependency::{remove_unsatisfied, resolve_load_order};
use super::error::ModuleError;
use super::manifest::ModuleManifest;
use crate::error::ConfigurationError;
use crate::hook::HookRegistry;
use crate::ini::IniFile;
use crate::menu::Menu;
use crate::migration::{HOOK_NAME, MigrationHook, PGSQL_UPGRADE_DIR, SqlMigrationHook};
use crate::navigation::ItemKind;

/// Directory below the config directory holding enabled-module links.
pub const ENABLED_MODULES_DIR: &str = "enabledModules";

/// A loaded module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    name: String,
    base_dir: PathBuf,
    manifest: ModuleManifest,
}

impl Module {
    pub fn new(name: impl Into<String>, base_dir: impl Into<PathBuf>, manifest: ModuleManifest) -> Self {
        Self {
            name: name.into(),
            base_dir: base_dir.into(),
            manifest,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn manifest(&self) -> &ModuleManifest {
        &self.manifest
    }

    pub fn version(&self) -> &str {
        &self.manifest.version
    }

    pub fn menu_config_path(&self) -> PathBuf {
        self.base_dir.join("menu.ini")
    }

    pub fn navigation_config_path(&self, kind: ItemKind) -> PathBuf {
        self.base_dir
            .join("navigation")
            .join(format!("{}.ini", kind.config_stem()))
    }

    pub fn upgrade_dir(&self) -> PathBuf {
        self.base_dir.join(PGSQL_UPGRADE_DIR)
    }

    pub fn has_migrations(&self) -> bool {
        self.upgrade_dir().is_dir()
    }

    /// The menu entries declared in the module's `menu.ini`.
    pub fn menu_items(&self) -> Result<Vec<Menu>, ConfigurationError> {
        let config = IniFile::read_or_empty(&self.menu_config_path());
        if config.is_empty() {
            return Ok(Vec::new());
        }
        Ok(Menu::from_config(&[config])?.into_sub_menus())
    }
}

/// Discovers and loads modules.
#[derive(Debug)]
pub struct ModuleManager {
    module_paths: Vec<PathBuf>,
    enabled_dir: PathBuf,
    installed: BTreeMap<String, PathBuf>,
    enabled: BTreeMap<String, PathBuf>,
    loaded: Vec<Module>,
}

impl ModuleManager {
    pub fn new(config_dir: &Path, module_paths: Vec<PathBuf>) -> Self {
        let mut manager = Self {
            module_paths,
            enabled_dir: config_dir.join(ENABLED_MODULES_DIR),
            installed: BTreeMap::new(),
            enabled: BTreeMap::new(),
            loaded: Vec::new(),
        };
        manager.detect_installed_modules();
        manager.detect_enabled_modules();
        manager
    }

    pub fn module_paths(&self) -> &[PathBuf] {
        &self.module_paths
    }

    /// Scan the module paths. The first path providing a name wins.
    pub fn detect_installed_modules(&mut self) {
        self.installed.clear();

        for path in &self.module_paths {
            let entries = match std::fs::read_dir(path) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "module path not readable");
                    continue;
                }
            };

            for entry in entries.flatten() {
                let dir = entry.path();
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                if !dir.is_dir() || !is_valid_module_name(&name) {
                    continue;
                }
                self.installed.entry(name).or_insert(dir);
            }
        }
    }

    /// Scan the enabled-modules directory. Dangling links are skipped.
    pub fn detect_enabled_modules(&mut self) {
        self.enabled.clear();

        let entries = match std::fs::read_dir(&self.enabled_dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    path = %self.enabled_dir.display(),
                    error = %e,
                    "cannot read enabled modules directory"
                );
                return;
            }
        };

        for entry in entries.flatten() {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_valid_module_name(&name) {
                continue;
            }
            match std::fs::canonicalize(entry.path()) {
                Ok(target) if target.is_dir() => {
                    self.enabled.insert(name, target);
                }
                _ => warn!(module = %name, "enabled module does not resolve to a directory"),
            }
        }
    }

    pub fn has_installed(&self, name: &str) -> bool {
        self.installed.contains_key(name)
    }

    pub fn has_enabled(&self, name: &str) -> bool {
        self.enabled.contains_key(name)
    }

    pub fn has_loaded(&self, name: &str) -> bool {
        self.loaded.iter().any(|m| m.name == name)
    }

    pub fn list_installed(&self) -> Vec<&str> {
        self.installed.keys().map(String::as_str).collect()
    }

    pub fn list_enabled(&self) -> Vec<&str> {
        self.enabled.keys().map(String::as_str).collect()
    }

    pub fn list_loaded(&self) -> Vec<&str> {
        self.loaded.iter().map(|m| m.name.as_str()).collect()
    }

    /// Directory of a module, preferring the enabled link target.
    pub fn module_dir(&self, name: &str) -> Option<&Path> {
        self.enabled
            .get(name)
            .or_else(|| self.installed.get(name))
            .map(PathBuf::as_path)
    }

    /// Load every enabled module in dependency order.
    ///
    /// Modules with unreadable manifests or unsatisfied dependencies are
    /// skipped with a warning. A dependency cycle fails the whole load.
    pub fn load_enabled_modules(&mut self) -> Result<&[Module], ModuleError> {
        let mut manifests = BTreeMap::new();
        for (name, dir) in &self.enabled {
            match ModuleManifest::load(name, dir) {
                Ok(manifest) => {
                    manifests.insert(name.clone(), manifest);
                }
                Err(e) => warn!(module = %name, error = %e, "skipping module"),
            }
        }

        remove_unsatisfied(&mut manifests);
        let order = resolve_load_order(&manifests)?;

        self.loaded = order
            .into_iter()
            .filter_map(|name| {
                let manifest = manifests.remove(&name)?;
                let dir = self.enabled.get(&name)?.clone();
                Some(Module::new(name, dir, manifest))
            })
            .collect();

        info!(modules = ?self.list_loaded(), "modules loaded");
        Ok(&self.loaded)
    }

    /// Loaded modules in registration order.
    pub fn loaded_modules(&self) -> &[Module] {
        &self.loaded
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.loaded.iter().find(|m| m.name == name)
    }

    /// Enable an installed module by linking it into the enabled directory.
    pub fn enable_module(&mut self, name: &str) -> Result<(), ModuleError> {
        if !is_valid_module_name(name) {
            return Err(ConfigurationError::InvalidModuleName {
                module: name.to_string(),
            }
            .into());
        }
        let Some(target) = self.installed.get(name).cloned() else {
            return Err(ConfigurationError::module_not_installed(name).into());
        };
        if self.has_enabled(name) {
            return Err(ConfigurationError::ModuleAlreadyEnabled {
                module: name.to_string(),
            }
            .into());
        }

        std::fs::create_dir_all(&self.enabled_dir)
            .map_err(|e| ModuleError::io(&self.enabled_dir, e))?;
        let link = self.enabled_dir.join(name);
        symlink(&target, &link).map_err(|e| ModuleError::io(&link, e))?;

        info!(module = name, target = %target.display(), "module enabled");
        self.enabled.insert(name.to_string(), target);
        Ok(())
    }

    /// Disable a module by removing its link.
    pub fn disable_module(&mut self, name: &str) -> Result<(), ModuleError> {
        if !self.has_enabled(name) {
            return Err(ConfigurationError::ModuleNotEnabled {
                module: name.to_string(),
            }
            .into());
        }

        let link = self.enabled_dir.join(name);
        let meta = std::fs::symlink_metadata(&link).map_err(|e| ModuleError::io(&link, e))?;
        if !meta.file_type().is_symlink() {
            return Err(ConfigurationError::ModuleNotSymlinked {
                module: name.to_string(),
                path: link.display().to_string(),
            }
            .into());
        }

        std::fs::remove_file(&link).map_err(|e| ModuleError::io(&link, e))?;
        self.enabled.remove(name);
        self.loaded.retain(|m| m.name != name);
        info!(module = name, "module disabled");
        Ok(())
    }

    /// Manifest of an installed module.
    pub fn module_info(&self, name: &str) -> Result<ModuleManifest, ModuleError> {
        let dir = self
            .module_dir(name)
            .ok_or_else(|| ConfigurationError::module_not_installed(name))?;
        ModuleManifest::load(name, dir)
    }

    /// Register hooks of loaded modules.
    ///
    /// Modules shipping upgrade scripts get a migration hook when a
    /// database is configured.
    pub fn register_hooks(&self, hooks: &HookRegistry<dyn MigrationHook>, pool: Option<&PgPool>) {
        let Some(pool) = pool else {
            debug!("no database configured, skipping module migration hooks");
            return;
        };

        for module in self.loaded.iter().filter(|m| m.has_migrations()) {
            let name = module.name.clone();
            let dir = module.base_dir.clone();
            let pool = pool.clone();
            hooks.register(HOOK_NAME, &module.name, Some(&module.name), move || {
                Ok(Arc::new(SqlMigrationHook::for_module(&name, &dir, pool.clone()))
                    as Arc<dyn MigrationHook>)
            });
        }
    }
}

/// Module names become path segments and permission suffixes.
fn is_valid_module_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
