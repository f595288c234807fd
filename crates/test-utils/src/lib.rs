#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Beacon test utilities.
//!
//! Helpers for integration testing: throwaway configuration directories
//! with modules, roles and navigation files, plus assertion helpers.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// A temporary Beacon installation, removed on drop.
///
/// Layout below [`TestConfigDir::root`]:
///
/// ```text
/// config/                  configuration directory
/// config/enabledModules/   links to enabled modules
/// modules/                 module path
/// base/                    application base directory
/// ```
#[derive(Debug)]
pub struct TestConfigDir {
    root: PathBuf,
}

impl Default for TestConfigDir {
    fn default() -> Self {
        Self::new()
    }
}

impl TestConfigDir {
    pub fn new() -> Self {
        let root = std::env::temp_dir().join(format!("beacon-test-{}", Uuid::now_v7()));
        fs::create_dir_all(root.join("config")).expect("Failed to create config dir");
        fs::create_dir_all(root.join("modules")).expect("Failed to create module dir");
        fs::create_dir_all(root.join("base")).expect("Failed to create base dir");
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn module_path(&self) -> PathBuf {
        self.root.join("modules")
    }

    pub fn base_dir(&self) -> PathBuf {
        self.root.join("base")
    }

    pub fn enabled_dir(&self) -> PathBuf {
        self.config_dir().join("enabledModules")
    }

    /// Write `config.ini`.
    pub fn with_config_ini(self, content: &str) -> Self {
        write(&self.config_dir().join("config.ini"), content);
        self
    }

    /// Write `roles.ini`.
    pub fn with_roles(self, content: &str) -> Self {
        write(&self.config_dir().join("roles.ini"), content);
        self
    }

    /// Write shared navigation, e.g. `with_navigation("menu", ...)`.
    pub fn with_navigation(self, stem: &str, content: &str) -> Self {
        write(
            &self
                .config_dir()
                .join("navigation")
                .join(format!("{stem}.ini")),
            content,
        );
        self
    }

    /// Write a user's navigation preferences.
    pub fn with_preferences(self, user: &str, stem: &str, content: &str) -> Self {
        write(
            &self
                .config_dir()
                .join("preferences")
                .join(user)
                .join(format!("{stem}.ini")),
            content,
        );
        self
    }

    /// Install a module. Without a manifest the module uses defaults.
    pub fn with_module(self, name: &str, manifest: Option<&str>) -> Self {
        let dir = self.module_path().join(name);
        fs::create_dir_all(&dir).expect("Failed to create module");
        if let Some(manifest) = manifest {
            write(&dir.join("module.toml"), manifest);
        }
        self
    }

    /// Write a file inside an installed module.
    pub fn with_module_file(self, module: &str, relative: &str, content: &str) -> Self {
        write(&self.module_path().join(module).join(relative), content);
        self
    }

    /// Enable an installed module by linking it.
    pub fn enable(self, name: &str) -> Self {
        fs::create_dir_all(self.enabled_dir()).expect("Failed to create enabled dir");
        std::os::unix::fs::symlink(self.module_path().join(name), self.enabled_dir().join(name))
            .expect("Failed to link module");
        self
    }

    /// Write a file inside the application base directory.
    pub fn with_base_file(self, relative: &str, content: &str) -> Self {
        write(&self.base_dir().join(relative), content);
        self
    }
}

impl Drop for TestConfigDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(path, content).expect("Failed to write fixture");
}

/// A module manifest with the given dependencies.
pub fn manifest(name: &str, version: &str, dependencies: &[&str]) -> String {
    let deps: Vec<String> = dependencies.iter().map(|d| format!("\"{d}\"")).collect();
    format!(
        "name = \"{name}\"\nversion = \"{version}\"\ndescription = \"Test module {name}\"\ndependencies = [{}]\n",
        deps.join(", ")
    )
}

/// Assertion helpers.
pub mod assert {
    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string NOT to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that `names` appear in `haystack` in this order.
    pub fn in_order(haystack: &str, names: &[&str]) {
        let mut from = 0;
        for name in names {
            match haystack[from..].find(name) {
                Some(pos) => from += pos + name.len(),
                None => panic!("Expected '{name}' after position {from}\nActual: {haystack}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_layout_is_created_and_removed() {
        let root;
        {
            let dir = TestConfigDir::new()
                .with_module("graphs", Some(&manifest("graphs", "1.0", &[])))
                .enable("graphs");
            root = dir.root().to_path_buf();
            assert!(dir.module_path().join("graphs/module.toml").is_file());
            assert!(dir.enabled_dir().join("graphs").is_dir());
        }
        assert!(!root.exists());
    }

    #[test]
    fn manifest_lists_dependencies() {
        let m = manifest("a", "2.0", &["b", "c"]);
        assert!(m.contains("dependencies = [\"b\", \"c\"]"));
    }
}
