//! Module discovery, manifests and load order.

mod dependency;
mod error;
mod manager;
mod manifest;

pub use dependency::{check_dependencies, remove_unsatisfied, resolve_load_order};
pub use error::ModuleError;
pub use manager::{ENABLED_MODULES_DIR, Module, ModuleManager};
pub use manifest::{MANIFEST_FILE, ModuleManifest};
