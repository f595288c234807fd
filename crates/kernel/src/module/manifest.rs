//! Parser for `module.toml` manifest files.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::ModuleError;

/// Manifest file name inside a module directory.
pub const MANIFEST_FILE: &str = "module.toml";

/// Module metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_version")]
    pub version: String,

    /// Modules that must be loaded first.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

fn default_version() -> String {
    "0.0.0".to_string()
}

impl ModuleManifest {
    /// Manifest used for modules that ship none.
    pub fn fallback(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            version: default_version(),
            dependencies: Vec::new(),
        }
    }

    /// Read the manifest of the module `name` in `dir`.
    pub fn load(name: &str, dir: &Path) -> Result<Self, ModuleError> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            debug!(module = name, "no manifest, using defaults");
            return Ok(Self::fallback(name));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| ModuleError::io(&path, e))?;
        Self::parse_str(name, &content)
    }

    /// Parse manifest TOML for the module `name`.
    pub fn parse_str(name: &str, content: &str) -> Result<Self, ModuleError> {
        let manifest: ModuleManifest =
            toml::from_str(content).map_err(|e| ModuleError::InvalidManifest {
                module: name.to_string(),
                details: e.to_string(),
            })?;

        if manifest.name.trim().is_empty() {
            return Err(ModuleError::InvalidManifest {
                module: name.to_string(),
                details: "empty 'name' field".to_string(),
            });
        }
        if manifest.name != name {
            warn!(
                module = name,
                manifest_name = %manifest.name,
                "manifest name differs from module directory"
            );
        }

        Ok(manifest)
    }
}
