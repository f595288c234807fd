//! Versioned upgrade scripts.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use super::error::MigrationError;

// `[v]<version>[_<description>].sql`
#[allow(clippy::expect_used)]
static SCRIPT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(v)?([^_]+)(?:_(\w+))?\.sql$").expect("migration script pattern is valid")
});

/// One pending upgrade script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStep {
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    script_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

impl MigrationStep {
    pub fn new(version: impl Into<String>, script_path: impl Into<PathBuf>) -> Self {
        Self {
            version: version.into(),
            description: None,
            script_path: script_path.into(),
            last_error: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    /// The error of the last failed attempt, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn set_last_error(&mut self, error: Option<String>) {
        self.last_error = error;
    }
}

/// Collect scripts in `dir` newer than `current_version`, oldest first.
///
/// A missing directory means there is nothing to migrate. `descriptions`
/// overrides the description taken from a script's file name.
pub fn scan_upgrade_dir(
    dir: &Path,
    current_version: &str,
    descriptions: &HashMap<String, String>,
) -> Result<Vec<MigrationStep>, MigrationError> {
    if !dir.is_dir() {
        debug!(path = %dir.display(), "no upgrade directory");
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir).map_err(|source| MigrationError::UpgradeDir {
        path: dir.display().to_string(),
        source,
    })?;

    let mut steps = Vec::new();
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let Some(caps) = SCRIPT_NAME.captures(file_name) else {
            debug!(file = file_name, "ignoring file in upgrade directory");
            continue;
        };
        let Some(version) = caps.get(2).map(|m| m.as_str()) else {
            continue;
        };
        if compare_versions(version, current_version) != Ordering::Greater {
            continue;
        }

        let mut step = MigrationStep::new(version, entry.path());
        if let Some(description) = descriptions.get(version) {
            step.description = Some(description.clone());
        } else if let Some(described) = caps.get(3) {
            step.description = Some(described.as_str().replace('_', " "));
        }
        steps.push(step);
    }

    steps.sort_by(|a, b| compare_versions(&a.version, &b.version));
    Ok(steps)
}

/// Compare dotted version strings numerically where possible.
///
/// `2.10.0` sorts after `2.9`; missing components count as zero.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let split = |v: &str| -> Vec<String> {
        v.trim_start_matches('v')
            .split(['.', '-', '_', '+'])
            .map(str::to_string)
            .collect()
    };
    let (a, b) = (split(a), split(b));

    for i in 0..a.len().max(b.len()) {
        let x = a.get(i).map(String::as_str).unwrap_or("0");
        let y = b.get(i).map(String::as_str).unwrap_or("0");
        let ord = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => x.cmp(y),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    Ordering::Equal
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn versions_compare_numerically() {
        assert_eq!(compare_versions("2.10.0", "2.9.1"), Ordering::Greater);
        assert_eq!(compare_versions("2.9", "2.9.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0.0", "0"), Ordering::Greater);
        assert_eq!(compare_versions("v1.2", "1.3"), Ordering::Less);
    }

    #[test]
    fn script_names() {
        let caps = SCRIPT_NAME.captures("v2.12.0_add_index.sql").unwrap();
        assert_eq!(&caps[2], "2.12.0");
        assert_eq!(&caps[3], "add_index");

        let caps = SCRIPT_NAME.captures("2.8.0.sql").unwrap();
        assert_eq!(&caps[2], "2.8.0");
        assert!(caps.get(3).is_none());

        assert!(SCRIPT_NAME.captures("README.md").is_none());
    }

    #[test]
    fn missing_dir_has_no_steps() {
        let steps =
            scan_upgrade_dir(Path::new("/nonexistent/upgrades"), "0", &HashMap::new()).unwrap();
        assert!(steps.is_empty());
    }
}
