//! INI configuration reader.
//!
//! Wraps `rust-ini` for the files of the configuration directory
//! (`config.ini`, `roles.ini`, `menu.ini`, navigation files). Section and
//! key order is preserved: menu and navigation composition depend on
//! declaration order.
//!
//! Values may be double quoted with `\"` escapes. Dotted keys
//! (`attributes.class = x`) are read back via [`IniSection::nested`].

use std::path::Path;

use anyhow::{Context, Result};
use ::ini::{Ini, ParseOption};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors found while parsing INI content.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IniError {
    #[error("line {line}, column {col}: {message}")]
    Syntax {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("key '{key}' appears outside of any section")]
    KeyOutsideSection { key: String },
}

impl From<::ini::ParseError> for IniError {
    fn from(e: ::ini::ParseError) -> Self {
        Self::Syntax {
            line: e.line,
            col: e.col,
            message: e.msg.to_string(),
        }
    }
}

/// A named section with ordered key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniSection {
    name: String,
    entries: Vec<(String, String)>,
}

impl IniSection {
    /// Create an empty section.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    /// Builder-style setter, mostly useful in tests and built-in defaults.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Get the value of a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Set a key, replacing an existing value in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Remove a key and return its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let pos = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(pos).1)
    }

    /// Iterate over key/value pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collect all keys below a dotted prefix, with the prefix stripped.
    ///
    /// `attributes.class = x` yields `("class", "x")` for prefix `attributes`.
    pub fn nested(&self, prefix: &str) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('.'))
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest.to_string(), v.clone()))
            })
            .collect()
    }

    /// Read a comma-separated list value. Empty entries are dropped.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A parsed INI file: ordered sections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniFile {
    sections: Vec<IniSection>,
}

impl IniFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse INI content.
    ///
    /// A section declared twice is merged into its first occurrence, later
    /// keys overriding earlier ones.
    pub fn parse(content: &str) -> Result<Self, IniError> {
        let options = ParseOption {
            enabled_quote: true,
            enabled_escape: true,
            ..ParseOption::default()
        };
        let parsed = Ini::load_from_str_opt(content, options)?;

        let mut file = Self::new();
        for (name, properties) in parsed.iter() {
            let Some(name) = name else {
                if let Some((key, _)) = properties.iter().next() {
                    return Err(IniError::KeyOutsideSection {
                        key: key.to_string(),
                    });
                }
                continue;
            };

            let mut section = IniSection::new(name.trim());
            for (key, value) in properties.iter() {
                section.set(key, value);
            }
            file.push_section(section);
        }

        Ok(file)
    }

    /// Read and parse an INI file from disk.
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read INI file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("failed to parse INI file: {}", path.display()))
    }

    /// Read an INI file, degrading to an empty file on any error.
    ///
    /// A missing file is normal (most configuration is optional) and only
    /// logged at debug level; unreadable or malformed files are warnings.
    pub fn read_or_empty(path: &Path) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "configuration file not present");
            return Self::new();
        }

        match Self::read(path) {
            Ok(file) => file,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %format!("{e:#}"),
                    "failed to load configuration, using empty config"
                );
                Self::new()
            }
        }
    }

    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_mut(&mut self, name: &str) -> Option<&mut IniSection> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    pub fn has_section(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Append a section, merging into an existing one of the same name.
    pub fn push_section(&mut self, section: IniSection) {
        match self.position(&section.name) {
            Some(pos) => {
                for (k, v) in section.entries {
                    self.sections[pos].set(k, v);
                }
            }
            None => self.sections.push(section),
        }
    }

    /// Keep only the sections for which the predicate returns true.
    pub fn retain_sections(&mut self, mut keep: impl FnMut(&IniSection) -> bool) {
        self.sections.retain(|s| keep(s));
    }

    pub fn sections(&self) -> &[IniSection] {
        &self.sections
    }

    pub fn into_sections(self) -> Vec<IniSection> {
        self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Shorthand for `section(name)?.get(key)`.
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section).and_then(|s| s.get(key))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.name == name)
    }
}
