//! Navigation URLs.
//!
//! Navigation entries mostly carry application-relative paths
//! (`config/modules`, `list/hosts?state=1`); a few link elsewhere
//! (`https://docs.example.org`). [`NavUrl`] keeps the two apart so
//! rendering can prefix relative paths with the application base URL.

use std::fmt;

use serde::{Serialize, Serializer};
use url::form_urlencoded;

/// A parsed navigation URL: path plus ordered query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavUrl {
    path: String,
    params: Vec<(String, String)>,
    external: bool,
}

impl NavUrl {
    /// Parse a URL as written in configuration.
    ///
    /// Absolute `http(s)` URLs are kept as-is; anything else is treated as
    /// a path relative to the application root (leading `/` stripped).
    pub fn from_path(raw: &str) -> Self {
        let raw = raw.trim();

        if let Ok(parsed) = url::Url::parse(raw)
            && matches!(parsed.scheme(), "http" | "https")
        {
            let params = parsed
                .query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            let mut base = parsed.clone();
            base.set_query(None);
            return Self {
                path: base.to_string(),
                params,
                external: true,
            };
        }

        let (path, query) = match raw.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (raw, None),
        };

        let params = query
            .map(|q| {
                form_urlencoded::parse(q.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            path: path.trim_start_matches('/').to_string(),
            params,
            external: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a parameter, replacing an existing value in place.
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.params.push((key, value)),
        }
    }

    pub fn is_external(&self) -> bool {
        self.external
    }

    /// Whether two URLs address the same resource.
    ///
    /// Paths are compared without trailing slashes; parameters are compared
    /// as a set, so their order does not matter.
    pub fn matches(&self, other: &NavUrl) -> bool {
        if self.external != other.external
            || self.path.trim_end_matches('/') != other.path.trim_end_matches('/')
        {
            return false;
        }

        let mut ours = self.params.clone();
        let mut theirs = other.params.clone();
        ours.sort();
        theirs.sort();
        ours == theirs
    }

    /// Render as an href, prefixing relative paths with `base_url`.
    pub fn href(&self, base_url: &str) -> String {
        if self.external {
            return self.to_string();
        }
        format!("{}/{}", base_url.trim_end_matches('/'), self)
    }

    fn query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &self.params {
            serializer.append_pair(k, v);
        }
        serializer.finish()
    }
}

impl fmt::Display for NavUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.path)
        } else {
            write!(f, "{}?{}", self.path, self.query_string())
        }
    }
}

impl Serialize for NavUrl {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
