//! Users, roles and permission checks.
//!
//! Permissions are plain strings such as `config/modules` or
//! `module/monitoring`. A granted permission ending in `*` covers every
//! permission sharing its prefix; a lone `*` covers everything.

use std::path::Path;

use serde::Serialize;

use crate::ini::IniFile;

/// Permission namespace a user needs to see a module's contributions.
pub const MODULE_PERMISSION_NS: &str = "module/";

/// Anything that can answer "is this permission granted?".
///
/// Navigation, menus and the hook registry take an `&dyn Authorizer`
/// rather than consulting a process-wide authentication singleton.
pub trait Authorizer {
    fn can(&self, permission: &str) -> bool;
}

/// Grants everything. Used for CLI commands and background jobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unrestricted;

impl Authorizer for Unrestricted {
    fn can(&self, _permission: &str) -> bool {
        true
    }
}

/// An authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct User {
    username: String,
    groups: Vec<String>,
    permissions: Vec<String>,
}

impl User {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    /// Build a user from `roles.ini`.
    ///
    /// Every role listing the user (or one of their groups) contributes its
    /// `permissions`. Duplicates are dropped, first occurrence wins.
    pub fn from_roles(username: &str, groups: &[String], roles: &IniFile) -> Self {
        let mut permissions: Vec<String> = Vec::new();

        for role in roles.sections() {
            let listed = role.list("users").iter().any(|u| u == username)
                || role
                    .list("groups")
                    .iter()
                    .any(|g| groups.iter().any(|own| own == g));
            if !listed {
                continue;
            }

            for permission in role.list("permissions") {
                if !permissions.contains(&permission) {
                    permissions.push(permission);
                }
            }
        }

        Self::new(username)
            .with_groups(groups.iter().cloned())
            .with_permissions(permissions)
    }

    /// Load a user from `<config_dir>/roles.ini`, degrading to no
    /// permissions when the file is missing or unreadable.
    pub fn load(config_dir: &Path, username: &str, groups: &[String]) -> Self {
        let roles = IniFile::read_or_empty(&config_dir.join("roles.ini"));
        Self::from_roles(username, groups, &roles)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    pub fn permissions(&self) -> &[String] {
        &self.permissions
    }

    pub fn is_member_of(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Check a permission against the granted set.
    pub fn can(&self, required: &str) -> bool {
        self.permissions
            .iter()
            .any(|granted| permission_matches(granted, required))
    }
}

impl Authorizer for User {
    fn can(&self, permission: &str) -> bool {
        User::can(self, permission)
    }
}

/// Whether `granted` covers `required`.
///
/// Wildcards work in both directions: `config/*` grants `config/modules`,
/// and a required `config/*` is satisfied by any granted `config/...`.
pub fn permission_matches(granted: &str, required: &str) -> bool {
    if granted == "*" || granted == required {
        return true;
    }

    if let Some(prefix) = granted.strip_suffix('*')
        && required.starts_with(prefix)
    {
        return true;
    }

    if let Some(prefix) = required.strip_suffix('*')
        && granted.starts_with(prefix)
    {
        return true;
    }

    false
}
