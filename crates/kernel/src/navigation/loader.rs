//! Composing a user's navigation from every configured source.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, error};

use super::container::Navigation;
use super::kind::ItemKind;
use crate::auth::{MODULE_PERMISSION_NS, User};
use crate::ini::{IniFile, IniSection};
use crate::module::Module;

/// Loads navigation of one kind for one user.
///
/// Sources, in merge order: the shared navigation config, the user's own
/// preferences, then every loaded module the user may access. Dashboard
/// panes only come from modules.
pub struct NavigationLoader<'a> {
    config_dir: &'a Path,
    modules: &'a [Module],
}

impl<'a> NavigationLoader<'a> {
    pub fn new(config_dir: &'a Path, modules: &'a [Module]) -> Self {
        Self {
            config_dir,
            modules,
        }
    }

    pub fn shared_config_path(&self, kind: ItemKind) -> PathBuf {
        self.config_dir
            .join("navigation")
            .join(format!("{}.ini", kind.config_stem()))
    }

    pub fn user_config_path(&self, kind: ItemKind, username: &str) -> PathBuf {
        self.config_dir
            .join("preferences")
            .join(username)
            .join(format!("{}.ini", kind.config_stem()))
    }

    pub fn load(&self, kind: ItemKind, user: &User) -> Navigation {
        let mut navigation = Navigation::new();

        if kind != ItemKind::DashboardPane {
            let shared = shared_with(IniFile::read_or_empty(&self.shared_config_path(kind)), user);
            if let Some(nav) = build_source(&shared, kind, user, "shared") {
                navigation.merge(nav);
            }

            if is_safe_path_segment(user.username()) {
                let own = IniFile::read_or_empty(&self.user_config_path(kind, user.username()));
                if let Some(nav) = build_source(&own, kind, user, "preferences") {
                    navigation.merge(nav);
                }
            } else {
                debug!(user = user.username(), "skipping preferences for unusual username");
            }
        }

        for module in self.modules {
            let permission = format!("{MODULE_PERMISSION_NS}{}", module.name());
            if !user.can(&permission) {
                continue;
            }

            let config = IniFile::read_or_empty(&module.navigation_config_path(kind));
            if let Some(mut nav) = build_source(&config, kind, user, module.name()) {
                for item in nav.iter_mut() {
                    item.set_module(module.name());
                }
                navigation.merge(nav);
            }
        }

        navigation.order();
        navigation
    }
}

fn build_source(config: &IniFile, kind: ItemKind, user: &User, source: &str) -> Option<Navigation> {
    if config.is_empty() {
        return None;
    }

    match Navigation::from_config_with_kind(config, kind, user) {
        Ok(nav) => Some(nav),
        Err(e) => {
            error!(
                source,
                kind = %kind,
                error = %e,
                "failed to load navigation source, skipping it"
            );
            None
        }
    }
}

/// Keep the shared sections visible to `user`. A section below a hidden
/// parent is hidden as well.
fn shared_with(mut config: IniFile, user: &User) -> IniFile {
    let mut hidden: HashSet<String> = config
        .sections()
        .iter()
        .filter(|s| !is_visible_to(s, user))
        .map(|s| s.name().to_string())
        .collect();

    loop {
        let before = hidden.len();
        for section in config.sections() {
            if let Some(parent) = section.get("parent")
                && hidden.contains(parent.trim())
            {
                hidden.insert(section.name().to_string());
            }
        }
        if hidden.len() == before {
            break;
        }
    }

    config.retain_sections(|s| !hidden.contains(s.name()));
    config
}

/// Sections without sharing keys are visible to everyone.
fn is_visible_to(section: &IniSection, user: &User) -> bool {
    let owner = section.get("owner");
    let users = section.list("users");
    let groups = section.list("groups");

    if owner.is_none() && users.is_empty() && groups.is_empty() {
        return true;
    }

    owner == Some(user.username())
        || users.iter().any(|u| u == "*" || u == user.username())
        || groups.iter().any(|g| user.is_member_of(g))
}

fn is_safe_path_segment(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn sharing_rules() {
        let ini = IniFile::parse(
            r#"
[Everyone]
[Mine]
owner = alice
[Team]
groups = ops
[Star]
users = *
[Child]
parent = Team
"#,
        )
        .unwrap();

        let alice = User::new("alice");
        let bob = User::new("bob").with_groups(["ops"]);

        let names = |ini: IniFile| -> Vec<String> {
            ini.sections().iter().map(|s| s.name().to_string()).collect()
        };

        assert_eq!(names(shared_with(ini.clone(), &alice)), vec!["Everyone", "Mine", "Star"]);
        assert_eq!(
            names(shared_with(ini, &bob)),
            vec!["Everyone", "Team", "Star", "Child"]
        );
    }

    #[test]
    fn unsafe_usernames_are_rejected() {
        assert!(is_safe_path_segment("alice"));
        assert!(!is_safe_path_segment("../etc"));
        assert!(!is_safe_path_segment(".."));
        assert!(!is_safe_path_segment(""));
    }
}
