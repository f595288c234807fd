//! Navigation item kinds.

use std::fmt;

use serde::Serialize;
use tracing::debug;

/// The type of a navigation item.
///
/// Items of different kinds never merge: a dashboard pane and a menu entry
/// sharing a name are treated as a conflict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    #[default]
    NavigationItem,
    MenuItem,
    DropdownItem,
    DashboardPane,
    HostAction,
    ServiceAction,
}

impl ItemKind {
    pub const ALL: [ItemKind; 6] = [
        ItemKind::NavigationItem,
        ItemKind::MenuItem,
        ItemKind::DropdownItem,
        ItemKind::DashboardPane,
        ItemKind::HostAction,
        ItemKind::ServiceAction,
    ];

    /// Look up a kind by its type name (`menu-item`, `dashboard-pane`, ...).
    pub fn from_type_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|k| k.type_name() == name)
    }

    /// Like [`ItemKind::from_type_name`], falling back to the base kind.
    pub fn resolve(name: &str) -> Self {
        Self::from_type_name(name).unwrap_or_else(|| {
            debug!(
                item_type = name,
                "unknown navigation item type, using navigation-item"
            );
            Self::NavigationItem
        })
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Self::NavigationItem => "navigation-item",
            Self::MenuItem => "menu-item",
            Self::DropdownItem => "dropdown-item",
            Self::DashboardPane => "dashboard-pane",
            Self::HostAction => "host-action",
            Self::ServiceAction => "service-action",
        }
    }

    /// File stem under which items of this kind are configured.
    pub fn config_stem(self) -> &'static str {
        match self {
            Self::NavigationItem => "navigation",
            Self::MenuItem => "menu",
            Self::DropdownItem => "dropdown",
            Self::DashboardPane => "dashboard",
            Self::HostAction => "host-actions",
            Self::ServiceAction => "service-actions",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_round_trip() {
        for kind in ItemKind::ALL {
            assert_eq!(ItemKind::from_type_name(kind.type_name()), Some(kind));
        }
    }

    #[test]
    fn unknown_type_falls_back() {
        assert_eq!(ItemKind::from_type_name("shiny-widget"), None);
        assert_eq!(ItemKind::resolve("shiny-widget"), ItemKind::NavigationItem);
        assert_eq!(ItemKind::resolve(" Menu-Item "), ItemKind::MenuItem);
    }
}
