//! Building navigation trees from flat config sections.
//!
//! Each section is an item; a `parent` key names the section it nests
//! under. Sections may appear in any order, so the tree is assembled in a
//! separate pass over an arena of sections with parent indices.

use std::collections::HashMap;

use super::container::Navigation;
use super::error::NavigationError;
use super::item::ItemProperties;
use super::kind::ItemKind;
use crate::auth::Authorizer;
use crate::ini::IniFile;

struct Node {
    name: String,
    properties: Option<ItemProperties>,
    parent: Option<usize>,
    children: Vec<usize>,
}

impl Navigation {
    /// Build a navigation from config sections, using the base item kind
    /// for sections without a `type`.
    pub fn from_config(
        config: &IniFile,
        authorizer: &dyn Authorizer,
    ) -> Result<Navigation, NavigationError> {
        Self::from_config_with_kind(config, ItemKind::default(), authorizer)
    }

    /// Build a navigation from config sections.
    ///
    /// Fails when a `parent` reference names no section, or when sections
    /// form a parent cycle.
    pub fn from_config_with_kind(
        config: &IniFile,
        default_kind: ItemKind,
        authorizer: &dyn Authorizer,
    ) -> Result<Navigation, NavigationError> {
        let mut nodes = Vec::with_capacity(config.len());
        let mut index: HashMap<&str, usize> = HashMap::new();

        for section in config.sections() {
            index.insert(section.name(), nodes.len());
            nodes.push(Node {
                name: section.name().to_string(),
                properties: Some(ItemProperties::from_section(section)?),
                parent: None,
                children: Vec::new(),
            });
        }

        let mut missing: Vec<&str> = Vec::new();
        for (idx, section) in config.sections().iter().enumerate() {
            let Some(parent) = section.get("parent").map(str::trim) else {
                continue;
            };
            if parent.is_empty() {
                continue;
            }
            match index.get(parent) {
                Some(&p) => {
                    nodes[idx].parent = Some(p);
                    nodes[p].children.push(idx);
                }
                None if !missing.contains(&parent) => missing.push(parent),
                None => {}
            }
        }

        if !missing.is_empty() {
            return Err(NavigationError::UnresolvedParents {
                parents: missing.join(", "),
            });
        }

        let roots: Vec<usize> = (0..nodes.len())
            .filter(|&i| nodes[i].parent.is_none())
            .collect();

        let mut reached = vec![false; nodes.len()];
        let mut stack = roots.clone();
        while let Some(idx) = stack.pop() {
            reached[idx] = true;
            stack.extend(nodes[idx].children.iter().copied());
        }
        if reached.iter().any(|r| !r) {
            let items: Vec<&str> = nodes
                .iter()
                .zip(&reached)
                .filter(|(_, r)| !**r)
                .map(|(n, _)| n.name.as_str())
                .collect();
            return Err(NavigationError::ParentCycle {
                items: items.join(", "),
            });
        }

        let mut navigation = Navigation::new();
        for root in roots {
            let name = nodes[root].name.clone();
            let properties = assemble(root, &mut nodes);
            navigation.add_item_as(name, properties, default_kind, authorizer);
        }

        Ok(navigation)
    }
}

fn assemble(idx: usize, nodes: &mut [Node]) -> ItemProperties {
    let mut properties = nodes[idx].properties.take().unwrap_or_default();
    let children = std::mem::take(&mut nodes[idx].children);
    for child in children {
        let name = nodes[child].name.clone();
        properties.children.push((name, assemble(child, nodes)));
    }
    properties
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::{Unrestricted, User};

    #[test]
    fn parents_may_follow_children() {
        let ini = IniFile::parse(
            r#"
[Hosts]
parent = Overview
url = list/hosts

[Overview]
priority = 10

[Services]
parent = Overview
url = list/services
"#,
        )
        .unwrap();

        let nav = Navigation::from_config(&ini, &Unrestricted).unwrap();
        assert_eq!(nav.names(), vec!["Overview"]);
        let overview = nav.get_item("Overview").unwrap();
        assert_eq!(overview.priority(), 10);
        assert_eq!(overview.children().names(), vec!["Hosts", "Services"]);
    }

    #[test]
    fn missing_parents_are_reported() {
        let ini = IniFile::parse(
            "[a]\nparent = nowhere\n[b]\nparent = nowhere\n[c]\nparent = gone\n",
        )
        .unwrap();
        assert_eq!(
            Navigation::from_config(&ini, &Unrestricted),
            Err(NavigationError::UnresolvedParents {
                parents: "nowhere, gone".to_string()
            })
        );
    }

    #[test]
    fn parent_cycles_are_reported() {
        let ini = IniFile::parse("[a]\nparent = b\n[b]\nparent = a\n[c]\n").unwrap();
        assert_eq!(
            Navigation::from_config(&ini, &Unrestricted),
            Err(NavigationError::ParentCycle {
                items: "a, b".to_string()
            })
        );
    }

    #[test]
    fn default_kind_applies_to_untyped_sections() {
        let ini = IniFile::parse("[Reboot]\nurl = cmd/reboot\n[Pane]\ntype = dashboard-pane\n")
            .unwrap();
        let nav =
            Navigation::from_config_with_kind(&ini, ItemKind::HostAction, &Unrestricted).unwrap();
        assert_eq!(nav.get_item("Reboot").unwrap().kind(), ItemKind::HostAction);
        assert_eq!(nav.get_item("Pane").unwrap().kind(), ItemKind::DashboardPane);
    }

    #[test]
    fn denied_sections_drop_their_subtree() {
        let ini = IniFile::parse(
            "[Admin]\npermission = config/*\n[Users]\nparent = Admin\n[Help]\n",
        )
        .unwrap();
        let nav = Navigation::from_config(&ini, &User::new("guest")).unwrap();
        assert_eq!(nav.names(), vec!["Help"]);
    }
}
