//! Menu tree keyed by dotted id paths.

use serde::Serialize;

use crate::auth::Authorizer;
use crate::error::ConfigurationError;
use crate::ini::{IniFile, IniSection};
use crate::navigation::{CORE_RENDERERS, DEFAULT_PRIORITY, increment_suffix};
use crate::url::NavUrl;

/// A menu entry and its sub menus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Menu {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<NavUrl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    renderer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    permission: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sub_menus: Vec<Menu>,
}

/// A menu visited by [`Menu::walk`].
#[derive(Debug, Clone, Copy)]
pub struct MenuNode<'a> {
    pub depth: usize,
    pub menu: &'a Menu,
}

impl Menu {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            priority: None,
            url: None,
            icon: None,
            renderer: None,
            permission: None,
            sub_menus: Vec::new(),
        }
    }

    /// Build a menu from several INI configs.
    ///
    /// Sections are collected in order; a section name already seen in an
    /// earlier config gets `_dup` appended rather than being merged.
    pub fn from_config(configs: &[IniFile]) -> Result<Menu, ConfigurationError> {
        let mut flat: Vec<IniSection> = Vec::new();
        for config in configs {
            for section in config.sections() {
                let mut section = section.clone();
                while flat.iter().any(|s| s.name() == section.name()) {
                    let renamed = format!("{}_dup", section.name());
                    section.set_name(renamed);
                }
                flat.push(section);
            }
        }

        let mut menu = Menu::new("menu");
        for section in &flat {
            menu.add(section.name(), section.iter())?;
        }
        Ok(menu)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// The title, falling back to the id.
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }

    pub fn priority(&self) -> i32 {
        self.priority.unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn url(&self) -> Option<&NavUrl> {
        self.url.as_ref()
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn renderer(&self) -> Option<&str> {
        self.renderer.as_deref()
    }

    pub fn permission(&self) -> Option<&str> {
        self.permission.as_deref()
    }

    pub fn sub_menus(&self) -> &[Menu] {
        &self.sub_menus
    }

    pub fn has_sub_menus(&self) -> bool {
        !self.sub_menus.is_empty()
    }

    pub fn sub_menu(&self, id: &str) -> Option<&Menu> {
        self.sub_menus.iter().find(|m| m.id == id)
    }

    pub fn into_sub_menus(self) -> Vec<Menu> {
        self.sub_menus
    }

    /// Look up a descendant by dotted path (`System.Modules`).
    pub fn find(&self, path: &str) -> Option<&Menu> {
        path.split('.').try_fold(self, |menu, id| menu.sub_menu(id))
    }

    /// Set one property.
    pub fn set_property(&mut self, key: &str, value: &str) -> Result<(), ConfigurationError> {
        match key {
            "url" => self.url = Some(NavUrl::from_path(value)),
            "icon" => self.icon = Some(value.to_string()),
            "title" => self.title = Some(value.to_string()),
            "permission" => self.permission = Some(value.to_string()),
            "priority" => {
                let priority =
                    value
                        .trim()
                        .parse()
                        .map_err(|_| ConfigurationError::InvalidPriority {
                            menu: self.id.clone(),
                            value: value.to_string(),
                        })?;
                self.priority = Some(priority);
            }
            "renderer" => {
                let known = CORE_RENDERERS.contains(&value.to_lowercase().as_str());
                if !known && !value.contains('/') {
                    return Err(ConfigurationError::unknown_renderer(&self.id, value));
                }
                self.renderer = Some(value.to_string());
            }
            _ => return Err(ConfigurationError::invalid_menu_property(&self.id, key)),
        }
        Ok(())
    }

    pub fn set_properties<'p, I>(&mut self, properties: I) -> Result<(), ConfigurationError>
    where
        I: IntoIterator<Item = (&'p str, &'p str)>,
    {
        for (key, value) in properties {
            self.set_property(key, value)?;
        }
        Ok(())
    }

    /// Add (or update) the sub menu at a dotted id path.
    ///
    /// Missing intermediate menus are created. Declaring an existing menu
    /// again updates its properties and keeps its sub menus.
    pub fn add<'p, I>(&mut self, id: &str, properties: I) -> Result<&mut Menu, ConfigurationError>
    where
        I: IntoIterator<Item = (&'p str, &'p str)>,
    {
        match id.split_once('.') {
            Some((head, rest)) => self.child_or_insert(head).add(rest, properties),
            None => {
                let menu = self.child_or_insert(id);
                menu.set_properties(properties)?;
                Ok(menu)
            }
        }
    }

    /// Whether two menus point at different URLs.
    pub fn conflicts_with(&self, other: &Menu) -> bool {
        match (&self.url, &other.url) {
            (Some(ours), Some(theirs)) => !ours.matches(theirs),
            _ => false,
        }
    }

    /// Merge a sub menu.
    ///
    /// A same-id menu without conflict takes over the incoming menu's
    /// explicit properties and merges its sub menus. A conflicting menu is
    /// added under the next free `id_N`.
    pub fn merge_sub_menu(&mut self, mut menu: Menu) {
        let Some(idx) = self.position(&menu.id) else {
            self.sub_menus.push(menu);
            return;
        };

        if self.sub_menus[idx].conflicts_with(&menu) {
            let mut candidate = increment_suffix(&menu.id);
            while self.position(&candidate).is_some() {
                candidate = increment_suffix(&candidate);
            }
            menu.id = candidate;
            self.sub_menus.push(menu);
            return;
        }

        let existing = &mut self.sub_menus[idx];
        if menu.title.is_some() {
            existing.title = menu.title;
        }
        if menu.priority.is_some() {
            existing.priority = menu.priority;
        }
        if menu.url.is_some() {
            existing.url = menu.url;
        }
        if menu.icon.is_some() {
            existing.icon = menu.icon;
        }
        if menu.renderer.is_some() {
            existing.renderer = menu.renderer;
        }
        if menu.permission.is_some() {
            existing.permission = menu.permission;
        }
        existing.merge_sub_menus(menu.sub_menus);
    }

    pub fn merge_sub_menus(&mut self, menus: Vec<Menu>) {
        for menu in menus {
            self.merge_sub_menu(menu);
        }
    }

    /// Sort sub menus by priority, then case-insensitive title, recursively.
    pub fn order(&mut self) {
        self.sub_menus.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.title().to_lowercase().cmp(&b.title().to_lowercase()))
        });
        for menu in &mut self.sub_menus {
            menu.order();
        }
    }

    /// Drop sub menus whose permission is not granted, recursively.
    pub fn retain_permitted(&mut self, authorizer: &dyn Authorizer) {
        self.sub_menus
            .retain(|m| m.permission.as_deref().is_none_or(|p| authorizer.can(p)));
        for menu in &mut self.sub_menus {
            menu.retain_permitted(authorizer);
        }
    }

    /// Visit every sub menu depth first, with its depth (top level is 0).
    pub fn walk(&self) -> Vec<MenuNode<'_>> {
        let mut nodes = Vec::new();
        self.collect(0, &mut nodes);
        nodes
    }

    fn collect<'a>(&'a self, depth: usize, out: &mut Vec<MenuNode<'a>>) {
        for menu in &self.sub_menus {
            out.push(MenuNode { depth, menu });
            menu.collect(depth + 1, out);
        }
    }

    /// Unique element id for the menu at `path` (ids from the top level).
    pub fn unique_id(path: &[&str]) -> String {
        let ids: Vec<String> = path
            .iter()
            .map(|id| {
                id.chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                    .collect()
            })
            .collect();
        format!("menuitem-{}", ids.join("-"))
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.sub_menus.iter().position(|m| m.id == id)
    }

    fn child_or_insert(&mut self, id: &str) -> &mut Menu {
        let idx = match self.position(id) {
            Some(idx) => idx,
            None => {
                self.sub_menus.push(Menu::new(id));
                self.sub_menus.len() - 1
            }
        };
        &mut self.sub_menus[idx]
    }
}
