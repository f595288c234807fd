//! Ordered collections of navigation items.

use serde::Serialize;

use super::item::{ItemProperties, NavigationItem};
use super::kind::ItemKind;
use crate::auth::Authorizer;
use crate::url::NavUrl;

/// An ordered set of navigation items with unique names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Navigation {
    items: Vec<NavigationItem>,
}

impl Navigation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NavigationItem> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut NavigationItem> {
        self.items.iter_mut()
    }

    pub fn names(&self) -> Vec<&str> {
        self.items.iter().map(NavigationItem::name).collect()
    }

    /// Get an item by its exact name.
    pub fn get_item(&self, name: &str) -> Option<&NavigationItem> {
        self.items.iter().find(|i| i.name() == name)
    }

    pub fn get_item_mut(&mut self, name: &str) -> Option<&mut NavigationItem> {
        self.items.iter_mut().find(|i| i.name() == name)
    }

    /// Find an item by name, falling back to a case-insensitive match.
    pub fn find_item(&self, name: &str) -> Option<&NavigationItem> {
        self.find_index(name).map(|idx| &self.items[idx])
    }

    pub fn remove_item(&mut self, name: &str) -> Option<NavigationItem> {
        let idx = self.items.iter().position(|i| i.name() == name)?;
        Some(self.items.remove(idx))
    }

    /// Add an item of the base kind. See [`Navigation::add_item_as`].
    pub fn add_item(
        &mut self,
        name: impl Into<String>,
        properties: ItemProperties,
        authorizer: &dyn Authorizer,
    ) -> bool {
        self.add_item_as(name, properties, ItemKind::default(), authorizer)
    }

    /// Create an item from `properties` and add it.
    ///
    /// Returns `false` without adding anything when the properties require a
    /// permission the authorizer does not grant. An existing item with the
    /// same name is replaced in place.
    pub fn add_item_as(
        &mut self,
        name: impl Into<String>,
        properties: ItemProperties,
        default_kind: ItemKind,
        authorizer: &dyn Authorizer,
    ) -> bool {
        if let Some(permission) = properties.permission.as_deref()
            && !authorizer.can(permission)
        {
            return false;
        }

        let item = NavigationItem::from_properties(name, properties, default_kind, authorizer);
        self.insert(item);
        true
    }

    /// Insert an item, replacing one with the same name.
    pub fn insert(&mut self, item: NavigationItem) {
        match self.items.iter_mut().find(|i| i.name() == item.name()) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    /// Merge every item of `other` into this navigation.
    pub fn merge(&mut self, other: Navigation) {
        for item in other.items {
            self.merge_item(item);
        }
    }

    /// Merge a single item.
    ///
    /// A same-named item that does not conflict absorbs the incoming one.
    /// A conflicting item is renamed (`name_2`, `name_3`, ...) until it
    /// lands on a free name or on an existing item it does not conflict
    /// with, which then absorbs it.
    pub fn merge_item(&mut self, mut item: NavigationItem) {
        let Some(idx) = self.find_index(item.name()) else {
            self.items.push(item);
            return;
        };

        if !self.items[idx].conflicts_with(&item) {
            self.items[idx].absorb(item);
            return;
        }

        let mut candidate = increment_suffix(item.name());
        loop {
            match self.find_index(&candidate) {
                None => {
                    item.set_name(candidate);
                    self.items.push(item);
                    return;
                }
                Some(idx) if !self.items[idx].conflicts_with(&item) => {
                    self.items[idx].absorb(item);
                    return;
                }
                Some(_) => candidate = increment_suffix(&candidate),
            }
        }
    }

    /// Sort by priority, then case-insensitive label, recursively.
    ///
    /// The sort is stable so equal keys keep insertion order.
    pub fn order(&mut self) {
        self.items.sort_by(|a, b| {
            a.priority()
                .cmp(&b.priority())
                .then_with(|| a.label().to_lowercase().cmp(&b.label().to_lowercase()))
        });

        for item in &mut self.items {
            item.children_mut().order();
        }
    }

    /// Activate the item at `path` (names from the root) and its ancestors.
    ///
    /// Nothing is touched when the path does not resolve to an item.
    pub fn activate(&mut self, path: &[&str]) -> bool {
        let Some((first, rest)) = path.split_first() else {
            return false;
        };
        let Some(item) = self.get_item_mut(first) else {
            return false;
        };

        if rest.is_empty() || item.children_mut().activate(rest) {
            item.set_active(true);
            return true;
        }

        false
    }

    /// Activate the first item (depth first) linking to `url`, and its
    /// ancestors.
    pub fn activate_url(&mut self, url: &NavUrl) -> bool {
        for item in &mut self.items {
            let hit = item.url().is_some_and(|own| own.matches(url))
                || item.full_url().is_some_and(|own| own.matches(url));

            if hit || item.children_mut().activate_url(url) {
                item.set_active(true);
                return true;
            }
        }

        false
    }

    /// Names of the active items from the root down to the deepest one.
    pub fn active_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut level = self;
        while let Some(item) = level.items.iter().find(|i| i.is_active()) {
            path.push(item.name());
            level = item.children();
        }
        path
    }

    fn find_index(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|i| i.name() == name).or_else(|| {
            let lower = name.to_lowercase();
            self.items
                .iter()
                .position(|i| i.name().to_lowercase() == lower)
        })
    }
}

impl<'a> IntoIterator for &'a Navigation {
    type Item = &'a NavigationItem;
    type IntoIter = std::slice::Iter<'a, NavigationItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Next name in the `name`, `name_2`, `name_3` sequence.
pub(crate) fn increment_suffix(name: &str) -> String {
    if let Some((base, suffix)) = name.rsplit_once('_')
        && !base.is_empty()
        && !suffix.is_empty()
        && suffix.bytes().all(|b| b.is_ascii_digit())
        && let Ok(n) = suffix.parse::<u32>()
    {
        return format!("{base}_{}", n.saturating_add(1));
    }

    format!("{name}_2")
}
