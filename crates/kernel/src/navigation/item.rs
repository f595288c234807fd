//! A single navigation entry and the properties it is built from.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use super::container::Navigation;
use super::error::NavigationError;
use super::kind::ItemKind;
use crate::auth::Authorizer;
use crate::ini::IniSection;
use crate::url::NavUrl;

/// Priority of items that do not set one. Lower sorts first.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Keys a config section may carry that are not item properties.
///
/// `parent` is consumed by the tree builder, the sharing keys by the loader.
const STRUCTURAL_KEYS: &[&str] = &["parent", "owner", "users", "groups"];

/// Which renderer draws an item, and its options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RendererSpec {
    pub name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, String>,
}

impl RendererSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: BTreeMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// Raw properties of an item before it is created.
///
/// This is the typed form of a config section (or of the arrays the
/// built-in menus are declared with).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemProperties {
    pub label: Option<String>,
    pub url: Option<String>,
    pub url_parameters: BTreeMap<String, String>,
    pub priority: Option<i32>,
    pub icon: Option<String>,
    pub target: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub renderer: Option<RendererSpec>,
    pub permission: Option<String>,
    pub item_type: Option<String>,
    pub active: bool,
    pub children: Vec<(String, ItemProperties)>,
}

impl ItemProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn item_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = Some(item_type.into());
        self
    }

    pub fn renderer(mut self, renderer: RendererSpec) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn url_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.url_parameters.insert(name.into(), value.into());
        self
    }

    pub fn active(mut self) -> Self {
        self.active = true;
        self
    }

    pub fn child(mut self, name: impl Into<String>, properties: ItemProperties) -> Self {
        self.children.push((name.into(), properties));
        self
    }

    /// Read properties from a config section.
    ///
    /// Unknown keys are ignored (logged at debug level). A non-numeric
    /// `priority` is an error.
    pub fn from_section(section: &IniSection) -> Result<Self, NavigationError> {
        let mut props = Self::new();
        let mut renderer_options = BTreeMap::new();

        for (key, value) in section.iter() {
            if let Some((prefix, rest)) = key.split_once('.') {
                match prefix {
                    "attributes" => {
                        props.attributes.insert(rest.to_string(), value.to_string());
                    }
                    "url_parameters" | "urlParameters" => {
                        props
                            .url_parameters
                            .insert(rest.to_string(), value.to_string());
                    }
                    "renderer" => {
                        renderer_options.insert(rest.to_string(), value.to_string());
                    }
                    _ => debug!(
                        item = section.name(),
                        property = key,
                        "ignoring unknown navigation property"
                    ),
                }
                continue;
            }

            match key {
                "label" => props.label = Some(value.to_string()),
                "url" => props.url = Some(value.to_string()),
                "icon" => props.icon = Some(value.to_string()),
                "target" => props.target = Some(value.to_string()),
                "permission" => props.permission = Some(value.to_string()),
                "type" => props.item_type = Some(value.to_string()),
                "renderer" => props.renderer = Some(RendererSpec::new(value)),
                "priority" => {
                    let priority =
                        value
                            .trim()
                            .parse()
                            .map_err(|_| NavigationError::InvalidProperty {
                                item: section.name().to_string(),
                                property: key.to_string(),
                                value: value.to_string(),
                            })?;
                    props.priority = Some(priority);
                }
                k if STRUCTURAL_KEYS.contains(&k) => {}
                _ => debug!(
                    item = section.name(),
                    property = key,
                    "ignoring unknown navigation property"
                ),
            }
        }

        if !renderer_options.is_empty() {
            // Options without a renderer name configure the default renderer.
            let spec = props
                .renderer
                .get_or_insert_with(|| RendererSpec::new("default"));
            spec.options = renderer_options;
        }

        Ok(props)
    }
}

/// A node in a navigation tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationItem {
    name: String,
    label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<NavUrl>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    url_parameters: BTreeMap<String, String>,
    priority: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
    kind: ItemKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    renderer: Option<RendererSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    module: Option<String>,
    active: bool,
    #[serde(skip_serializing_if = "Navigation::is_empty")]
    children: Navigation,
}

impl NavigationItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            url: None,
            url_parameters: BTreeMap::new(),
            priority: None,
            icon: None,
            target: None,
            attributes: BTreeMap::new(),
            kind: ItemKind::default(),
            renderer: None,
            module: None,
            active: false,
            children: Navigation::new(),
        }
    }

    /// Create an item from properties.
    ///
    /// Children are added through [`Navigation::add_item`] and are therefore
    /// subject to the same permission check as top-level items.
    pub fn from_properties(
        name: impl Into<String>,
        properties: ItemProperties,
        default_kind: ItemKind,
        authorizer: &dyn Authorizer,
    ) -> Self {
        let mut item = Self::new(name);
        item.kind = properties
            .item_type
            .as_deref()
            .map(ItemKind::resolve)
            .unwrap_or(default_kind);
        item.label = properties.label;
        item.url = properties.url.as_deref().map(NavUrl::from_path);
        item.url_parameters = properties.url_parameters;
        item.priority = properties.priority;
        item.icon = properties.icon;
        item.target = properties.target;
        item.attributes = properties.attributes;
        item.renderer = properties.renderer;

        for (child_name, child_props) in properties.children {
            item.children
                .add_item_as(child_name, child_props, default_kind, authorizer);
        }

        if properties.active || item.children.iter().any(NavigationItem::is_active) {
            item.active = true;
        }

        item
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The label, falling back to the name.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn explicit_label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = Some(label.into());
    }

    pub fn url(&self) -> Option<&NavUrl> {
        self.url.as_ref()
    }

    pub fn set_url(&mut self, url: Option<NavUrl>) {
        self.url = url;
    }

    pub fn url_parameters(&self) -> &BTreeMap<String, String> {
        &self.url_parameters
    }

    pub fn set_url_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.url_parameters.insert(name.into(), value.into());
    }

    /// The URL with the item's URL parameters applied.
    pub fn full_url(&self) -> Option<NavUrl> {
        let mut url = self.url.clone()?;
        for (k, v) in &self.url_parameters {
            url.set_param(k.clone(), v.clone());
        }
        Some(url)
    }

    /// Effective priority used for ordering.
    pub fn priority(&self) -> i32 {
        self.priority.unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn explicit_priority(&self) -> Option<i32> {
        self.priority
    }

    pub fn set_priority(&mut self, priority: i32) {
        self.priority = Some(priority);
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn set_icon(&mut self, icon: impl Into<String>) {
        self.icon = Some(icon.into());
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn set_target(&mut self, target: impl Into<String>) {
        self.target = Some(target.into());
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: ItemKind) {
        self.kind = kind;
    }

    pub fn renderer(&self) -> Option<&RendererSpec> {
        self.renderer.as_ref()
    }

    pub fn set_renderer(&mut self, renderer: RendererSpec) {
        self.renderer = Some(renderer);
    }

    /// The module that contributed this item, if any.
    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// Mark this item and all of its descendants as owned by `module`.
    pub fn set_module(&mut self, module: &str) {
        self.module = Some(module.to_string());
        for child in self.children.iter_mut() {
            child.set_module(module);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Set the active flag of this item only.
    ///
    /// To activate an item together with its ancestors use
    /// [`Navigation::activate`] on the tree that owns it.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn children(&self) -> &Navigation {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Navigation {
        &mut self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Add a child. An active child makes this item active.
    pub fn add_child(&mut self, child: NavigationItem) {
        if child.is_active() {
            self.active = true;
        }
        self.children.insert(child);
    }

    /// Whether this item cannot be merged with `other`.
    ///
    /// Items of different kinds always conflict; otherwise only two
    /// differing URLs do. Items without a URL never conflict.
    pub fn conflicts_with(&self, other: &NavigationItem) -> bool {
        if self.kind != other.kind {
            return true;
        }

        match (&self.url, &other.url) {
            (Some(ours), Some(theirs)) => !ours.matches(theirs),
            _ => false,
        }
    }

    /// Merge `other` into this item.
    ///
    /// Values set on this item win; unset ones are filled from `other`.
    /// Children are merged recursively.
    pub fn merge(&mut self, other: NavigationItem) -> Result<(), NavigationError> {
        if self.conflicts_with(&other) {
            return Err(NavigationError::MergeConflict {
                existing: self.name.clone(),
                incoming: other.name,
            });
        }

        self.absorb(other);
        Ok(())
    }

    /// Merge without the conflict check. Callers have already checked.
    pub(crate) fn absorb(&mut self, other: NavigationItem) {
        if self.priority.is_none() {
            self.priority = other.priority;
        }
        if self.icon.is_none() {
            self.icon = other.icon;
        }
        if self.label.is_none() {
            self.label = other.label;
        }
        if self.url.is_none() {
            self.url = other.url;
        }
        if self.target.is_none() {
            self.target = other.target;
        }
        if self.renderer.is_none() {
            self.renderer = other.renderer;
        }
        if self.module.is_none() {
            self.module = other.module;
        }
        for (name, value) in other.attributes {
            self.attributes.entry(name).or_insert(value);
        }
        for (name, value) in other.url_parameters {
            self.url_parameters.entry(name).or_insert(value);
        }
        if other.active {
            self.active = true;
        }

        self.children.merge(other.children);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::Unrestricted;

    fn item(name: &str, props: ItemProperties) -> NavigationItem {
        NavigationItem::from_properties(name, props, ItemKind::default(), &Unrestricted)
    }

    #[test]
    fn label_falls_back_to_name() {
        let mut i = NavigationItem::new("hosts");
        assert_eq!(i.label(), "hosts");
        i.set_label("Hosts");
        assert_eq!(i.label(), "Hosts");
    }

    #[test]
    fn priority_defaults_to_100() {
        let i = NavigationItem::new("a");
        assert_eq!(i.priority(), DEFAULT_PRIORITY);
        assert_eq!(i.explicit_priority(), None);
    }

    #[test]
    fn items_without_urls_never_conflict() {
        let a = item("a", ItemProperties::new());
        let b = item("a", ItemProperties::new().url("/x"));
        assert!(!a.conflicts_with(&b));
        assert!(!b.conflicts_with(&a));
    }

    #[test]
    fn differing_urls_conflict() {
        let a = item("a", ItemProperties::new().url("/x"));
        let b = item("a", ItemProperties::new().url("/y"));
        let c = item("a", ItemProperties::new().url("x"));
        assert!(a.conflicts_with(&b));
        assert!(!a.conflicts_with(&c));
    }

    #[test]
    fn differing_kinds_conflict() {
        let a = item("a", ItemProperties::new());
        let b = item("a", ItemProperties::new().item_type("dashboard-pane"));
        assert!(a.conflicts_with(&b));
    }

    #[test]
    fn merge_fills_unset_fields() {
        let mut a = item("A", ItemProperties::new());
        let b = item("A", ItemProperties::new().priority(50).icon("foo.png"));
        a.merge(b).unwrap();
        assert_eq!(a.explicit_priority(), Some(50));
        assert_eq!(a.icon(), Some("foo.png"));
    }

    #[test]
    fn merge_keeps_receiver_values() {
        let mut a = item(
            "A",
            ItemProperties::new()
                .priority(10)
                .label("Mine")
                .attribute("class", "ours"),
        );
        let b = item(
            "A",
            ItemProperties::new()
                .priority(50)
                .label("Theirs")
                .attribute("class", "theirs")
                .attribute("id", "a-1")
                .url_parameter("state", "1"),
        );
        a.merge(b).unwrap();
        assert_eq!(a.priority(), 10);
        assert_eq!(a.label(), "Mine");
        assert_eq!(a.attribute("class"), Some("ours"));
        assert_eq!(a.attribute("id"), Some("a-1"));
        assert_eq!(a.url_parameters().get("state").map(String::as_str), Some("1"));
    }

    #[test]
    fn merge_refuses_conflicts() {
        let mut a = item("A", ItemProperties::new().url("/x"));
        let b = item("A", ItemProperties::new().url("/y"));
        assert_eq!(
            a.merge(b),
            Err(NavigationError::MergeConflict {
                existing: "A".to_string(),
                incoming: "A".to_string()
            })
        );
    }

    #[test]
    fn active_child_activates_parent() {
        let mut parent = NavigationItem::new("parent");
        let mut child = NavigationItem::new("child");
        child.set_active(true);
        parent.add_child(child);
        assert!(parent.is_active());

        let built = item(
            "p",
            ItemProperties::new().child("c", ItemProperties::new().active()),
        );
        assert!(built.is_active());
    }

    #[test]
    fn children_are_permission_gated() {
        let user = crate::auth::User::new("u").with_permissions(["config/modules"]);
        let built = NavigationItem::from_properties(
            "System",
            ItemProperties::new()
                .child(
                    "Modules",
                    ItemProperties::new()
                        .url("config/modules")
                        .permission("config/modules"),
                )
                .child(
                    "Configuration",
                    ItemProperties::new()
                        .url("config")
                        .permission("config/application/*"),
                ),
            ItemKind::MenuItem,
            &user,
        );
        let names: Vec<_> = built.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["Modules"]);
        assert_eq!(built.children().iter().next().unwrap().kind(), ItemKind::MenuItem);
    }

    #[test]
    fn properties_from_section() {
        let section = IniSection::new("hosts")
            .with("label", "Hosts")
            .with("url", "list/hosts")
            .with("priority", "20")
            .with("attributes.class", "highlight")
            .with("urlParameters.state", "down")
            .with("renderer", "badge")
            .with("renderer.count", "3")
            .with("parent", "overview")
            .with("bogus", "ignored");
        let props = ItemProperties::from_section(&section).unwrap();
        assert_eq!(props.label.as_deref(), Some("Hosts"));
        assert_eq!(props.priority, Some(20));
        assert_eq!(props.attributes.get("class").map(String::as_str), Some("highlight"));
        assert_eq!(props.url_parameters.get("state").map(String::as_str), Some("down"));
        let renderer = props.renderer.unwrap();
        assert_eq!(renderer.name, "badge");
        assert_eq!(renderer.options.get("count").map(String::as_str), Some("3"));
    }

    #[test]
    fn invalid_priority_is_an_error() {
        let section = IniSection::new("x").with("priority", "high");
        assert!(matches!(
            ItemProperties::from_section(&section),
            Err(NavigationError::InvalidProperty { .. })
        ));
    }

    #[test]
    fn full_url_applies_parameters() {
        let i = item(
            "x",
            ItemProperties::new()
                .url("list/hosts?sort=name")
                .url_parameter("state", "1"),
        );
        assert_eq!(i.full_url().unwrap().to_string(), "list/hosts?sort=name&state=1");
    }
}
