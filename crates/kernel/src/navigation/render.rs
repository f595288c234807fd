//! HTML rendering of navigation items.
//!
//! Renderers are looked up by name when an item is drawn: first in the
//! owning module's namespace, then among the core renderers, and finally
//! the default renderer is used. A renderer that fails is logged and the
//! item is drawn with the default markup instead.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::container::Navigation;
use super::item::NavigationItem;

/// Names of the renderers every registry starts with.
pub const CORE_RENDERERS: &[&str] = &["default", "badge", "foreign"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("renderer '{renderer}' requires option '{option}'")]
    MissingOption { renderer: String, option: String },

    #[error("renderer '{renderer}': invalid value '{value}' for option '{option}'")]
    InvalidOption {
        renderer: String,
        option: String,
        value: String,
    },
}

/// Per-render settings.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Prefix for application-relative URLs.
    pub base_url: String,
}

impl RenderContext {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

/// Draws a single item as an HTML fragment.
pub trait ItemRenderer: Send + Sync {
    fn render(
        &self,
        item: &NavigationItem,
        options: &BTreeMap<String, String>,
        ctx: &RenderContext,
    ) -> Result<String, RenderError>;
}

/// `<a>` for items with a URL, `<span>` otherwise.
#[derive(Debug, Default)]
pub struct DefaultRenderer;

impl ItemRenderer for DefaultRenderer {
    fn render(
        &self,
        item: &NavigationItem,
        _options: &BTreeMap<String, String>,
        ctx: &RenderContext,
    ) -> Result<String, RenderError> {
        Ok(item_markup(item, ctx, item.target(), None))
    }
}

/// Default markup plus a counter badge.
///
/// Options: `count` (required), `state` (defaults to `ok`), `title`.
#[derive(Debug, Default)]
pub struct BadgeRenderer;

impl ItemRenderer for BadgeRenderer {
    fn render(
        &self,
        item: &NavigationItem,
        options: &BTreeMap<String, String>,
        ctx: &RenderContext,
    ) -> Result<String, RenderError> {
        let raw = options
            .get("count")
            .ok_or_else(|| RenderError::MissingOption {
                renderer: "badge".to_string(),
                option: "count".to_string(),
            })?;
        let count: u32 = raw.trim().parse().map_err(|_| RenderError::InvalidOption {
            renderer: "badge".to_string(),
            option: "count".to_string(),
            value: raw.clone(),
        })?;

        if count == 0 {
            return Ok(item_markup(item, ctx, item.target(), None));
        }

        let state = options.get("state").map(String::as_str).unwrap_or("ok");
        let mut badge = format!("<span class=\"badge state-{}\"", html_escape(state));
        if let Some(title) = options.get("title") {
            let _ = write!(badge, " title=\"{}\"", html_escape(title));
        }
        let _ = write!(badge, ">{count}</span>");

        Ok(item_markup(item, ctx, item.target(), Some(&badge)))
    }
}

/// Links that leave the application shell and load as a full page.
#[derive(Debug, Default)]
pub struct ForeignRenderer;

impl ItemRenderer for ForeignRenderer {
    fn render(
        &self,
        item: &NavigationItem,
        _options: &BTreeMap<String, String>,
        ctx: &RenderContext,
    ) -> Result<String, RenderError> {
        Ok(item_markup(item, ctx, Some("_self"), None))
    }
}

/// Named renderers, split into core and per-module namespaces.
pub struct RendererRegistry {
    core: HashMap<String, Arc<dyn ItemRenderer>>,
    modules: HashMap<(String, String), Arc<dyn ItemRenderer>>,
}

impl Default for RendererRegistry {
    fn default() -> Self {
        let mut registry = Self {
            core: HashMap::new(),
            modules: HashMap::new(),
        };
        registry.register_core("default", Arc::new(DefaultRenderer));
        registry.register_core("badge", Arc::new(BadgeRenderer));
        registry.register_core("foreign", Arc::new(ForeignRenderer));
        registry
    }
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_core(&mut self, name: &str, renderer: Arc<dyn ItemRenderer>) {
        self.core.insert(name.to_lowercase(), renderer);
    }

    pub fn register_module(&mut self, module: &str, name: &str, renderer: Arc<dyn ItemRenderer>) {
        self.modules
            .insert((module.to_string(), name.to_lowercase()), renderer);
    }

    pub fn has_renderer(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        match name.split_once('/') {
            Some((module, local)) => self
                .modules
                .contains_key(&(module.to_string(), local.to_string())),
            None => self.core.contains_key(&name),
        }
    }

    /// Find the renderer for `name` as seen from an item owned by `module`.
    ///
    /// `module/name` addresses a module renderer directly. Returns `None`
    /// when nothing matches; callers fall back to the default renderer.
    pub fn resolve(&self, name: &str, module: Option<&str>) -> Option<Arc<dyn ItemRenderer>> {
        let name = name.to_lowercase();

        if let Some((ns, local)) = name.split_once('/') {
            return self
                .modules
                .get(&(ns.to_string(), local.to_string()))
                .cloned();
        }

        if let Some(module) = module
            && let Some(renderer) = self.modules.get(&(module.to_string(), name.clone()))
        {
            return Some(Arc::clone(renderer));
        }

        self.core.get(&name).cloned()
    }

    /// Render one item. Never fails.
    pub fn render_item(&self, item: &NavigationItem, ctx: &RenderContext) -> String {
        let Some(spec) = item.renderer() else {
            return item_markup(item, ctx, item.target(), None);
        };

        let Some(renderer) = self.resolve(&spec.name, item.module()) else {
            debug!(
                item = item.name(),
                renderer = %spec.name,
                "unknown navigation renderer, using default"
            );
            return item_markup(item, ctx, item.target(), None);
        };

        match renderer.render(item, &spec.options, ctx) {
            Ok(html) => html,
            Err(e) => {
                warn!(
                    item = item.name(),
                    renderer = %spec.name,
                    error = %e,
                    "navigation renderer failed, using default"
                );
                item_markup(item, ctx, item.target(), None)
            }
        }
    }

    /// Render a navigation as nested `<ul>` lists.
    pub fn render_navigation(&self, navigation: &Navigation, ctx: &RenderContext) -> String {
        let mut html = String::new();
        self.render_level(navigation, ctx, 0, &mut html);
        html
    }

    fn render_level(&self, navigation: &Navigation, ctx: &RenderContext, depth: usize, out: &mut String) {
        if depth == 0 {
            out.push_str("<ul class=\"nav\">");
        } else {
            let _ = write!(out, "<ul class=\"nav nav-level-{}\">", depth + 1);
        }

        for item in navigation {
            out.push_str("<li class=\"nav-item");
            if item.is_active() {
                out.push_str(" active");
            }
            out.push_str("\">");
            out.push_str(&self.render_item(item, ctx));
            if item.has_children() {
                self.render_level(item.children(), ctx, depth + 1, out);
            }
            out.push_str("</li>");
        }

        out.push_str("</ul>");
    }
}

fn item_markup(
    item: &NavigationItem,
    ctx: &RenderContext,
    target: Option<&str>,
    suffix: Option<&str>,
) -> String {
    let mut html = String::new();
    let url = item.full_url();

    match &url {
        Some(url) => {
            let _ = write!(html, "<a href=\"{}\"", html_escape(&url.href(&ctx.base_url)));
            if let Some(target) = target {
                let _ = write!(html, " target=\"{}\"", html_escape(target));
            }
        }
        None => html.push_str("<span"),
    }

    for (name, value) in item.attributes() {
        let _ = write!(html, " {}=\"{}\"", html_escape(name), html_escape(value));
    }
    html.push('>');

    if let Some(icon) = item.icon() {
        let _ = write!(html, "<i class=\"icon-{}\"></i>", html_escape(icon));
    }
    html.push_str(&html_escape(item.label()));
    if let Some(suffix) = suffix {
        html.push_str(suffix);
    }

    html.push_str(if url.is_some() { "</a>" } else { "</span>" });
    html
}

/// Escape text for HTML element content and attribute values.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::Unrestricted;
    use crate::navigation::{ItemKind, ItemProperties, RendererSpec};

    fn item(props: ItemProperties) -> NavigationItem {
        NavigationItem::from_properties("Hosts", props, ItemKind::default(), &Unrestricted)
    }

    fn ctx() -> RenderContext {
        RenderContext::new("/beacon")
    }

    #[test]
    fn link_with_icon_and_attributes() {
        let i = item(
            ItemProperties::new()
                .url("list/hosts")
                .icon("host")
                .attribute("class", "x")
                .target("_blank"),
        );
        let html = RendererRegistry::new().render_item(&i, &ctx());
        assert_eq!(
            html,
            "<a href=\"/beacon/list/hosts\" target=\"_blank\" class=\"x\"><i class=\"icon-host\"></i>Hosts</a>"
        );
    }

    #[test]
    fn span_without_url_and_escaped_label() {
        let i = item(ItemProperties::new().label("<b>&"));
        let html = RendererRegistry::new().render_item(&i, &ctx());
        assert_eq!(html, "<span>&lt;b&gt;&amp;</span>");
    }

    #[test]
    fn badge_renderer_appends_count() {
        let i = item(
            ItemProperties::new().url("list/hosts").renderer(
                RendererSpec::new("Badge")
                    .with_option("count", "3")
                    .with_option("state", "critical"),
            ),
        );
        let html = RendererRegistry::new().render_item(&i, &ctx());
        assert!(html.ends_with("Hosts<span class=\"badge state-critical\">3</span></a>"));
    }

    #[test]
    fn failing_renderer_falls_back_to_default() {
        let i = item(
            ItemProperties::new()
                .url("list/hosts")
                .renderer(RendererSpec::new("badge").with_option("count", "many")),
        );
        let html = RendererRegistry::new().render_item(&i, &ctx());
        assert_eq!(html, "<a href=\"/beacon/list/hosts\">Hosts</a>");
    }

    #[test]
    fn unknown_renderer_falls_back_to_default() {
        let i = item(ItemProperties::new().renderer(RendererSpec::new("sparkles")));
        assert_eq!(RendererRegistry::new().render_item(&i, &ctx()), "<span>Hosts</span>");
    }

    #[test]
    fn foreign_renderer_forces_self_target() {
        let i = item(
            ItemProperties::new()
                .url("authentication/logout")
                .renderer(RendererSpec::new("foreign")),
        );
        assert!(RendererRegistry::new()
            .render_item(&i, &ctx())
            .contains("target=\"_self\""));
    }

    struct Shout;

    impl ItemRenderer for Shout {
        fn render(
            &self,
            item: &NavigationItem,
            _options: &BTreeMap<String, String>,
            _ctx: &RenderContext,
        ) -> Result<String, RenderError> {
            Ok(item.label().to_uppercase())
        }
    }

    #[test]
    fn module_namespace_wins_over_core() {
        let mut registry = RendererRegistry::new();
        registry.register_module("monitoring", "badge", Arc::new(Shout));

        let mut owned = item(ItemProperties::new().renderer(RendererSpec::new("badge")));
        owned.set_module("monitoring");
        assert_eq!(registry.render_item(&owned, &ctx()), "HOSTS");

        let explicit = item(ItemProperties::new().renderer(RendererSpec::new("monitoring/badge")));
        assert_eq!(registry.render_item(&explicit, &ctx()), "HOSTS");
        assert!(registry.has_renderer("monitoring/badge"));
        assert!(!registry.has_renderer("other/badge"));
    }

    #[test]
    fn nested_list_marks_active_items() {
        let mut nav = Navigation::new();
        nav.add_item(
            "Overview",
            ItemProperties::new().child("Hosts", ItemProperties::new().url("list/hosts")),
            &Unrestricted,
        );
        nav.activate(&["Overview", "Hosts"]);
        let html = RendererRegistry::new().render_navigation(&nav, &ctx());
        assert_eq!(
            html,
            "<ul class=\"nav\"><li class=\"nav-item active\"><span>Overview</span>\
             <ul class=\"nav nav-level-2\"><li class=\"nav-item active\">\
             <a href=\"/beacon/list/hosts\">Hosts</a></li></ul></li></ul>"
        );
    }
}
