//! Navigation trees.
//!
//! A [`Navigation`] is composed per request from several config sources
//! (shared config, user preferences, enabled modules). Same-named items
//! from different sources are merged unless they conflict, in which case
//! the incoming item is renamed and kept alongside.

mod builder;
mod container;
mod error;
mod item;
mod kind;
mod loader;
mod render;

pub(crate) use container::increment_suffix;
pub use container::Navigation;
pub use error::NavigationError;
pub use item::{DEFAULT_PRIORITY, ItemProperties, NavigationItem, RendererSpec};
pub use kind::ItemKind;
pub use loader::NavigationLoader;
pub use render::{
    BadgeRenderer, CORE_RENDERERS, DefaultRenderer, ForeignRenderer, ItemRenderer, RenderContext,
    RenderError, RendererRegistry, html_escape,
};
