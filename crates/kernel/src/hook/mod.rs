//! Extension points provided by the application and its modules.

mod registry;

pub use registry::{HookRegistry, normalize_name};
