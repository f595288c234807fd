//! Beacon kernel library.
//!
//! Navigation composition, the main menu, module management, hooks and
//! database migrations. The `beacon` binary is a command line front end
//! over these.

pub mod auth;
pub mod daemon;
pub mod error;
pub mod hook;
pub mod ini;
pub mod menu;
pub mod migration;
pub mod module;
pub mod navigation;
pub mod url;
