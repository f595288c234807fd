//! The main menu.
//!
//! Menus are addressed by dotted id paths (`System.Modules`) and assembled
//! from the built-in entries plus every loaded module's `menu.ini`.

mod main_menu;
mod tree;

pub use tree::{Menu, MenuNode};
