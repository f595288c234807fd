//! Configuration error types shared by menus and module management.

use thiserror::Error;

/// Invalid configuration, as opposed to an I/O or database failure.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("menu '{menu}': unknown property '{property}'")]
    InvalidMenuProperty { menu: String, property: String },

    #[error("menu '{menu}': unknown renderer '{renderer}'")]
    UnknownRenderer { menu: String, renderer: String },

    #[error("menu '{menu}': priority must be an integer, got '{value}'")]
    InvalidPriority { menu: String, value: String },

    #[error("cannot enable module '{module}': module is not installed")]
    ModuleNotInstalled { module: String },

    #[error("module '{module}' is already enabled")]
    ModuleAlreadyEnabled { module: String },

    #[error("cannot disable module '{module}': {path} is not a symlink")]
    ModuleNotSymlinked { module: String, path: String },

    #[error("module '{module}' is not enabled")]
    ModuleNotEnabled { module: String },

    #[error("invalid module name '{module}'")]
    InvalidModuleName { module: String },
}

impl ConfigurationError {
    pub fn invalid_menu_property(menu: &str, property: &str) -> Self {
        Self::InvalidMenuProperty {
            menu: menu.to_string(),
            property: property.to_string(),
        }
    }

    pub fn unknown_renderer(menu: &str, renderer: &str) -> Self {
        Self::UnknownRenderer {
            menu: menu.to_string(),
            renderer: renderer.to_string(),
        }
    }

    pub fn module_not_installed(module: &str) -> Self {
        Self::ModuleNotInstalled {
            module: module.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_culprit() {
        let e = ConfigurationError::invalid_menu_property("System.Modules", "colour");
        assert_eq!(e.to_string(), "menu 'System.Modules': unknown property 'colour'");

        let e = ConfigurationError::module_not_installed("monitoring");
        assert!(e.to_string().contains("monitoring"));
    }
}
