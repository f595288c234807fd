//! The application's main menu.

use tracing::warn;

use super::tree::Menu;
use crate::auth::{MODULE_PERMISSION_NS, User};
use crate::error::ConfigurationError;
use crate::module::Module;

impl Menu {
    /// Build the main menu for `user`.
    ///
    /// Anonymous visitors get an empty menu. Otherwise the built-in entries
    /// come first, then each loaded module's `menu.ini` is merged in
    /// registration order. Entries the user lacks permission for are
    /// dropped and the result is ordered.
    pub fn load(user: Option<&User>, logs_to_file: bool, modules: &[Module]) -> Menu {
        let mut menu = Menu::new("menu");
        let Some(user) = user else {
            return menu;
        };

        if let Err(e) = menu.add_main_menu_items(user, logs_to_file) {
            warn!(error = %e, "failed to add built-in menu entries");
        }

        for module in modules {
            if !user.can(&format!("{MODULE_PERMISSION_NS}{}", module.name())) {
                continue;
            }

            match module.menu_items() {
                Ok(items) => menu.merge_sub_menus(items),
                Err(e) => warn!(
                    module = module.name(),
                    error = %e,
                    "failed to load module menu, skipping it"
                ),
            }
        }

        menu.retain_permitted(user);
        menu.order();
        menu
    }

    fn add_main_menu_items(&mut self, user: &User, logs_to_file: bool) -> Result<(), ConfigurationError> {
        self.add(
            "Dashboard",
            [("url", "dashboard"), ("icon", "dashboard"), ("priority", "10")],
        )?;

        self.add("System", [("icon", "wrench"), ("priority", "200")])?;
        self.add(
            "System.Configuration",
            [
                ("url", "config"),
                ("permission", "config/application/*"),
                ("priority", "300"),
            ],
        )?;
        self.add(
            "System.Modules",
            [
                ("url", "config/modules"),
                ("permission", "config/modules"),
                ("priority", "400"),
            ],
        )?;
        if logs_to_file {
            self.add(
                "System.Application Log",
                [("url", "list/applicationlog"), ("priority", "500")],
            )?;
        }

        let username = user.username();
        // Dots would nest the entries below a bogus parent.
        let section = username.replace('.', "_");
        self.add(&section, [("icon", "user"), ("priority", "600")])?
            .set_property("title", username)?;
        self.add(
            &format!("{section}.Preferences"),
            [("url", "preference"), ("priority", "601")],
        )?;
        self.add(
            &format!("{section}.Logout"),
            [
                ("url", "authentication/logout"),
                ("priority", "700"),
                ("renderer", "foreign"),
            ],
        )?;

        Ok(())
    }
}
