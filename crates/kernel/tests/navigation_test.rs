#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Navigation composed from shared config, user preferences and modules.

use beacon_kernel::auth::User;
use beacon_kernel::module::ModuleManager;
use beacon_kernel::navigation::{ItemKind, NavigationLoader, RenderContext, RendererRegistry};
use beacon_kernel::url::NavUrl;
use beacon_test_utils::{TestConfigDir, assert};

const ROLES: &str = "
[admins]
users = alice
permissions = module/graphs

[operators]
groups = ops
permissions = module/monitoring
";

const SHARED_MENU: &str = "
[All hosts]
parent = Hosts
url = hosts/all

[Hosts]
url = hosts
priority = 20

[Secret]
url = secret
users = bob

[Secret child]
parent = Secret
url = secret/child
";

const GRAPHS_MENU: &str = "
[Graphs]
url = graphs
priority = 30

[Hosts]
icon = server

[Problems]
url = problems
renderer = badge
renderer.count = 3
renderer.state = critical
";

fn fixture() -> TestConfigDir {
    TestConfigDir::new()
        .with_roles(ROLES)
        .with_navigation("menu", SHARED_MENU)
        .with_preferences("alice", "menu", "[Favourites]\nurl = favourites\npriority = 5\n")
        .with_module("graphs", None)
        .with_module_file("graphs", "navigation/menu.ini", GRAPHS_MENU)
        .with_module_file("graphs", "navigation/dashboard.ini", "[Load]\nurl = graphs/load\n")
        .with_module("monitoring", None)
        .with_module_file("monitoring", "navigation/menu.ini", "[Services]\nurl = services\n")
        .enable("graphs")
        .enable("monitoring")
}

fn modules(dir: &TestConfigDir) -> ModuleManager {
    let mut manager = ModuleManager::new(&dir.config_dir(), vec![dir.module_path()]);
    manager.load_enabled_modules().unwrap();
    manager
}

#[test]
fn merges_every_source_in_order() {
    let dir = fixture();
    let manager = modules(&dir);
    let config_dir = dir.config_dir();
    let loader = NavigationLoader::new(&config_dir, manager.loaded_modules());

    let alice = User::load(&config_dir, "alice", &[]);
    let nav = loader.load(ItemKind::MenuItem, &alice);

    assert_eq!(nav.names(), vec!["Favourites", "Hosts", "Graphs", "Problems"]);

    let hosts = nav.get_item("Hosts").unwrap();
    assert_eq!(hosts.icon(), Some("server"));
    assert_eq!(hosts.url().map(ToString::to_string), Some("hosts".to_string()));
    assert_eq!(hosts.children().names(), vec!["All hosts"]);
    assert_eq!(hosts.kind(), ItemKind::MenuItem);

    assert_eq!(nav.get_item("Graphs").unwrap().module(), Some("graphs"));
}

#[test]
fn visibility_and_module_permissions_follow_the_user() {
    let dir = fixture();
    let manager = modules(&dir);
    let config_dir = dir.config_dir();
    let loader = NavigationLoader::new(&config_dir, manager.loaded_modules());

    let bob = User::load(&config_dir, "bob", &["ops".to_string()]);
    let nav = loader.load(ItemKind::MenuItem, &bob);

    assert_eq!(nav.names(), vec!["Hosts", "Secret", "Services"]);
    assert_eq!(nav.get_item("Secret").unwrap().children().names(), vec!["Secret child"]);

    let carol = User::load(&config_dir, "carol", &[]);
    let nav = loader.load(ItemKind::MenuItem, &carol);
    assert_eq!(nav.names(), vec!["Hosts"]);
}

#[test]
fn dashboard_panes_only_come_from_modules() {
    let dir = fixture().with_navigation("dashboard", "[Shared pane]\nurl = shared\n");
    let manager = modules(&dir);
    let config_dir = dir.config_dir();
    let loader = NavigationLoader::new(&config_dir, manager.loaded_modules());

    let alice = User::load(&config_dir, "alice", &[]);
    let nav = loader.load(ItemKind::DashboardPane, &alice);
    assert_eq!(nav.names(), vec!["Load"]);
    assert_eq!(nav.get_item("Load").unwrap().kind(), ItemKind::DashboardPane);
}

#[test]
fn conflicting_items_from_modules_are_renamed() {
    let dir = TestConfigDir::new()
        .with_roles("[all]\nusers = alice\npermissions = module/*\n")
        .with_navigation("host-actions", "[Reports]\nurl = reports/a\n")
        .with_module("graphs", None)
        .with_module_file("graphs", "navigation/host-actions.ini", "[Reports]\nurl = reports/b\n")
        .enable("graphs");
    let manager = modules(&dir);
    let config_dir = dir.config_dir();
    let loader = NavigationLoader::new(&config_dir, manager.loaded_modules());

    let nav = loader.load(ItemKind::HostAction, &User::load(&config_dir, "alice", &[]));
    assert_eq!(nav.names(), vec!["Reports", "Reports_2"]);
    assert_eq!(
        nav.get_item("Reports_2").unwrap().url().map(ToString::to_string),
        Some("reports/b".to_string())
    );
}

#[test]
fn a_broken_source_is_skipped() {
    let dir = fixture().with_preferences(
        "alice",
        "menu",
        "[Orphan]\nparent = Missing\nurl = orphan\n",
    );
    let manager = modules(&dir);
    let config_dir = dir.config_dir();
    let loader = NavigationLoader::new(&config_dir, manager.loaded_modules());

    let nav = loader.load(ItemKind::MenuItem, &User::load(&config_dir, "alice", &[]));
    assert!(nav.get_item("Orphan").is_none());
    assert!(nav.get_item("Hosts").is_some());
}

#[test]
fn activated_items_render_as_active() {
    let dir = fixture();
    let manager = modules(&dir);
    let config_dir = dir.config_dir();
    let loader = NavigationLoader::new(&config_dir, manager.loaded_modules());

    let mut nav = loader.load(ItemKind::MenuItem, &User::load(&config_dir, "alice", &[]));
    assert!(nav.activate_url(&NavUrl::from_path("hosts/all")));
    assert_eq!(nav.active_path(), vec!["Hosts", "All hosts"]);
    assert!(!nav.get_item("Graphs").unwrap().is_active());

    let html = RendererRegistry::default().render_navigation(&nav, &RenderContext::new("/beacon"));
    assert::contains(&html, "<li class=\"nav-item active\"><a href=\"/beacon/hosts\">");
    assert::contains(&html, "<ul class=\"nav nav-level-2\"><li class=\"nav-item active\">");
    assert::contains(&html, "<span class=\"badge state-critical\">3</span>");
    assert::in_order(&html, &["Favourites", "Hosts", "All hosts", "Graphs", "Problems"]);
}
