//! Command implementations.

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use tracing::{error, info, warn};

use beacon_kernel::daemon::{Daemon, MigrationWatchJob, shutdown_signal};
use beacon_kernel::menu::Menu;
use beacon_kernel::migration::{HookSummary, MigrationManager};
use beacon_kernel::module::ModuleManager;
use beacon_kernel::navigation::{Navigation, RenderContext, html_escape};
use beacon_kernel::url::NavUrl;

use super::{Command, MigrationCommand, ModuleCommand, OutputFormat, UserArgs};
use crate::config::Config;
use crate::db;
use crate::state::AppState;

/// Username used for navigation when no `--user` is given.
const ANONYMOUS: &str = "anonymous";

/// Run `command`, repeating it every `watch` seconds when set.
///
/// In watch mode a failing run is logged and retried on the next tick.
pub async fn run(command: &Command, config: Config, watch: Option<u64>, benchmark: bool) -> Result<()> {
    if let Command::Daemon { interval } = command {
        return daemon(config, Duration::from_secs(*interval)).await;
    }

    let Some(seconds) = watch else {
        return timed(command, &config, benchmark).await;
    };

    let shutdown = shutdown_signal()?;
    tokio::pin!(shutdown);
    loop {
        if let Err(e) = timed(command, &config, benchmark).await {
            error!(error = %format!("{e:#}"), "command failed");
        }
        tokio::select! {
            _ = &mut shutdown => return Ok(()),
            _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        }
    }
}

async fn timed(command: &Command, config: &Config, benchmark: bool) -> Result<()> {
    let started = Instant::now();
    let result = execute(command, config).await;
    if benchmark {
        eprintln!("Elapsed: {:.3}s", started.elapsed().as_secs_f64());
    }
    result
}

async fn execute(command: &Command, config: &Config) -> Result<()> {
    match command {
        Command::Menu { who, format } => menu(config, who, *format),
        Command::Navigation {
            kind,
            who,
            active,
            format,
        } => {
            let state = AppState::new(config.clone())?;
            let user = state.user(who.user.as_deref().unwrap_or(ANONYMOUS), &who.groups);
            let mut navigation = state.navigation(*kind, &user);
            if let Some(url) = active
                && !navigation.activate_url(&NavUrl::from_path(url))
            {
                warn!(url = %url, "no navigation item links to the active URL");
            }

            match format {
                OutputFormat::Tree => print_navigation(&navigation, 0),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&navigation)?),
                OutputFormat::Html => println!(
                    "{}",
                    state
                        .renderers()
                        .render_navigation(&navigation, &RenderContext::default())
                ),
            }
            Ok(())
        }
        Command::Module { action } => module(config, action),
        Command::Migration { action } => migration(config, action).await,
        Command::Daemon { .. } => bail!("the daemon cannot run in watch mode"),
    }
}

fn menu(config: &Config, who: &UserArgs, format: OutputFormat) -> Result<()> {
    let state = AppState::new(config.clone())?;
    let user = who.user.as_deref().map(|name| state.user(name, &who.groups));
    let menu = state.menu(user.as_ref());

    match format {
        OutputFormat::Tree => {
            if !menu.has_sub_menus() {
                println!("No menu entries.");
            }
            for node in menu.walk() {
                let indent = "  ".repeat(node.depth);
                let url = node
                    .menu
                    .url()
                    .map(|u| format!(" -> {u}"))
                    .unwrap_or_default();
                println!(
                    "{indent}{} ({}){url}",
                    node.menu.title(),
                    node.menu.priority()
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&menu)?),
        OutputFormat::Html => {
            let mut html = String::new();
            menu_html(&menu, &mut Vec::new(), &mut html);
            println!("{html}");
        }
    }
    Ok(())
}

fn menu_html<'a>(menu: &'a Menu, path: &mut Vec<&'a str>, out: &mut String) {
    if !menu.has_sub_menus() {
        return;
    }
    out.push_str("<ul class=\"menu\">");
    for sub in menu.sub_menus() {
        path.push(sub.id());
        out.push_str(&format!("<li id=\"{}\">", Menu::unique_id(path.as_slice())));
        if let Some(icon) = sub.icon() {
            out.push_str(&format!("<i class=\"icon-{}\"></i>", html_escape(icon)));
        }
        let title = html_escape(sub.title());
        match sub.url() {
            Some(url) => out.push_str(&format!(
                "<a href=\"{}\">{title}</a>",
                html_escape(&url.href(""))
            )),
            None => out.push_str(&format!("<span>{title}</span>")),
        }
        menu_html(sub, path, out);
        out.push_str("</li>");
        path.pop();
    }
    out.push_str("</ul>");
}

fn print_navigation(navigation: &Navigation, depth: usize) {
    if depth == 0 && navigation.is_empty() {
        println!("No navigation items.");
    }
    for item in navigation {
        let indent = "  ".repeat(depth);
        let marker = if item.is_active() { "*" } else { " " };
        let url = item
            .full_url()
            .map(|u| format!(" -> {u}"))
            .unwrap_or_default();
        println!(
            "{marker} {indent}{} [{}] ({}){url}",
            item.label(),
            item.name(),
            item.priority()
        );
        print_navigation(item.children(), depth + 1);
    }
}

fn module(config: &Config, action: &ModuleCommand) -> Result<()> {
    let mut manager = ModuleManager::new(&config.config_dir, config.module_paths.clone());

    match action {
        ModuleCommand::List => {
            if let Err(e) = manager.load_enabled_modules() {
                warn!(error = %e, "enabled modules could not be loaded");
            }

            let mut names: Vec<String> = manager
                .list_installed()
                .into_iter()
                .chain(manager.list_enabled())
                .map(str::to_string)
                .collect();
            names.sort();
            names.dedup();

            if names.is_empty() {
                println!("No modules installed.");
                return Ok(());
            }

            println!("{:<24} {:<10} {:<10} Description", "Module", "Version", "Status");
            for name in &names {
                let status = if manager.has_loaded(name) {
                    "loaded"
                } else if manager.has_enabled(name) {
                    "enabled"
                } else {
                    "installed"
                };
                let (version, description) = match manager.module_info(name) {
                    Ok(manifest) => (manifest.version, manifest.description),
                    Err(e) => ("?".to_string(), e.to_string()),
                };
                println!("{name:<24} {version:<10} {status:<10} {description}");
            }
        }
        ModuleCommand::Info { name } => {
            let manifest = manager.module_info(name)?;
            println!("Name:         {}", manifest.name);
            println!("Version:      {}", manifest.version);
            println!("Description:  {}", manifest.description);
            if manifest.dependencies.is_empty() {
                println!("Dependencies: none");
            } else {
                println!("Dependencies: {}", manifest.dependencies.join(", "));
            }
            if let Some(dir) = manager.module_dir(name) {
                println!("Directory:    {}", dir.display());
            }
            println!("Enabled:      {}", if manager.has_enabled(name) { "yes" } else { "no" });
        }
        ModuleCommand::Enable { name } => {
            manager.enable_module(name)?;
            println!("Module {name} enabled.");
        }
        ModuleCommand::Disable { name } => {
            manager.disable_module(name)?;
            println!("Module {name} disabled.");
        }
    }
    Ok(())
}

async fn migration(config: &Config, action: &MigrationCommand) -> Result<()> {
    let state = AppState::new(config.clone())?;
    let pool = state
        .db()
        .context("DATABASE_URL is not set, migrations are unavailable")?;
    if !db::check_health(pool).await {
        bail!("database is not reachable");
    }

    let mut manager = state.migrations().await;

    match action {
        MigrationCommand::List { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(&manager.summary())?);
            } else {
                print_migrations(&manager);
            }
        }
        MigrationCommand::Apply { module } => {
            let applied = match module {
                Some(module) => manager.apply_by_name(module).await?,
                None => {
                    if !manager.has_pending_migrations() {
                        println!("No pending migrations.");
                        return Ok(());
                    }
                    manager.apply_all().await
                }
            };
            if !applied {
                bail!("migrations failed, see the log for details");
            }
            info!("migrations applied");
            println!("Migrations applied.");
        }
    }
    Ok(())
}

fn print_migrations(manager: &MigrationManager) {
    if !manager.has_pending_migrations() {
        println!("No pending migrations.");
        return;
    }

    let summary = manager.summary();
    print_hook_summaries("System", &summary.system);
    print_hook_summaries("Modules", &summary.modules);

    let privileges = manager.required_database_privileges();
    if !privileges.is_empty() {
        println!("Required database privileges: {}", privileges.join(", "));
    }
}

fn print_hook_summaries(heading: &str, hooks: &[HookSummary]) {
    if hooks.is_empty() {
        return;
    }
    println!("{heading}");
    println!("{}", "=".repeat(heading.len()));
    for hook in hooks {
        println!("{} ({}), current version {}", hook.name, hook.module, hook.migrated_version);
        for step in &hook.migrations {
            println!(
                "  {:<12} {}",
                step.version,
                step.description.as_deref().unwrap_or("-")
            );
            println!("  {:<12} {}", "", step.path);
            if let Some(error) = &step.error {
                println!("  {:<12} last error: {error}", "");
            }
        }
    }
    println!();
}

async fn daemon(config: Config, interval: Duration) -> Result<()> {
    let state = AppState::new(config)?;
    let mut daemon = Daemon::new();

    if state.db().is_some() {
        daemon.add_job(MigrationWatchJob::new(state.migrations().await, interval));
    } else {
        warn!("DATABASE_URL is not set, not watching for migrations");
    }

    if daemon.job_count() == 0 {
        warn!("no daemon jobs configured");
    }
    daemon.run().await
}
