//! Command line interface.

mod commands;

pub use commands::run;

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};

use beacon_kernel::navigation::ItemKind;

/// Beacon command line.
#[derive(Parser, Debug)]
#[command(name = "beacon", author, version, about = "Beacon monitoring frontend tools", long_about = None)]
pub struct Cli {
    /// Log everything, including trace output.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log debug output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Report how long the command took.
    #[arg(long, global = true)]
    pub benchmark: bool,

    /// Re-run the command every N seconds until interrupted.
    #[arg(
        long,
        global = true,
        value_name = "SECONDS",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "5",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub watch: Option<u64>,

    /// Print the subcommands completing the given words.
    #[arg(long, value_name = "WORDS", num_args = 0.., allow_hyphen_values = true, exclusive = true)]
    pub autocomplete: Option<Vec<String>>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Log filter implied by `--debug` and `--verbose`.
    pub fn log_level(&self) -> Option<&'static str> {
        if self.debug {
            Some("trace")
        } else if self.verbose {
            Some("debug")
        } else {
            None
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the main menu.
    Menu {
        #[command(flatten)]
        who: UserArgs,

        #[arg(long, value_enum, default_value_t = OutputFormat::Tree)]
        format: OutputFormat,
    },

    /// Show composed navigation of one kind.
    Navigation {
        /// Item kind, e.g. menu-item or host-action.
        #[arg(long = "type", value_name = "KIND", value_parser = parse_kind)]
        kind: ItemKind,

        #[command(flatten)]
        who: UserArgs,

        /// Mark the item linking to this URL and its ancestors active.
        #[arg(long, value_name = "URL")]
        active: Option<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Tree)]
        format: OutputFormat,
    },

    /// Manage modules.
    Module {
        #[command(subcommand)]
        action: ModuleCommand,
    },

    /// Inspect and apply database migrations.
    Migration {
        #[command(subcommand)]
        action: MigrationCommand,
    },

    /// Run background jobs until SIGTERM or SIGINT.
    Daemon {
        /// Seconds between checks for pending migrations.
        #[arg(long, default_value = "300", value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,
    },
}

#[derive(Subcommand, Debug)]
pub enum ModuleCommand {
    /// List installed modules and their state.
    List,

    /// Show a module's manifest.
    Info { name: String },

    /// Enable an installed module.
    Enable { name: String },

    /// Disable an enabled module.
    Disable { name: String },
}

#[derive(Subcommand, Debug)]
pub enum MigrationCommand {
    /// List pending migrations.
    List {
        #[arg(long)]
        json: bool,
    },

    /// Apply pending migrations, the application's own first.
    Apply {
        /// Only apply the migrations of this module.
        #[arg(long, value_name = "NAME")]
        module: Option<String>,
    },
}

/// The user a menu or navigation is composed for.
#[derive(Args, Debug, Clone, Default)]
pub struct UserArgs {
    #[arg(long)]
    pub user: Option<String>,

    /// Group membership of the user, repeatable.
    #[arg(long = "group", value_name = "GROUP")]
    pub groups: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Tree,
    Json,
    Html,
}

fn parse_kind(value: &str) -> Result<ItemKind, String> {
    ItemKind::from_type_name(value).ok_or_else(|| {
        let known: Vec<&str> = ItemKind::ALL.iter().map(|k| k.type_name()).collect();
        format!("unknown item type, expected one of: {}", known.join(", "))
    })
}

/// Subcommand names completing `words`.
///
/// Every word but the last selects a subcommand; the last one is the
/// prefix to complete.
pub fn complete(words: &[String]) -> Vec<String> {
    let (prefix, path) = match words.split_last() {
        Some((last, path)) => (last.as_str(), path),
        None => ("", &[][..]),
    };

    let mut command = Cli::command();
    for word in path {
        let Some(sub) = command.find_subcommand(word).cloned() else {
            return Vec::new();
        };
        command = sub;
    }

    command
        .get_subcommands()
        .map(|sub| sub.get_name())
        .filter(|name| *name != "help" && name.starts_with(prefix))
        .map(str::to_string)
        .collect()
}
