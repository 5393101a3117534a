use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rigstate::commands::slot::SlotAction;
use rigstate::output::Format;

/// Env var holding the log filter directive.
const LOG_ENV: &str = "RIGSTATE_LOG";

#[derive(Parser)]
#[command(
    name = "rigstate",
    version,
    about = "Store location, routing and merge-slot coordination for multi-worker towns"
)]
struct Cli {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "json")]
    format: Format,
    /// Shorthand for --format pretty
    #[arg(long, global = true, hide = true)]
    pretty: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the store directory a worktree resolves to
    Resolve {
        /// Worktree directory (defaults to the current directory)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print the enclosing town root
    Town {
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Print the store that owns a record id
    Route {
        /// Record id, e.g. gt-abc12
        id: String,
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// Create or repair a worktree's redirect to its unit store
    Provision {
        /// Worktree directory, e.g. <town>/<unit>/crew/<name>
        worktree: PathBuf,
        /// Town root (discovered from the worktree when omitted)
        #[arg(long)]
        town: Option<PathBuf>,
    },
    /// Fetch one record through the store tool
    Show {
        id: String,
        #[arg(long)]
        dir: Option<PathBuf>,
        /// Strip inherited tool environment and pin the database
        #[arg(long)]
        isolated: bool,
    },
    /// Inspect or operate the merge slot
    Slot {
        #[command(subcommand)]
        action: SlotCommand,
        #[arg(long, global = true)]
        dir: Option<PathBuf>,
        /// Strip inherited tool environment and pin the database
        #[arg(long, global = true)]
        isolated: bool,
    },
}

#[derive(Subcommand)]
enum SlotCommand {
    /// Report the slot state
    Check,
    /// Create the slot
    Create,
    /// Create the slot unless it already exists
    Ensure,
    /// Try to take the slot without blocking
    Acquire {
        /// Holder identity (defaults to the caller identity)
        #[arg(long)]
        holder: Option<String>,
        /// Join the waiter queue when the slot is held
        #[arg(long)]
        wait: bool,
    },
    /// Give the slot back
    Release {
        /// Refuse unless this is the recorded holder
        #[arg(long)]
        holder: Option<String>,
    },
}

impl From<SlotCommand> for SlotAction {
    fn from(cmd: SlotCommand) -> Self {
        match cmd {
            SlotCommand::Check => SlotAction::Check,
            SlotCommand::Create => SlotAction::Create,
            SlotCommand::Ensure => SlotAction::Ensure,
            SlotCommand::Acquire { holder, wait } => SlotAction::Acquire { holder, wait },
            SlotCommand::Release { holder } => SlotAction::Release { holder },
        }
    }
}

fn run(cli: Cli, format: Format) -> rigstate::error::Result<()> {
    let cwd = std::env::current_dir()?;
    let or_cwd = |dir: Option<PathBuf>| dir.unwrap_or_else(|| cwd.clone());

    match cli.command {
        Commands::Resolve { dir } => rigstate::commands::resolve::run(&or_cwd(dir), format),
        Commands::Town { dir } => rigstate::commands::town::run(&or_cwd(dir), format),
        Commands::Route { id, dir } => rigstate::commands::route::run(&or_cwd(dir), &id, format),
        Commands::Provision { worktree, town } => {
            rigstate::commands::provision::run(&worktree, town.as_deref(), format)
        }
        Commands::Show { id, dir, isolated } => {
            rigstate::commands::show::run(&or_cwd(dir), &id, isolated, format)
        }
        Commands::Slot {
            action,
            dir,
            isolated,
        } => rigstate::commands::slot::run(&or_cwd(dir), action.into(), isolated, format),
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let format = if cli.pretty {
        Format::Pretty
    } else {
        cli.format
    };
    if let Err(e) = run(cli, format) {
        match format {
            Format::Json => {
                eprintln!(
                    "{}",
                    serde_json::json!({
                        "error": e.code(),
                        "message": e.to_string()
                    })
                );
            }
            _ => eprintln!("error: {e}"),
        }
        std::process::exit(1);
    }
}
