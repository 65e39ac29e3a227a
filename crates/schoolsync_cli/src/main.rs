//! SchoolSync agent CLI
//!
//! Runs the station sync agent and its maintenance commands.
//!
//! # Commands
//!
//! - `run` - Sync continuously until interrupted
//! - `once` - Run a single pull/push cycle
//! - `push-snapshot` - Seed the server with local teachers and students
//! - `show-changes` - List recent outbox entries
//! - `bootstrap` - Download and apply a server snapshot

mod commands;

use clap::{Parser, Subcommand};
use schoolsync_engine::SyncAgentConfig;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// SchoolPoints station sync agent.
#[derive(Parser)]
#[command(name = "schoolsync-agent")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the kiosk config.json
    #[arg(global = true, short, long, default_value = "config.json")]
    config: PathBuf,

    /// Station database file (overrides the config file)
    #[arg(global = true, long)]
    db_path: Option<PathBuf>,

    /// Push endpoint URL
    #[arg(global = true, long)]
    push_url: Option<String>,

    /// Pull endpoint URL
    #[arg(global = true, long)]
    pull_url: Option<String>,

    /// Snapshot endpoint URL
    #[arg(global = true, long)]
    snapshot_url: Option<String>,

    /// Seconds between cycles
    #[arg(global = true, long)]
    interval_sec: Option<u64>,

    /// Bootstrap even if the station was bootstrapped before
    #[arg(global = true, long)]
    force_bootstrap: bool,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync continuously (default)
    Run,

    /// Run a single cycle and exit
    Once,

    /// Upload local teachers and students to seed the server
    PushSnapshot,

    /// List recent outbox entries, newest first
    ShowChanges {
        /// Include entries that were already synced
        #[arg(short, long)]
        all: bool,

        /// Maximum number of entries
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Download and apply a server snapshot if the station is empty
    Bootstrap {
        /// Ignore an earlier completed bootstrap
        #[arg(long)]
        force: bool,
    },

    /// Show version information
    Version,
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    fn agent_config(&self) -> SyncAgentConfig {
        let mut config = SyncAgentConfig::load(&self.config);
        if let Some(path) = &self.db_path {
            config = config.with_db_path(path);
        }
        if let Some(url) = &self.push_url {
            config = config.with_push_url(url);
        }
        if let Some(url) = &self.pull_url {
            config = config.with_pull_url(url);
        }
        if let Some(url) = &self.snapshot_url {
            config = config.with_snapshot_url(url);
        }
        if let Some(secs) = self.interval_sec {
            config = config.with_poll_interval(Duration::from_secs(secs));
        }
        if self.force_bootstrap {
            config = config.with_force_bootstrap(true);
        }
        config
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.agent_config();
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => commands::agent::run(config),
        Commands::Once => commands::agent::once(config),
        Commands::PushSnapshot => commands::agent::push_snapshot(config),
        Commands::ShowChanges { all, limit, format } => {
            commands::show_changes::run(&config.db_path, all, limit, &format)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Bootstrap { force } => commands::agent::bootstrap(config, force),
        Commands::Version => {
            println!("schoolsync-agent v{}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}
