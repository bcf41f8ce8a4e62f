//! betgraph - GambleBoard projection CLI
//!
//! Replays recorded contract event feeds into the entity store and prints
//! stored entities.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// betgraph - GambleBoard event projection
#[derive(Parser, Debug)]
#[command(name = "betgraph")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "betgraph.toml")]
    config: PathBuf,

    /// Path to the entity database (overrides `store.path`)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Project a newline-delimited JSON feed into the store
    Replay {
        /// Feed file
        #[arg(short, long)]
        feed: PathBuf,
    },

    /// Print a stored entity as JSON
    #[command(subcommand)]
    Show(ShowCommands),

    /// Print the resume cursor
    Cursor,

    /// Print entity counts
    Stats,
}

#[derive(Subcommand, Debug)]
enum ShowCommands {
    /// Show a bet by ledger ID (decimal or 0x-hex)
    Bet {
        /// Bet ID
        id: String,
    },

    /// Show an event aggregate by key
    Event {
        /// Event key
        key: String,
    },

    /// Show a league by key
    League {
        /// League key
        key: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = commands::load_config(&cli.config, cli.db)?;

    match cli.command {
        Commands::Replay { feed } => commands::replay::run(&config, &feed),
        Commands::Show(show) => match show {
            ShowCommands::Bet { id } => commands::show::bet(&config, &id),
            ShowCommands::Event { key } => commands::show::event(&config, &key),
            ShowCommands::League { key } => commands::show::league(&config, &key),
        },
        Commands::Cursor => commands::show::cursor(&config),
        Commands::Stats => commands::show::stats(&config),
    }
}
