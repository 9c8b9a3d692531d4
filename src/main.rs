use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use corkboard::config::CorkboardConfig;

mod cmd;

#[derive(Parser)]
#[command(name = "corkboard")]
#[command(version, about = "Kanban boards with ordered lists and cards")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .corkboard/ with a default config and an empty store
    Init,
    /// Serve the HTTP API and WebSocket feed
    Serve {
        /// Port to serve on (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Enable dev mode (CORS permissive for a separately served front-end)
        #[arg(long)]
        dev: bool,
    },
    /// Manage boards
    Boards {
        #[command(subcommand)]
        command: BoardsCommands,
    },
    /// Export boards as JSON
    Export {
        /// Export a single board instead of all boards
        #[arg(short, long)]
        board: Option<Uuid>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Import boards from a JSON file
    Import {
        /// File holding one board object or an array of boards
        file: PathBuf,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum BoardsCommands {
    /// List boards
    List {
        /// Include archived boards
        #[arg(long)]
        all: bool,

        /// Print JSON metadata instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Create a board
    Create { title: String },
    /// Archive a board
    Archive { id: Uuid },
    /// Restore an archived board
    Unarchive { id: Uuid },
    /// Delete a board and everything on it
    Delete { id: Uuid },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any problems
    Validate,
    /// Initialize a default corkboard.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };

    let loaded = CorkboardConfig::load_for_project(&project_dir);
    let log = loaded
        .as_ref()
        .map(|config| config.log.clone())
        .unwrap_or_default();
    let _log_guard = corkboard::telemetry::init(&log, cli.verbose)?;

    // A broken config file must not stop `config validate` from reporting it.
    let config = match loaded {
        Ok(config) => config,
        Err(e) => match &cli.command {
            Commands::Config { command } => {
                return cmd::cmd_config(&project_dir, command.clone());
            }
            _ => return Err(e),
        },
    };

    match &cli.command {
        Commands::Init => cmd::cmd_init(&project_dir, &config).await?,
        Commands::Serve { port, host, dev } => {
            cmd::cmd_serve(&project_dir, config, *port, host.clone(), *dev).await?
        }
        Commands::Boards { command } => {
            cmd::cmd_boards(&project_dir, &config, command.clone()).await?
        }
        Commands::Export { board, output } => {
            cmd::cmd_export(&project_dir, &config, *board, output.as_deref()).await?
        }
        Commands::Import { file } => cmd::cmd_import(&project_dir, &config, file).await?,
        Commands::Config { command } => cmd::cmd_config(&project_dir, command.clone())?,
    }

    Ok(())
}
