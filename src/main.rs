use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kanban::logging::{LogFormat, init_tracing};

mod cmd;

#[derive(Parser)]
#[command(name = "kanban")]
#[command(version, about = "Kanban board server with transactional card and list ordering")]
pub struct Cli {
    /// Debug-level logging (ignored when RUST_LOG is set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./kanban.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API and change feed
    Serve {
        /// Port to listen on
        #[arg(long, env = "KANBAN_PORT")]
        port: Option<u16>,

        /// Address to bind
        #[arg(long, env = "KANBAN_HOST")]
        host: Option<String>,

        /// SQLite database path
        #[arg(long, env = "KANBAN_DB_PATH")]
        db_path: Option<PathBuf>,

        /// Enable dev mode (permissive CORS for a separately served front-end)
        #[arg(long)]
        dev: bool,

        /// Seed the demo board if the database is empty
        #[arg(long)]
        seed: bool,
    },
    /// Create the database and run migrations
    Init {
        /// SQLite database path
        #[arg(long, env = "KANBAN_DB_PATH")]
        db_path: Option<PathBuf>,
    },
    /// Create the demo board, labels and members in an empty database
    Seed {
        /// SQLite database path
        #[arg(long, env = "KANBAN_DB_PATH")]
        db_path: Option<PathBuf>,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any problems
    Validate,
    /// Write a default kanban.toml to the current directory
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.verbose)?;

    match &cli.command {
        Commands::Serve {
            port,
            host,
            db_path,
            dev,
            seed,
        } => {
            let mut config = cmd::resolve_config(&cli)?;
            if let Some(port) = port {
                config.server.port = *port;
            }
            if let Some(host) = host {
                config.server.host = host.clone();
            }
            if let Some(path) = db_path {
                config.database.path = path.clone();
            }
            config.server.dev_mode |= *dev;
            config.board.seed_on_start |= *seed;
            cmd::cmd_serve(config).await?;
        }
        Commands::Init { db_path } => {
            let config = cmd::resolve_config_with_db(&cli, db_path.as_deref())?;
            cmd::cmd_init(&config)?;
        }
        Commands::Seed { db_path } => {
            let config = cmd::resolve_config_with_db(&cli, db_path.as_deref())?;
            cmd::cmd_seed(&config)?;
        }
        Commands::Config { command } => {
            cmd::cmd_config(&cli, command.clone())?;
        }
    }

    Ok(())
}
