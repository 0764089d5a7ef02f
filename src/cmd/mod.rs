//! CLI command implementations.
//!
//! | Module     | Commands handled   |
//! |------------|--------------------|
//! | `serve`    | `Serve`            |
//! | `database` | `Init`, `Seed`     |
//! | `config`   | `Config`           |

use anyhow::{Context, Result};
use std::path::Path;

use kanban::config::KanbanConfig;

use crate::Cli;

pub mod config;
pub mod database;
pub mod serve;

pub use config::cmd_config;
pub use database::{cmd_init, cmd_seed};
pub use serve::cmd_serve;

/// Defaults, then the config file, then `.env` and the environment.
/// Command-specific flags are applied by the caller.
pub fn resolve_config(cli: &Cli) -> Result<KanbanConfig> {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        return Err(e).context("Failed to load .env file");
    }
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let mut config = KanbanConfig::load_or_default(cli.config.as_deref(), &cwd)?;
    config.apply_env()?;
    Ok(config)
}

pub fn resolve_config_with_db(cli: &Cli, db_path: Option<&Path>) -> Result<KanbanConfig> {
    let mut config = resolve_config(cli)?;
    if let Some(path) = db_path {
        config.database.path = path.to_path_buf();
    }
    Ok(config)
}
