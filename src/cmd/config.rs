//! Configuration view and validation commands: `kanban config`.

use anyhow::{Context, Result};

use kanban::config::{DEFAULT_CONFIG_FILE, KanbanConfig};

use crate::{Cli, ConfigCommands};
use super::resolve_config;

pub fn cmd_config(cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            let config = resolve_config(cli)?;
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{}", rendered.trim_end());
        }
        Some(ConfigCommands::Validate) => {
            let config = resolve_config(cli)?;
            let problems = config.validate();
            if problems.is_empty() {
                println!("Configuration is valid.");
            } else {
                for problem in &problems {
                    println!("warning: {}", problem);
                }
                anyhow::bail!("{} configuration problem(s) found", problems.len());
            }
        }
        Some(ConfigCommands::Init) => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            let path = cwd.join(DEFAULT_CONFIG_FILE);
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            KanbanConfig::default().save(&path)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}
