//! Layered configuration for the board server.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. `kanban.toml` (or the file given with `--config`)
//! 3. Environment: `KANBAN_HOST`, `KANBAN_PORT`, `KANBAN_DB_PATH`,
//!    `KANBAN_DEV`, `KANBAN_SEED` (a `.env` file is loaded first)
//! 4. Command-line flags
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! host = "127.0.0.1"
//! port = 5000
//! dev_mode = false
//!
//! [database]
//! path = "kanban.db"
//! busy_timeout_ms = 5000
//!
//! [board]
//! seed_on_start = false
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "kanban.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KanbanConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub board: BoardSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Permissive CORS for a separately served front-end.
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// How long a writer waits on another process's lock before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("kanban.db")
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardSection {
    /// Create the demo board on startup when the database has none.
    #[serde(default)]
    pub seed_on_start: bool,
}

impl KanbanConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse kanban.toml")
    }

    /// Load an explicit file, or `kanban.toml` from `dir` if present, or
    /// fall back to defaults. An explicit path that does not exist is an error.
    pub fn load_or_default(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        match explicit {
            Some(path) => Self::load(path),
            None => {
                let path = dir.join(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Overlay `KANBAN_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay `KANBAN_*` variables read through `lookup`.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("KANBAN_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("KANBAN_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid KANBAN_PORT: {}", port))?;
        }
        if let Some(path) = lookup("KANBAN_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(dev) = lookup("KANBAN_DEV") {
            self.server.dev_mode = parse_flag("KANBAN_DEV", &dev)?;
        }
        if let Some(seed) = lookup("KANBAN_SEED") {
            self.board.seed_on_start = parse_flag("KANBAN_SEED", &seed)?;
        }
        Ok(())
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize kanban.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }

    /// Validate the configuration and return any problems found.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.server.host.trim().is_empty() {
            problems.push("server.host must not be empty".to_string());
        }
        if self.database.path.as_os_str().is_empty() {
            problems.push("database.path must not be empty".to_string());
        }
        if self.database.busy_timeout_ms == 0 {
            problems.push(
                "database.busy_timeout_ms is 0: concurrent writers will fail immediately"
                    .to_string(),
            );
        }

        problems
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("Invalid {}: {} (expected true/false)", name, other),
    }
}
