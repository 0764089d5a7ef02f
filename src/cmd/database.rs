//! Database setup commands: `kanban init` and `kanban seed`.

use anyhow::{Context, Result};

use kanban::board::SeedOutcome;
use kanban::board::server::open_database;
use kanban::config::KanbanConfig;

pub fn cmd_init(config: &KanbanConfig) -> Result<()> {
    open_database(config)?;
    println!(
        "Board database initialized at {}",
        config.database.path.display()
    );
    Ok(())
}

pub fn cmd_seed(config: &KanbanConfig) -> Result<()> {
    let mut db = open_database(config)?;
    match db.seed_demo().context("Failed to seed demo board")? {
        SeedOutcome::Seeded { board_id } => {
            println!("Seeded demo board {}", board_id);
        }
        SeedOutcome::AlreadySeeded { board_id } => {
            println!("Database already seeded (board {})", board_id);
        }
    }
    Ok(())
}
