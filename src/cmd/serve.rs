//! Board server command: `kanban serve`.

use anyhow::Result;

use kanban::config::KanbanConfig;

pub async fn cmd_serve(config: KanbanConfig) -> Result<()> {
    kanban::board::server::start_server(config).await
}
