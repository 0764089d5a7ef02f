use anyhow::{Context, Result};
use axum::{Json, Router, http::StatusCode, response::IntoResponse};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::api::{self, AppState, SharedState};
use super::db::{BoardDb, DbHandle};
use super::seed::SeedOutcome;
use crate::config::KanbanConfig;

/// Build the full application router: REST API, change feed and a JSON 404
/// for anything else.
pub fn build_router(state: SharedState, dev_mode: bool) -> Router {
    let mut app = api::api_router()
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    if dev_mode {
        app = app.layer(CorsLayer::permissive());
    }
    app
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Route not found"})),
    )
}

/// Open the database at the configured path, creating parent directories.
pub fn open_database(config: &KanbanConfig) -> Result<BoardDb> {
    if let Some(parent) = config.database.path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }
    BoardDb::open(&config.database.path, config.busy_timeout())
        .context("Failed to initialize board database")
}

/// Start the board server and run until Ctrl+C.
pub async fn start_server(config: KanbanConfig) -> Result<()> {
    for problem in config.validate() {
        warn!(problem = %problem, "Configuration problem");
    }

    let mut db = open_database(&config)?;
    if config.board.seed_on_start {
        match db.seed_demo().context("Failed to seed demo board")? {
            SeedOutcome::Seeded { board_id } => info!(board_id, "Seeded demo board"),
            SeedOutcome::AlreadySeeded { board_id } => {
                info!(board_id, "Skipping seed, board already present")
            }
        }
    }

    let state = AppState::new(DbHandle::new(db));
    let app = build_router(state, config.server.dev_mode);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(address = %local_addr, dev_mode = config.server.dev_mode, "Kanban server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    info!("Shutting down");
}
