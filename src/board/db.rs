use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use tracing::{debug, info};

use kanban_common::{Board, Label, List, Member};

use super::positions::{self, Scope};
use crate::errors::{BoardError, BoardResult, Entity};

/// Async-safe handle to the board database.
///
/// Wraps `BoardDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads. The mutex also makes this process a single
/// writer: two reorders of the same parent can never interleave.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<BoardDb>>,
}

impl DbHandle {
    pub fn new(db: BoardDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with exclusive access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> BoardResult<R>
    where
        F: FnOnce(&mut BoardDb) -> BoardResult<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = db.lock().map_err(|_| BoardError::LockPoisoned)?;
            f(&mut guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. Only for startup, seeding
    /// and tests; never from a hot async path.
    pub fn lock_sync(&self) -> BoardResult<std::sync::MutexGuard<'_, BoardDb>> {
        self.inner.lock().map_err(|_| BoardError::LockPoisoned)
    }
}

pub struct BoardDb {
    pub(crate) conn: Connection,
}

impl BoardDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> BoardResult<Self> {
        Self::open(path, Duration::from_millis(5_000))
    }

    /// Open with an explicit busy timeout. Another process holding the write
    /// lock makes `BEGIN IMMEDIATE` wait up to this long before failing.
    pub fn open(path: &Path, busy_timeout: Duration) -> BoardResult<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        conn.busy_timeout(busy_timeout)
            .context("Failed to set busy timeout")?;
        let db = Self { conn };
        db.init()?;
        info!(path = %path.display(), "Board database ready");
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> BoardResult<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> BoardResult<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS boards (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS lists (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    board_id INTEGER NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    position INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS cards (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    list_id INTEGER NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    due_date TEXT,
                    archived INTEGER NOT NULL DEFAULT 0,
                    position INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS labels (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    color TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS members (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    email TEXT NOT NULL,
                    avatar TEXT
                );

                CREATE TABLE IF NOT EXISTS card_labels (
                    card_id INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
                    label_id INTEGER NOT NULL REFERENCES labels(id) ON DELETE CASCADE,
                    PRIMARY KEY (card_id, label_id)
                );

                CREATE TABLE IF NOT EXISTS card_members (
                    card_id INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
                    member_id INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
                    PRIMARY KEY (card_id, member_id)
                );

                CREATE TABLE IF NOT EXISTS checklists (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    card_id INTEGER NOT NULL REFERENCES cards(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    position INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS checklist_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    checklist_id INTEGER NOT NULL REFERENCES checklists(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    completed INTEGER NOT NULL DEFAULT 0,
                    position INTEGER NOT NULL DEFAULT 0
                );

                CREATE INDEX IF NOT EXISTS idx_lists_board ON lists(board_id, position);
                CREATE INDEX IF NOT EXISTS idx_cards_list ON cards(list_id, archived, position);
                CREATE INDEX IF NOT EXISTS idx_checklists_card ON checklists(card_id, position);
                CREATE INDEX IF NOT EXISTS idx_items_checklist ON checklist_items(checklist_id, position);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    /// Begin a write transaction that takes the SQLite write lock up front,
    /// so a reorder never reads positions another writer is about to change.
    pub(crate) fn write_tx(&mut self) -> BoardResult<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to begin write transaction")?)
    }

    // ── Boards ────────────────────────────────────────────────────────

    pub fn create_board(&mut self, title: &str) -> BoardResult<Board> {
        self.conn
            .execute("INSERT INTO boards (title) VALUES (?1)", params![title])
            .context("Failed to insert board")?;
        let id = self.conn.last_insert_rowid();
        debug!(board_id = id, "Created board");
        self.get_board(id)?
            .ok_or_else(|| BoardError::not_found(Entity::Board, id))
    }

    pub fn list_boards(&self) -> BoardResult<Vec<Board>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, title, created_at FROM boards ORDER BY id")
            .context("Failed to prepare list_boards")?;
        let rows = stmt
            .query_map([], map_board)
            .context("Failed to query boards")?;
        let mut boards = Vec::new();
        for row in rows {
            boards.push(row.context("Failed to read board row")?);
        }
        Ok(boards)
    }

    pub fn get_board(&self, id: i64) -> BoardResult<Option<Board>> {
        fetch_board(&self.conn, id)
    }

    // ── Lists ─────────────────────────────────────────────────────────

    /// Append a new list at the end of the board.
    pub fn create_list(&mut self, board_id: i64, title: &str) -> BoardResult<List> {
        let tx = self.write_tx()?;
        if fetch_board(&tx, board_id)?.is_none() {
            return Err(BoardError::not_found(Entity::Board, board_id));
        }
        let position = positions::next_position(&tx, Scope::BoardLists(board_id))?;
        tx.execute(
            "INSERT INTO lists (board_id, title, position) VALUES (?1, ?2, ?3)",
            params![board_id, title, position],
        )
        .context("Failed to insert list")?;
        let id = tx.last_insert_rowid();
        tx.commit().context("Failed to commit list insert")?;
        debug!(board_id, list_id = id, position, "Created list");
        self.get_list(id)?
            .ok_or_else(|| BoardError::not_found(Entity::List, id))
    }

    pub fn get_list(&self, id: i64) -> BoardResult<Option<List>> {
        fetch_list(&self.conn, id)
    }

    pub fn update_list(&mut self, id: i64, title: &str) -> BoardResult<List> {
        let count = self
            .conn
            .execute(
                "UPDATE lists SET title = ?1 WHERE id = ?2",
                params![title, id],
            )
            .context("Failed to update list")?;
        if count == 0 {
            return Err(BoardError::not_found(Entity::List, id));
        }
        self.get_list(id)?
            .ok_or_else(|| BoardError::not_found(Entity::List, id))
    }

    /// Delete a list (its cards cascade) and close the gap in the board.
    pub fn delete_list(&mut self, id: i64) -> BoardResult<List> {
        let tx = self.write_tx()?;
        let list = fetch_list(&tx, id)?.ok_or_else(|| BoardError::not_found(Entity::List, id))?;
        tx.execute("DELETE FROM lists WHERE id = ?1", params![id])
            .context("Failed to delete list")?;
        positions::compact(&tx, Scope::BoardLists(list.board_id))?;
        tx.commit().context("Failed to commit list delete")?;
        debug!(list_id = id, board_id = list.board_id, "Deleted list");
        Ok(list)
    }

    // ── Labels & members ──────────────────────────────────────────────

    pub fn create_label(&mut self, name: &str, color: &str) -> BoardResult<Label> {
        self.conn
            .execute(
                "INSERT INTO labels (name, color) VALUES (?1, ?2)",
                params![name, color],
            )
            .context("Failed to insert label")?;
        let id = self.conn.last_insert_rowid();
        fetch_label(&self.conn, id)?.ok_or_else(|| BoardError::not_found(Entity::Label, id))
    }

    pub fn list_labels(&self) -> BoardResult<Vec<Label>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, color FROM labels ORDER BY name, id")
            .context("Failed to prepare list_labels")?;
        let rows = stmt
            .query_map([], map_label)
            .context("Failed to query labels")?;
        let mut labels = Vec::new();
        for row in rows {
            labels.push(row.context("Failed to read label row")?);
        }
        Ok(labels)
    }

    pub fn create_member(
        &mut self,
        name: &str,
        email: &str,
        avatar: Option<&str>,
    ) -> BoardResult<Member> {
        self.conn
            .execute(
                "INSERT INTO members (name, email, avatar) VALUES (?1, ?2, ?3)",
                params![name, email, avatar],
            )
            .context("Failed to insert member")?;
        let id = self.conn.last_insert_rowid();
        fetch_member(&self.conn, id)?.ok_or_else(|| BoardError::not_found(Entity::Member, id))
    }

    pub fn list_members(&self) -> BoardResult<Vec<Member>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, email, avatar FROM members ORDER BY name, id")
            .context("Failed to prepare list_members")?;
        let rows = stmt
            .query_map([], map_member)
            .context("Failed to query members")?;
        let mut members = Vec::new();
        for row in rows {
            members.push(row.context("Failed to read member row")?);
        }
        Ok(members)
    }
}

// ── Row helpers ───────────────────────────────────────────────────────
//
// Free functions over `&Connection` so they work both on the plain
// connection and inside a `Transaction` (which derefs to `Connection`).

pub(crate) const LIST_COLUMNS: &str = "id, board_id, title, position, created_at";

pub(crate) fn map_board(row: &Row<'_>) -> rusqlite::Result<Board> {
    Ok(Board {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: row.get(2)?,
    })
}

pub(crate) fn map_list(row: &Row<'_>) -> rusqlite::Result<List> {
    Ok(List {
        id: row.get(0)?,
        board_id: row.get(1)?,
        title: row.get(2)?,
        position: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(crate) fn map_label(row: &Row<'_>) -> rusqlite::Result<Label> {
    Ok(Label {
        id: row.get(0)?,
        name: row.get(1)?,
        color: row.get(2)?,
    })
}

pub(crate) fn map_member(row: &Row<'_>) -> rusqlite::Result<Member> {
    Ok(Member {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        avatar: row.get(3)?,
    })
}

pub(crate) fn fetch_board(conn: &Connection, id: i64) -> BoardResult<Option<Board>> {
    Ok(conn
        .query_row(
            "SELECT id, title, created_at FROM boards WHERE id = ?1",
            params![id],
            map_board,
        )
        .optional()
        .context("Failed to query board")?)
}

pub(crate) fn fetch_list(conn: &Connection, id: i64) -> BoardResult<Option<List>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM lists WHERE id = ?1", LIST_COLUMNS),
            params![id],
            map_list,
        )
        .optional()
        .context("Failed to query list")?)
}

pub(crate) fn fetch_label(conn: &Connection, id: i64) -> BoardResult<Option<Label>> {
    Ok(conn
        .query_row(
            "SELECT id, name, color FROM labels WHERE id = ?1",
            params![id],
            map_label,
        )
        .optional()
        .context("Failed to query label")?)
}

pub(crate) fn fetch_member(conn: &Connection, id: i64) -> BoardResult<Option<Member>> {
    Ok(conn
        .query_row(
            "SELECT id, name, email, avatar FROM members WHERE id = ?1",
            params![id],
            map_member,
        )
        .optional()
        .context("Failed to query member")?)
}

// ── Tests ─────────────────────────────────────────────────────────────
