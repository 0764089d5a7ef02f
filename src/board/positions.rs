//! Position store: per-parent dense `position` sequences in SQLite.
//!
//! Every function takes a `&Connection` so callers can run it inside the
//! transaction that owns the surrounding write.

use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::{BoardError, BoardResult, Entity};

/// One ordered collection: the parent it belongs to and the kind of child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    BoardLists(i64),
    ListCards(i64),
    CardChecklists(i64),
    ChecklistItems(i64),
}

impl Scope {
    pub fn parent_id(&self) -> i64 {
        match *self {
            Self::BoardLists(id)
            | Self::ListCards(id)
            | Self::CardChecklists(id)
            | Self::ChecklistItems(id) => id,
        }
    }

    /// Child table.
    fn table(&self) -> &'static str {
        match self {
            Self::BoardLists(_) => "lists",
            Self::ListCards(_) => "cards",
            Self::CardChecklists(_) => "checklists",
            Self::ChecklistItems(_) => "checklist_items",
        }
    }

    fn parent_column(&self) -> &'static str {
        match self {
            Self::BoardLists(_) => "board_id",
            Self::ListCards(_) => "list_id",
            Self::CardChecklists(_) => "card_id",
            Self::ChecklistItems(_) => "checklist_id",
        }
    }

    fn parent_table(&self) -> &'static str {
        match self {
            Self::BoardLists(_) => "boards",
            Self::ListCards(_) => "lists",
            Self::CardChecklists(_) => "cards",
            Self::ChecklistItems(_) => "checklists",
        }
    }

    /// Extra predicate selecting children that take part in the sequence.
    /// Archived cards keep their row but drop out of the ordering.
    fn active_filter(&self) -> &'static str {
        match self {
            Self::ListCards(_) => " AND archived = 0",
            _ => "",
        }
    }

    pub fn parent_entity(&self) -> Entity {
        match self {
            Self::BoardLists(_) => Entity::Board,
            Self::ListCards(_) => Entity::List,
            Self::CardChecklists(_) => Entity::Card,
            Self::ChecklistItems(_) => Entity::Checklist,
        }
    }

    pub fn child_entity(&self) -> Entity {
        match self {
            Self::BoardLists(_) => Entity::List,
            Self::ListCards(_) => Entity::Card,
            Self::CardChecklists(_) => Entity::Checklist,
            Self::ChecklistItems(_) => Entity::ChecklistItem,
        }
    }
}

/// Ids of the parent's active children in ascending `(position, id)` order.
pub fn active_children(conn: &Connection, scope: Scope) -> BoardResult<Vec<i64>> {
    let sql = format!(
        "SELECT id FROM {} WHERE {} = ?1{} ORDER BY position, id",
        scope.table(),
        scope.parent_column(),
        scope.active_filter()
    );
    let mut stmt = conn
        .prepare_cached(&sql)
        .context("Failed to prepare active_children")?;
    let rows = stmt
        .query_map(params![scope.parent_id()], |row| row.get::<_, i64>(0))
        .context("Failed to query active children")?;
    let mut ids = Vec::new();
    for row in rows {
        ids.push(row.context("Failed to read child id")?);
    }
    Ok(ids)
}

/// Position for a newly appended child: one past the highest active
/// position, or 0 for an empty parent.
pub fn next_position(conn: &Connection, scope: Scope) -> BoardResult<i32> {
    let sql = format!(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM {} WHERE {} = ?1{}",
        scope.table(),
        scope.parent_column(),
        scope.active_filter()
    );
    Ok(conn
        .query_row(&sql, params![scope.parent_id()], |row| row.get(0))
        .context("Failed to compute next position")?)
}

/// Write one child's position. The child must belong to the scope's parent.
pub fn set_position(conn: &Connection, scope: Scope, child_id: i64, position: i32) -> BoardResult<()> {
    let sql = format!(
        "UPDATE {} SET position = ?1 WHERE id = ?2 AND {} = ?3",
        scope.table(),
        scope.parent_column()
    );
    let count = conn
        .prepare_cached(&sql)
        .context("Failed to prepare set_position")?
        .execute(params![position, child_id, scope.parent_id()])
        .context("Failed to update position")?;
    if count == 0 {
        return Err(BoardError::not_found(scope.child_entity(), child_id));
    }
    Ok(())
}

/// Assign `position = index` to each id in order. Callers run this inside
/// their own transaction; a NotFound midway aborts the whole batch.
pub fn write_positions(conn: &Connection, scope: Scope, ordered_ids: &[i64]) -> BoardResult<()> {
    for (index, &id) in ordered_ids.iter().enumerate() {
        set_position(conn, scope, id, index as i32)?;
    }
    Ok(())
}

/// Renumber the active children `0..n-1` in their current order.
pub fn compact(conn: &Connection, scope: Scope) -> BoardResult<Vec<i64>> {
    let ids = active_children(conn, scope)?;
    write_positions(conn, scope, &ids)?;
    Ok(ids)
}

pub fn ensure_parent(conn: &Connection, scope: Scope) -> BoardResult<()> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", scope.parent_table());
    let found: Option<i64> = conn
        .query_row(&sql, params![scope.parent_id()], |row| row.get(0))
        .optional()
        .context("Failed to look up parent")?;
    match found {
        Some(_) => Ok(()),
        None => Err(BoardError::not_found(scope.parent_entity(), scope.parent_id())),
    }
}

/// Whether a row with this id exists in the scope's child table under any
/// parent (archived included).
pub fn child_exists(conn: &Connection, scope: Scope, child_id: i64) -> BoardResult<bool> {
    let sql = format!("SELECT 1 FROM {} WHERE id = ?1", scope.table());
    let found: Option<i64> = conn
        .query_row(&sql, params![child_id], |row| row.get(0))
        .optional()
        .context("Failed to look up child")?;
    Ok(found.is_some())
}

/// Active positions in sequence order, for density checks.
pub fn active_positions(conn: &Connection, scope: Scope) -> BoardResult<Vec<i32>> {
    let sql = format!(
        "SELECT position FROM {} WHERE {} = ?1{} ORDER BY position, id",
        scope.table(),
        scope.parent_column(),
        scope.active_filter()
    );
    let mut stmt = conn.prepare(&sql).context("Failed to prepare active_positions")?;
    let rows = stmt
        .query_map(params![scope.parent_id()], |row| row.get::<_, i32>(0))
        .context("Failed to query positions")?;
    let mut positions = Vec::new();
    for row in rows {
        positions.push(row.context("Failed to read position")?);
    }
    Ok(positions)
}
