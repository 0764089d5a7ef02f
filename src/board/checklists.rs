use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use kanban_common::requests::UpdateItemRequest;
use kanban_common::{Checklist, ChecklistItem};

use super::cards::validate_title;
use super::db::BoardDb;
use super::positions::{self, Scope};
use crate::errors::{BoardError, BoardResult, Entity};

impl BoardDb {
    // ── Checklists ────────────────────────────────────────────────────

    /// Append a checklist to a card.
    pub fn add_checklist(&mut self, card_id: i64, title: &str) -> BoardResult<Checklist> {
        validate_title(title)?;
        let tx = self.write_tx()?;
        let scope = Scope::CardChecklists(card_id);
        positions::ensure_parent(&tx, scope)?;
        let position = positions::next_position(&tx, scope)?;
        tx.execute(
            "INSERT INTO checklists (card_id, title, position) VALUES (?1, ?2, ?3)",
            params![card_id, title, position],
        )
        .context("Failed to insert checklist")?;
        let id = tx.last_insert_rowid();
        tx.commit().context("Failed to commit checklist insert")?;
        debug!(card_id, checklist_id = id, position, "Added checklist");
        self.get_checklist(id)?
            .ok_or_else(|| BoardError::not_found(Entity::Checklist, id))
    }

    pub fn get_checklist(&self, id: i64) -> BoardResult<Option<Checklist>> {
        fetch_checklist(&self.conn, id)
    }

    /// Delete a checklist (its items cascade) and close the gap on the card.
    pub fn delete_checklist(&mut self, id: i64) -> BoardResult<Checklist> {
        let tx = self.write_tx()?;
        let checklist = fetch_checklist(&tx, id)?
            .ok_or_else(|| BoardError::not_found(Entity::Checklist, id))?;
        tx.execute("DELETE FROM checklists WHERE id = ?1", params![id])
            .context("Failed to delete checklist")?;
        positions::compact(&tx, Scope::CardChecklists(checklist.card_id))?;
        tx.commit().context("Failed to commit checklist delete")?;
        debug!(checklist_id = id, card_id = checklist.card_id, "Deleted checklist");
        Ok(checklist)
    }

    // ── Items ─────────────────────────────────────────────────────────

    pub fn add_item(&mut self, checklist_id: i64, title: &str) -> BoardResult<ChecklistItem> {
        validate_title(title)?;
        let tx = self.write_tx()?;
        let scope = Scope::ChecklistItems(checklist_id);
        positions::ensure_parent(&tx, scope)?;
        let position = positions::next_position(&tx, scope)?;
        tx.execute(
            "INSERT INTO checklist_items (checklist_id, title, position) VALUES (?1, ?2, ?3)",
            params![checklist_id, title, position],
        )
        .context("Failed to insert checklist item")?;
        let id = tx.last_insert_rowid();
        tx.commit().context("Failed to commit item insert")?;
        self.get_item(id)?
            .ok_or_else(|| BoardError::not_found(Entity::ChecklistItem, id))
    }

    pub fn get_item(&self, id: i64) -> BoardResult<Option<ChecklistItem>> {
        fetch_item(&self.conn, id)
    }

    /// Rename an item or toggle its completion. Position is untouched.
    pub fn update_item(&mut self, id: i64, req: &UpdateItemRequest) -> BoardResult<ChecklistItem> {
        if let Some(title) = &req.title {
            validate_title(title)?;
        }
        let item = self
            .get_item(id)?
            .ok_or_else(|| BoardError::not_found(Entity::ChecklistItem, id))?;
        let title = req.title.clone().unwrap_or(item.title);
        let completed = req.completed.unwrap_or(item.completed);
        self.conn
            .execute(
                "UPDATE checklist_items SET title = ?1, completed = ?2 WHERE id = ?3",
                params![title, completed, id],
            )
            .context("Failed to update checklist item")?;
        self.get_item(id)?
            .ok_or_else(|| BoardError::not_found(Entity::ChecklistItem, id))
    }

    pub fn delete_item(&mut self, id: i64) -> BoardResult<ChecklistItem> {
        let tx = self.write_tx()?;
        let item =
            fetch_item(&tx, id)?.ok_or_else(|| BoardError::not_found(Entity::ChecklistItem, id))?;
        tx.execute("DELETE FROM checklist_items WHERE id = ?1", params![id])
            .context("Failed to delete checklist item")?;
        positions::compact(&tx, Scope::ChecklistItems(item.checklist_id))?;
        tx.commit().context("Failed to commit item delete")?;
        Ok(item)
    }

    /// Card that owns a checklist, for change-feed events.
    pub fn checklist_card_id(&self, checklist_id: i64) -> BoardResult<i64> {
        self.get_checklist(checklist_id)?
            .map(|c| c.card_id)
            .ok_or_else(|| BoardError::not_found(Entity::Checklist, checklist_id))
    }
}

pub(crate) fn map_checklist(row: &Row<'_>) -> rusqlite::Result<Checklist> {
    Ok(Checklist {
        id: row.get(0)?,
        card_id: row.get(1)?,
        title: row.get(2)?,
        position: row.get(3)?,
    })
}

pub(crate) fn map_item(row: &Row<'_>) -> rusqlite::Result<ChecklistItem> {
    Ok(ChecklistItem {
        id: row.get(0)?,
        checklist_id: row.get(1)?,
        title: row.get(2)?,
        completed: row.get(3)?,
        position: row.get(4)?,
    })
}

fn fetch_checklist(conn: &Connection, id: i64) -> BoardResult<Option<Checklist>> {
    Ok(conn
        .query_row(
            "SELECT id, card_id, title, position FROM checklists WHERE id = ?1",
            params![id],
            map_checklist,
        )
        .optional()
        .context("Failed to query checklist")?)
}

fn fetch_item(conn: &Connection, id: i64) -> BoardResult<Option<ChecklistItem>> {
    Ok(conn
        .query_row(
            "SELECT id, checklist_id, title, completed, position FROM checklist_items WHERE id = ?1",
            params![id],
            map_item,
        )
        .optional()
        .context("Failed to query checklist item")?)
}
