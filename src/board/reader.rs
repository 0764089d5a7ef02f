//! Board aggregate reader.
//!
//! Loads a board and everything under it with one query per level inside a
//! single read transaction, then stitches the levels together in memory.

use std::collections::HashMap;

use anyhow::Context;
use rusqlite::{Connection, params};

use kanban_common::{BoardView, CardView, ChecklistItem, ChecklistView, Label, ListView, Member};

use super::cards::{CARD_COLUMNS, map_card, prefixed};
use super::checklists::{map_checklist, map_item};
use super::db::{BoardDb, LIST_COLUMNS, fetch_board, map_list};
use crate::errors::{BoardError, BoardResult, Entity};

impl BoardDb {
    /// The full board: lists by position, each list's non-archived cards by
    /// position, and each card's labels, members, checklists and items.
    pub fn get_board_view(&self, board_id: i64) -> BoardResult<BoardView> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin read transaction")?;

        let board =
            fetch_board(&tx, board_id)?.ok_or_else(|| BoardError::not_found(Entity::Board, board_id))?;

        let mut labels = load_card_labels(&tx, board_id)?;
        let mut members = load_card_members(&tx, board_id)?;
        let mut items = load_items(&tx, board_id)?;
        let mut checklists = load_checklists(&tx, board_id, &mut items)?;
        let mut cards = load_cards(&tx, board_id, &mut labels, &mut members, &mut checklists)?;

        let sql = format!(
            "SELECT {} FROM lists WHERE board_id = ?1 ORDER BY position, id",
            LIST_COLUMNS
        );
        let mut stmt = tx.prepare(&sql).context("Failed to prepare lists query")?;
        let rows = stmt
            .query_map(params![board_id], map_list)
            .context("Failed to query lists")?;
        let mut lists = Vec::new();
        for row in rows {
            let list = row.context("Failed to read list row")?;
            let cards = cards.remove(&list.id).unwrap_or_default();
            lists.push(ListView { list, cards });
        }
        drop(stmt);
        tx.commit().context("Failed to end read transaction")?;

        Ok(BoardView { board, lists })
    }
}

// Every loader restricts to rows under `board_id` and returns them grouped by
// parent id, already in display order.

fn load_cards(
    conn: &Connection,
    board_id: i64,
    labels: &mut HashMap<i64, Vec<Label>>,
    members: &mut HashMap<i64, Vec<Member>>,
    checklists: &mut HashMap<i64, Vec<ChecklistView>>,
) -> BoardResult<HashMap<i64, Vec<CardView>>> {
    let sql = format!(
        "SELECT {} FROM cards c JOIN lists l ON l.id = c.list_id
         WHERE l.board_id = ?1 AND c.archived = 0
         ORDER BY c.position, c.id",
        prefixed("c", CARD_COLUMNS)
    );
    let mut stmt = conn.prepare(&sql).context("Failed to prepare cards query")?;
    let rows = stmt
        .query_map(params![board_id], map_card)
        .context("Failed to query cards")?;
    let mut grouped: HashMap<i64, Vec<CardView>> = HashMap::new();
    for row in rows {
        let card = row.context("Failed to read card row")?;
        let view = CardView {
            labels: labels.remove(&card.id).unwrap_or_default(),
            members: members.remove(&card.id).unwrap_or_default(),
            checklists: checklists.remove(&card.id).unwrap_or_default(),
            card,
        };
        grouped.entry(view.card.list_id).or_default().push(view);
    }
    Ok(grouped)
}

fn load_checklists(
    conn: &Connection,
    board_id: i64,
    items: &mut HashMap<i64, Vec<ChecklistItem>>,
) -> BoardResult<HashMap<i64, Vec<ChecklistView>>> {
    let mut stmt = conn
        .prepare(
            "SELECT ch.id, ch.card_id, ch.title, ch.position FROM checklists ch
             JOIN cards c ON c.id = ch.card_id
             JOIN lists l ON l.id = c.list_id
             WHERE l.board_id = ?1
             ORDER BY ch.position, ch.id",
        )
        .context("Failed to prepare checklists query")?;
    let rows = stmt
        .query_map(params![board_id], map_checklist)
        .context("Failed to query checklists")?;
    let mut grouped: HashMap<i64, Vec<ChecklistView>> = HashMap::new();
    for row in rows {
        let checklist = row.context("Failed to read checklist row")?;
        let view = ChecklistView {
            items: items.remove(&checklist.id).unwrap_or_default(),
            checklist,
        };
        grouped.entry(view.checklist.card_id).or_default().push(view);
    }
    Ok(grouped)
}

fn load_items(conn: &Connection, board_id: i64) -> BoardResult<HashMap<i64, Vec<ChecklistItem>>> {
    let mut stmt = conn
        .prepare(
            "SELECT i.id, i.checklist_id, i.title, i.completed, i.position FROM checklist_items i
             JOIN checklists ch ON ch.id = i.checklist_id
             JOIN cards c ON c.id = ch.card_id
             JOIN lists l ON l.id = c.list_id
             WHERE l.board_id = ?1
             ORDER BY i.position, i.id",
        )
        .context("Failed to prepare items query")?;
    let rows = stmt
        .query_map(params![board_id], map_item)
        .context("Failed to query items")?;
    let mut grouped: HashMap<i64, Vec<ChecklistItem>> = HashMap::new();
    for row in rows {
        let item = row.context("Failed to read item row")?;
        grouped.entry(item.checklist_id).or_default().push(item);
    }
    Ok(grouped)
}

fn load_card_labels(conn: &Connection, board_id: i64) -> BoardResult<HashMap<i64, Vec<Label>>> {
    let mut stmt = conn
        .prepare(
            "SELECT cl.card_id, lb.id, lb.name, lb.color FROM card_labels cl
             JOIN labels lb ON lb.id = cl.label_id
             JOIN cards c ON c.id = cl.card_id
             JOIN lists l ON l.id = c.list_id
             WHERE l.board_id = ?1
             ORDER BY lb.name, lb.id",
        )
        .context("Failed to prepare labels query")?;
    let rows = stmt
        .query_map(params![board_id], |row| {
            let card_id: i64 = row.get(0)?;
            let label = Label {
                id: row.get(1)?,
                name: row.get(2)?,
                color: row.get(3)?,
            };
            Ok((card_id, label))
        })
        .context("Failed to query labels")?;
    let mut grouped: HashMap<i64, Vec<Label>> = HashMap::new();
    for row in rows {
        let (card_id, label) = row.context("Failed to read label row")?;
        grouped.entry(card_id).or_default().push(label);
    }
    Ok(grouped)
}

fn load_card_members(conn: &Connection, board_id: i64) -> BoardResult<HashMap<i64, Vec<Member>>> {
    let mut stmt = conn
        .prepare(
            "SELECT cm.card_id, m.id, m.name, m.email, m.avatar FROM card_members cm
             JOIN members m ON m.id = cm.member_id
             JOIN cards c ON c.id = cm.card_id
             JOIN lists l ON l.id = c.list_id
             WHERE l.board_id = ?1
             ORDER BY m.name, m.id",
        )
        .context("Failed to prepare members query")?;
    let rows = stmt
        .query_map(params![board_id], |row| {
            let card_id: i64 = row.get(0)?;
            let member = Member {
                id: row.get(1)?,
                name: row.get(2)?,
                email: row.get(3)?,
                avatar: row.get(4)?,
            };
            Ok((card_id, member))
        })
        .context("Failed to query members")?;
    let mut grouped: HashMap<i64, Vec<Member>> = HashMap::new();
    for row in rows {
        let (card_id, member) = row.context("Failed to read member row")?;
        grouped.entry(card_id).or_default().push(member);
    }
    Ok(grouped)
}
