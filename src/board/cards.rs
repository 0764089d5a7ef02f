use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use kanban_common::requests::UpdateCardRequest;
use kanban_common::{Card, CardMatch, DueWindow, Label, Member};

use super::db::{BoardDb, fetch_label, fetch_list, fetch_member, map_label, map_member};
use super::positions::{self, Scope};
use crate::errors::{BoardError, BoardResult, Entity};

pub(crate) const CARD_COLUMNS: &str =
    "id, list_id, title, description, due_date, archived, position, created_at, updated_at";

/// Criteria for `filter_cards`. Empty id sets match every card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFilter {
    pub label_ids: Vec<i64>,
    pub member_ids: Vec<i64>,
    pub due: Option<DueWindow>,
}

impl CardFilter {
    fn matches(&self, card: &Card, labels: &[Label], members: &[Member], now: DateTime<Utc>) -> bool {
        let label_ok =
            self.label_ids.is_empty() || labels.iter().any(|l| self.label_ids.contains(&l.id));
        let member_ok =
            self.member_ids.is_empty() || members.iter().any(|m| self.member_ids.contains(&m.id));
        let due_ok = match self.due {
            None => true,
            Some(window) => card.due_date.is_some_and(|due| window.contains(due, now)),
        };
        label_ok && member_ok && due_ok
    }
}

pub(crate) fn validate_title(title: &str) -> BoardResult<()> {
    if title.trim().is_empty() {
        return Err(BoardError::invalid("title must not be empty"));
    }
    Ok(())
}

impl BoardDb {
    // ── Cards ─────────────────────────────────────────────────────────

    /// Append a new card at the end of the list's active cards.
    pub fn create_card(&mut self, list_id: i64, title: &str, description: Option<&str>) -> BoardResult<Card> {
        validate_title(title)?;
        let tx = self.write_tx()?;
        let scope = Scope::ListCards(list_id);
        positions::ensure_parent(&tx, scope)?;
        let position = positions::next_position(&tx, scope)?;
        tx.execute(
            "INSERT INTO cards (list_id, title, description, position) VALUES (?1, ?2, ?3, ?4)",
            params![list_id, title, description.unwrap_or_default(), position],
        )
        .context("Failed to insert card")?;
        let id = tx.last_insert_rowid();
        tx.commit().context("Failed to commit card insert")?;
        debug!(list_id, card_id = id, position, "Created card");
        self.get_card(id)?
            .ok_or_else(|| BoardError::not_found(Entity::Card, id))
    }

    pub fn get_card(&self, id: i64) -> BoardResult<Option<Card>> {
        fetch_card(&self.conn, id)
    }

    /// Apply a partial update. Archiving drops the card out of its list's
    /// sequence and renumbers the rest; unarchiving appends it at the end.
    pub fn update_card(&mut self, id: i64, req: &UpdateCardRequest) -> BoardResult<Card> {
        if let Some(title) = &req.title {
            validate_title(title)?;
        }
        let tx = self.write_tx()?;
        let card = fetch_card(&tx, id)?.ok_or_else(|| BoardError::not_found(Entity::Card, id))?;
        let scope = Scope::ListCards(card.list_id);

        let title = req.title.clone().unwrap_or(card.title);
        let description = req.description.clone().unwrap_or(card.description);
        let due_date = match req.due_date {
            Some(due) => due,
            None => card.due_date,
        };
        let archived = req.archived.unwrap_or(card.archived);

        let position = if card.archived && !archived {
            positions::next_position(&tx, scope)?
        } else {
            card.position
        };

        tx.execute(
            "UPDATE cards SET title = ?1, description = ?2, due_date = ?3, archived = ?4,
                    position = ?5, updated_at = datetime('now')
             WHERE id = ?6",
            params![title, description, due_date, archived, position, id],
        )
        .context("Failed to update card")?;

        if !card.archived && archived {
            positions::compact(&tx, scope)?;
            debug!(card_id = id, list_id = card.list_id, "Archived card");
        } else if card.archived && !archived {
            debug!(card_id = id, list_id = card.list_id, position, "Restored card");
        }

        tx.commit().context("Failed to commit card update")?;
        self.get_card(id)?
            .ok_or_else(|| BoardError::not_found(Entity::Card, id))
    }

    /// Delete a card and close the gap it leaves in its list.
    pub fn delete_card(&mut self, id: i64) -> BoardResult<Card> {
        let tx = self.write_tx()?;
        let card = fetch_card(&tx, id)?.ok_or_else(|| BoardError::not_found(Entity::Card, id))?;
        tx.execute("DELETE FROM cards WHERE id = ?1", params![id])
            .context("Failed to delete card")?;
        positions::compact(&tx, Scope::ListCards(card.list_id))?;
        tx.commit().context("Failed to commit card delete")?;
        debug!(card_id = id, list_id = card.list_id, "Deleted card");
        Ok(card)
    }

    // ── Labels & members on cards ─────────────────────────────────────

    /// Attach a label. Attaching one that is already present is a no-op.
    pub fn add_card_label(&mut self, card_id: i64, label_id: i64) -> BoardResult<Vec<Label>> {
        require_card(&self.conn, card_id)?;
        if fetch_label(&self.conn, label_id)?.is_none() {
            return Err(BoardError::not_found(Entity::Label, label_id));
        }
        self.conn
            .execute(
                "INSERT OR IGNORE INTO card_labels (card_id, label_id) VALUES (?1, ?2)",
                params![card_id, label_id],
            )
            .context("Failed to attach label")?;
        card_labels(&self.conn, card_id)
    }

    pub fn remove_card_label(&mut self, card_id: i64, label_id: i64) -> BoardResult<Vec<Label>> {
        require_card(&self.conn, card_id)?;
        let count = self
            .conn
            .execute(
                "DELETE FROM card_labels WHERE card_id = ?1 AND label_id = ?2",
                params![card_id, label_id],
            )
            .context("Failed to detach label")?;
        if count == 0 {
            return Err(BoardError::not_found(Entity::Label, label_id));
        }
        card_labels(&self.conn, card_id)
    }

    /// Assign a member. Assigning one that is already present is a no-op.
    pub fn add_card_member(&mut self, card_id: i64, member_id: i64) -> BoardResult<Vec<Member>> {
        require_card(&self.conn, card_id)?;
        if fetch_member(&self.conn, member_id)?.is_none() {
            return Err(BoardError::not_found(Entity::Member, member_id));
        }
        self.conn
            .execute(
                "INSERT OR IGNORE INTO card_members (card_id, member_id) VALUES (?1, ?2)",
                params![card_id, member_id],
            )
            .context("Failed to assign member")?;
        card_members(&self.conn, card_id)
    }

    pub fn remove_card_member(&mut self, card_id: i64, member_id: i64) -> BoardResult<Vec<Member>> {
        require_card(&self.conn, card_id)?;
        let count = self
            .conn
            .execute(
                "DELETE FROM card_members WHERE card_id = ?1 AND member_id = ?2",
                params![card_id, member_id],
            )
            .context("Failed to unassign member")?;
        if count == 0 {
            return Err(BoardError::not_found(Entity::Member, member_id));
        }
        card_members(&self.conn, card_id)
    }

    // ── Search & filter ───────────────────────────────────────────────

    /// Non-archived cards whose title contains `query`, case-insensitively.
    pub fn search_cards(&self, query: &str) -> BoardResult<Vec<CardMatch>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(BoardError::invalid("search query must not be empty"));
        }
        let needle = query.to_lowercase();
        let mut matches = Vec::new();
        for card in self.active_cards()? {
            if card.title.to_lowercase().contains(&needle) {
                matches.push(self.card_match(card)?);
            }
        }
        debug!(query, count = matches.len(), "Searched cards");
        Ok(matches)
    }

    /// Non-archived cards matching every populated criterion of `filter`.
    pub fn filter_cards(&self, filter: &CardFilter, now: DateTime<Utc>) -> BoardResult<Vec<CardMatch>> {
        let mut matches = Vec::new();
        for card in self.active_cards()? {
            let labels = card_labels(&self.conn, card.id)?;
            let members = card_members(&self.conn, card.id)?;
            if filter.matches(&card, &labels, &members, now) {
                let list = fetch_list(&self.conn, card.list_id)?
                    .ok_or_else(|| BoardError::not_found(Entity::List, card.list_id))?;
                matches.push(CardMatch {
                    card,
                    list,
                    labels,
                    members,
                });
            }
        }
        debug!(count = matches.len(), "Filtered cards");
        Ok(matches)
    }

    /// Every non-archived card in board, list and card order.
    fn active_cards(&self) -> BoardResult<Vec<Card>> {
        let sql = format!(
            "SELECT {} FROM cards c JOIN lists l ON l.id = c.list_id
             WHERE c.archived = 0
             ORDER BY l.board_id, l.position, l.id, c.position, c.id",
            prefixed("c", CARD_COLUMNS)
        );
        let mut stmt = self.conn.prepare(&sql).context("Failed to prepare active_cards")?;
        let rows = stmt.query_map([], map_card).context("Failed to query cards")?;
        let mut cards = Vec::new();
        for row in rows {
            cards.push(row.context("Failed to read card row")?);
        }
        Ok(cards)
    }

    fn card_match(&self, card: Card) -> BoardResult<CardMatch> {
        let list = fetch_list(&self.conn, card.list_id)?
            .ok_or_else(|| BoardError::not_found(Entity::List, card.list_id))?;
        let labels = card_labels(&self.conn, card.id)?;
        let members = card_members(&self.conn, card.id)?;
        Ok(CardMatch {
            card,
            list,
            labels,
            members,
        })
    }
}

// ── Row helpers ───────────────────────────────────────────────────────

pub(crate) fn map_card(row: &Row<'_>) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        list_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        due_date: row.get(4)?,
        archived: row.get(5)?,
        position: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

/// Qualify a column list with a table alias.
pub(crate) fn prefixed(alias: &str, columns: &str) -> String {
    columns
        .split(", ")
        .map(|c| format!("{}.{}", alias, c))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn fetch_card(conn: &Connection, id: i64) -> BoardResult<Option<Card>> {
    Ok(conn
        .query_row(
            &format!("SELECT {} FROM cards WHERE id = ?1", CARD_COLUMNS),
            params![id],
            map_card,
        )
        .optional()
        .context("Failed to query card")?)
}

fn require_card(conn: &Connection, id: i64) -> BoardResult<Card> {
    fetch_card(conn, id)?.ok_or_else(|| BoardError::not_found(Entity::Card, id))
}

pub(crate) fn card_labels(conn: &Connection, card_id: i64) -> BoardResult<Vec<Label>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT lb.id, lb.name, lb.color FROM labels lb
             JOIN card_labels cl ON cl.label_id = lb.id
             WHERE cl.card_id = ?1 ORDER BY lb.name, lb.id",
        )
        .context("Failed to prepare card_labels")?;
    let rows = stmt
        .query_map(params![card_id], map_label)
        .context("Failed to query card labels")?;
    let mut labels = Vec::new();
    for row in rows {
        labels.push(row.context("Failed to read label row")?);
    }
    Ok(labels)
}

pub(crate) fn card_members(conn: &Connection, card_id: i64) -> BoardResult<Vec<Member>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT m.id, m.name, m.email, m.avatar FROM members m
             JOIN card_members cm ON cm.member_id = m.id
             WHERE cm.card_id = ?1 ORDER BY m.name, m.id",
        )
        .context("Failed to prepare card_members")?;
    let rows = stmt
        .query_map(params![card_id], map_member)
        .context("Failed to query card members")?;
    let mut members = Vec::new();
    for row in rows {
        members.push(row.context("Failed to read member row")?);
    }
    Ok(members)
}
