//! Reorder engine: rewrite a parent's ordering in place, or move a card
//! between lists. Each operation reads the current positions and writes every
//! affected sibling inside one `BEGIN IMMEDIATE` transaction, so a failure
//! anywhere leaves the store untouched.

use std::collections::HashSet;

use anyhow::Context;
use rusqlite::{Connection, params};
use tracing::{debug, info};

use kanban_common::Card;
use kanban_common::ordering::{insert_clamped, validate_permutation};

use super::cards::fetch_card;
use super::db::{BoardDb, fetch_list};
use super::positions::{self, Scope};
use crate::errors::{BoardError, BoardResult, Entity};

/// Largest number of children a single reorder or move may rewrite.
pub const MAX_SCOPE_SIZE: usize = 1000;

impl BoardDb {
    /// Reorder a board's lists. The board is the one the lists belong to;
    /// returns its id.
    pub fn reorder_lists(&mut self, list_ids: &[i64]) -> BoardResult<i64> {
        let Some((&first, _)) = list_ids.split_first() else {
            return Err(BoardError::invalid("list_ids must not be empty"));
        };
        check_batch_size(list_ids.len())?;

        let tx = self.write_tx()?;
        let board_id = fetch_list(&tx, first)?
            .ok_or_else(|| BoardError::not_found(Entity::List, first))?
            .board_id;
        for &id in list_ids {
            let list = fetch_list(&tx, id)?.ok_or_else(|| BoardError::not_found(Entity::List, id))?;
            if list.board_id != board_id {
                return Err(BoardError::invalid(format!(
                    "lists {} and {} belong to different boards",
                    first, id
                )));
            }
        }
        reorder_in_place(&tx, Scope::BoardLists(board_id), list_ids)?;
        tx.commit().context("Failed to commit list reorder")?;

        info!(board_id, count = list_ids.len(), "Reordered lists");
        Ok(board_id)
    }

    /// Reorder the active cards of one list.
    pub fn reorder_cards(&mut self, list_id: i64, card_ids: &[i64]) -> BoardResult<()> {
        self.reorder_scope(Scope::ListCards(list_id), card_ids)?;
        info!(list_id, count = card_ids.len(), "Reordered cards");
        Ok(())
    }

    pub fn reorder_checklists(&mut self, card_id: i64, checklist_ids: &[i64]) -> BoardResult<()> {
        self.reorder_scope(Scope::CardChecklists(card_id), checklist_ids)?;
        debug!(card_id, count = checklist_ids.len(), "Reordered checklists");
        Ok(())
    }

    pub fn reorder_items(&mut self, checklist_id: i64, item_ids: &[i64]) -> BoardResult<()> {
        self.reorder_scope(Scope::ChecklistItems(checklist_id), item_ids)?;
        debug!(checklist_id, count = item_ids.len(), "Reordered checklist items");
        Ok(())
    }

    fn reorder_scope(&mut self, scope: Scope, ids: &[i64]) -> BoardResult<()> {
        check_batch_size(ids.len())?;
        let tx = self.write_tx()?;
        reorder_in_place(&tx, scope, ids)?;
        tx.commit().context("Failed to commit reorder")?;
        Ok(())
    }

    /// Move a card to `dest_index` among the destination list's active
    /// cards, renumbering both lists.
    ///
    /// The moved card is inserted before any sibling already at
    /// `dest_index`; an index past the end appends. `source_list_id` must be
    /// the list the card is in right now, otherwise the caller's view is
    /// stale and the move is refused with `Conflict`.
    pub fn move_card(
        &mut self,
        card_id: i64,
        source_list_id: i64,
        dest_list_id: i64,
        dest_index: i64,
    ) -> BoardResult<Card> {
        if dest_index < 0 {
            return Err(BoardError::invalid(format!(
                "dest_index must be >= 0, got {}",
                dest_index
            )));
        }
        let dest_index = usize::try_from(dest_index).unwrap_or(usize::MAX);

        let tx = self.write_tx()?;
        let card = fetch_card(&tx, card_id)?
            .ok_or_else(|| BoardError::not_found(Entity::Card, card_id))?;
        if fetch_list(&tx, source_list_id)?.is_none() {
            return Err(BoardError::not_found(Entity::List, source_list_id));
        }
        if fetch_list(&tx, dest_list_id)?.is_none() {
            return Err(BoardError::not_found(Entity::List, dest_list_id));
        }
        if card.archived {
            return Err(BoardError::invalid(format!(
                "card {} is archived and cannot be moved",
                card_id
            )));
        }
        if card.list_id != source_list_id {
            return Err(BoardError::Conflict(format!(
                "card {} is in list {}, not list {}",
                card_id, card.list_id, source_list_id
            )));
        }

        let source = Scope::ListCards(source_list_id);
        let dest = Scope::ListCards(dest_list_id);

        let mut source_ids = positions::active_children(&tx, source)?;
        source_ids.retain(|&id| id != card_id);

        let position = if source_list_id == dest_list_id {
            let at = insert_clamped(&mut source_ids, dest_index, card_id);
            positions::write_positions(&tx, source, &source_ids)?;
            at
        } else {
            let mut dest_ids = positions::active_children(&tx, dest)?;
            check_batch_size(dest_ids.len() + 1)?;
            let at = insert_clamped(&mut dest_ids, dest_index, card_id);
            tx.execute(
                "UPDATE cards SET list_id = ?1, updated_at = datetime('now') WHERE id = ?2",
                params![dest_list_id, card_id],
            )
            .context("Failed to reparent card")?;
            positions::write_positions(&tx, source, &source_ids)?;
            positions::write_positions(&tx, dest, &dest_ids)?;
            at
        };

        tx.commit().context("Failed to commit card move")?;
        info!(
            card_id,
            source_list_id, dest_list_id, position, "Moved card"
        );
        self.get_card(card_id)?
            .ok_or_else(|| BoardError::not_found(Entity::Card, card_id))
    }
}

fn check_batch_size(len: usize) -> BoardResult<()> {
    if len > MAX_SCOPE_SIZE {
        return Err(BoardError::invalid(format!(
            "cannot reorder {} children at once (limit {})",
            len, MAX_SCOPE_SIZE
        )));
    }
    Ok(())
}

/// Validate `ids` against the scope's active children and write them as the
/// new order. Unknown ids are NotFound; anything that is not an exact
/// permutation of the current children is InvalidArgument.
fn reorder_in_place(conn: &Connection, scope: Scope, ids: &[i64]) -> BoardResult<()> {
    positions::ensure_parent(conn, scope)?;
    let current = positions::active_children(conn, scope)?;

    let known: HashSet<i64> = current.iter().copied().collect();
    for &id in ids {
        if !known.contains(&id) && !positions::child_exists(conn, scope, id)? {
            return Err(BoardError::not_found(scope.child_entity(), id));
        }
    }
    validate_permutation(&current, ids)?;
    positions::write_positions(conn, scope, ids)
}
