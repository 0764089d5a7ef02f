//! Optimistic board state.
//!
//! A drag gesture is planned against the board the user currently sees. The
//! planned board becomes the speculative view and the matching server
//! request becomes the pending mutation. Exactly one mutation may be in
//! flight; it is either confirmed (speculative becomes confirmed) or rolled
//! back (speculative is discarded and the caller re-fetches).

use kanban_common::ordering::{self, OrderingError};
use kanban_common::requests::MoveCardRequest;
use kanban_common::{BoardView, ListView};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragKind {
    /// A list dragged along the board. Droppable ids are board ids.
    List,
    /// A card dragged within or between lists. Droppable ids are list ids.
    Card,
}

/// Where a drag started or ended: the container and the index inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DropLocation {
    pub droppable_id: i64,
    pub index: usize,
}

/// The result of a finished drag gesture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragResult {
    pub kind: DragKind,
    pub draggable_id: i64,
    pub source: DropLocation,
    /// `None` when the item was dropped outside any container.
    pub destination: Option<DropLocation>,
}

/// The server request that makes a planned drag durable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    ReorderLists { list_ids: Vec<i64> },
    ReorderCards { list_id: i64, card_ids: Vec<i64> },
    MoveCard(MoveCardRequest),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("A mutation is already pending")]
    MutationPending,

    #[error("Board {0} is not the board being shown")]
    WrongBoard(i64),

    #[error("List {0} is not on this board")]
    UnknownList(i64),

    #[error("Expected {expected} at index {index}, found {found:?}")]
    StaleDrag {
        expected: i64,
        index: usize,
        found: Option<i64>,
    },

    #[error(transparent)]
    Ordering(#[from] OrderingError),
}

#[derive(Debug, Clone)]
pub struct OptimisticBoard {
    confirmed: BoardView,
    speculative: Option<BoardView>,
    pending: Option<Mutation>,
}

impl OptimisticBoard {
    pub fn new(confirmed: BoardView) -> Self {
        Self {
            confirmed,
            speculative: None,
            pending: None,
        }
    }

    /// The board to render: speculative while a mutation is pending.
    pub fn view(&self) -> &BoardView {
        self.speculative.as_ref().unwrap_or(&self.confirmed)
    }

    pub fn confirmed(&self) -> &BoardView {
        &self.confirmed
    }

    pub fn pending(&self) -> Option<&Mutation> {
        self.pending.as_ref()
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Compute the board after `drag` and the request that persists it.
    ///
    /// Returns `None` for drops outside any container and for drops back
    /// onto the starting slot.
    pub fn plan(&self, drag: &DragResult) -> Result<Option<(BoardView, Mutation)>, StateError> {
        let Some(dest) = drag.destination else {
            return Ok(None);
        };
        if dest == drag.source {
            return Ok(None);
        }

        let mut next = self.view().clone();
        let mutation = match drag.kind {
            DragKind::List => plan_list_drag(&mut next, drag, dest)?,
            DragKind::Card => plan_card_drag(&mut next, drag, dest)?,
        };
        Ok(Some((next, mutation)))
    }

    /// Plan `drag` and make it the speculative view.
    pub fn begin(&mut self, drag: &DragResult) -> Result<Option<Mutation>, StateError> {
        if self.pending.is_some() {
            return Err(StateError::MutationPending);
        }
        let Some((next, mutation)) = self.plan(drag)? else {
            return Ok(None);
        };
        self.speculative = Some(next);
        self.pending = Some(mutation.clone());
        Ok(Some(mutation))
    }

    /// The server accepted the pending mutation.
    pub fn confirm(&mut self) {
        if let Some(next) = self.speculative.take() {
            self.confirmed = next;
        }
        self.pending = None;
    }

    /// The server rejected the pending mutation.
    pub fn rollback(&mut self) {
        self.speculative = None;
        self.pending = None;
    }

    /// Replace everything with a freshly fetched board.
    pub fn replace(&mut self, board: BoardView) {
        self.confirmed = board;
        self.speculative = None;
        self.pending = None;
    }
}

fn plan_list_drag(
    board: &mut BoardView,
    drag: &DragResult,
    dest: DropLocation,
) -> Result<Mutation, StateError> {
    if drag.source.droppable_id != board.board.id {
        return Err(StateError::WrongBoard(drag.source.droppable_id));
    }
    if dest.droppable_id != board.board.id {
        return Err(StateError::WrongBoard(dest.droppable_id));
    }
    check_slot(
        drag.draggable_id,
        drag.source.index,
        board.lists.get(drag.source.index).map(|l| l.list.id),
    )?;

    ordering::reposition(&mut board.lists, drag.source.index, dest.index)?;
    ordering::renumber(&mut board.lists);
    Ok(Mutation::ReorderLists {
        list_ids: board.list_ids(),
    })
}

fn plan_card_drag(
    board: &mut BoardView,
    drag: &DragResult,
    dest: DropLocation,
) -> Result<Mutation, StateError> {
    let source_list_id = drag.source.droppable_id;
    let src = list_index(board, source_list_id)?;
    let dst = list_index(board, dest.droppable_id)?;
    check_slot(
        drag.draggable_id,
        drag.source.index,
        board.lists[src].cards.get(drag.source.index).map(|c| c.card.id),
    )?;

    if src == dst {
        let list = &mut board.lists[src];
        ordering::reposition(&mut list.cards, drag.source.index, dest.index)?;
        ordering::renumber(&mut list.cards);
        return Ok(Mutation::ReorderCards {
            list_id: source_list_id,
            card_ids: list.card_ids(),
        });
    }

    let (from, to) = two_lists_mut(&mut board.lists, src, dst);
    let at = ordering::transfer(&mut from.cards, drag.source.index, &mut to.cards, dest.index)?;
    to.cards[at].card.list_id = to.list.id;
    ordering::renumber(&mut from.cards);
    ordering::renumber(&mut to.cards);

    Ok(Mutation::MoveCard(MoveCardRequest {
        card_id: drag.draggable_id,
        source_list_id,
        dest_list_id: dest.droppable_id,
        dest_index: at as i64,
    }))
}

fn list_index(board: &BoardView, list_id: i64) -> Result<usize, StateError> {
    board
        .lists
        .iter()
        .position(|l| l.list.id == list_id)
        .ok_or(StateError::UnknownList(list_id))
}

fn check_slot(expected: i64, index: usize, found: Option<i64>) -> Result<(), StateError> {
    if found == Some(expected) {
        Ok(())
    } else {
        Err(StateError::StaleDrag {
            expected,
            index,
            found,
        })
    }
}

fn two_lists_mut(lists: &mut [ListView], a: usize, b: usize) -> (&mut ListView, &mut ListView) {
    if a < b {
        let (left, right) = lists.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = lists.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
