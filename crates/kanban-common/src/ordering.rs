//! Dense position sequences.
//!
//! Every ordered collection on a board (lists in a board, cards in a list,
//! checklists in a card, items in a checklist) keeps its active children at
//! positions `0..n-1`. The functions here are the pure half of that rule:
//! the server uses them to validate and compute new orderings before writing,
//! the client uses them to build its optimistic view of a drag.

use std::collections::HashSet;

use thiserror::Error;

use super::models::{CardView, ChecklistItem, ChecklistView, ListView};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderingError {
    #[error("Id {0} appears more than once in the requested ordering")]
    Duplicate(i64),

    #[error("Id {0} is not an active child of this parent")]
    NotInScope(i64),

    #[error("Requested ordering omits {missing} of the parent's {expected} active children")]
    Incomplete { missing: usize, expected: usize },

    #[error("Index {index} is out of range for a sequence of {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

/// An element that occupies a slot in a dense position sequence.
pub trait Positioned {
    fn id(&self) -> i64;
    fn position(&self) -> i32;
    fn set_position(&mut self, position: i32);
}

impl Positioned for ListView {
    fn id(&self) -> i64 {
        self.list.id
    }
    fn position(&self) -> i32 {
        self.list.position
    }
    fn set_position(&mut self, position: i32) {
        self.list.position = position;
    }
}

impl Positioned for CardView {
    fn id(&self) -> i64 {
        self.card.id
    }
    fn position(&self) -> i32 {
        self.card.position
    }
    fn set_position(&mut self, position: i32) {
        self.card.position = position;
    }
}

impl Positioned for ChecklistView {
    fn id(&self) -> i64 {
        self.checklist.id
    }
    fn position(&self) -> i32 {
        self.checklist.position
    }
    fn set_position(&mut self, position: i32) {
        self.checklist.position = position;
    }
}

impl Positioned for ChecklistItem {
    fn id(&self) -> i64 {
        self.id
    }
    fn position(&self) -> i32 {
        self.position
    }
    fn set_position(&mut self, position: i32) {
        self.position = position;
    }
}

/// Check that `requested` is a permutation of `current`.
///
/// Duplicates and foreign ids are reported before missing ones so the caller
/// sees the most specific problem.
pub fn validate_permutation(current: &[i64], requested: &[i64]) -> Result<(), OrderingError> {
    let scope: HashSet<i64> = current.iter().copied().collect();
    let mut seen = HashSet::with_capacity(requested.len());
    for &id in requested {
        if !seen.insert(id) {
            return Err(OrderingError::Duplicate(id));
        }
        if !scope.contains(&id) {
            return Err(OrderingError::NotInScope(id));
        }
    }
    if seen.len() != scope.len() {
        return Err(OrderingError::Incomplete {
            missing: scope.len() - seen.len(),
            expected: scope.len(),
        });
    }
    Ok(())
}

/// Clamp an insertion index so that anything past the end appends.
pub fn clamp_index(index: usize, len: usize) -> usize {
    index.min(len)
}

/// Insert `item` at `index`, appending when `index` is past the end.
/// Returns the index actually used.
pub fn insert_clamped<T>(items: &mut Vec<T>, index: usize, item: T) -> usize {
    let at = clamp_index(index, items.len());
    items.insert(at, item);
    at
}

/// Move the element at `from` to `to` within one sequence.
pub fn reposition<T>(items: &mut Vec<T>, from: usize, to: usize) -> Result<usize, OrderingError> {
    if from >= items.len() {
        return Err(OrderingError::IndexOutOfRange {
            index: from,
            len: items.len(),
        });
    }
    let item = items.remove(from);
    Ok(insert_clamped(items, to, item))
}

/// Move the element at `from` in `source` to `to` in `dest`.
pub fn transfer<T>(
    source: &mut Vec<T>,
    from: usize,
    dest: &mut Vec<T>,
    to: usize,
) -> Result<usize, OrderingError> {
    if from >= source.len() {
        return Err(OrderingError::IndexOutOfRange {
            index: from,
            len: source.len(),
        });
    }
    let item = source.remove(from);
    Ok(insert_clamped(dest, to, item))
}

/// Rewrite positions to match slice order.
pub fn renumber<T: Positioned>(items: &mut [T]) {
    for (index, item) in items.iter_mut().enumerate() {
        item.set_position(index as i32);
    }
}

/// True when the positions, in any order, are exactly `0..n-1`.
pub fn is_dense(positions: &[i32]) -> bool {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted.iter().enumerate().all(|(i, &p)| p == i as i32)
}
