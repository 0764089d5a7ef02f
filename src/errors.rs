//! Typed errors for the board service.
//!
//! `BoardError` is what the database, reorder engine and aggregate reader
//! return. The HTTP layer maps it onto status codes:
//! NotFound → 404, InvalidArgument → 400, Conflict → 409, everything else → 500.

use std::fmt;

use kanban_common::OrderingError;
use thiserror::Error;

/// The kind of row a NotFound refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Board,
    List,
    Card,
    Checklist,
    ChecklistItem,
    Label,
    Member,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Board => "Board",
            Self::List => "List",
            Self::Card => "Card",
            Self::Checklist => "Checklist",
            Self::ChecklistItem => "Checklist item",
            Self::Label => "Label",
            Self::Member => "Member",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: i64 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type BoardResult<T> = Result<T, BoardError>;

impl BoardError {
    pub fn not_found(entity: Entity, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<OrderingError> for BoardError {
    fn from(err: OrderingError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<rusqlite::Error> for BoardError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Other(anyhow::Error::new(err).context("Database error"))
    }
}
