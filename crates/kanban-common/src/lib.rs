//! Shared domain types for the Kanban board service.
//!
//! Both the server (`kanban`) and the client (`kanban-client`) depend on this
//! crate so that the wire format and the ordering rules have one definition.
//!
//! | Module     | Responsibility                                              |
//! |------------|-------------------------------------------------------------|
//! | `models`   | Entities and the nested `BoardView` aggregate               |
//! | `requests` | Request payloads for the REST API                           |
//! | `events`   | `BoardEvent` change-feed messages                           |
//! | `ordering` | Dense position sequences: validation, reposition, transfer  |

pub mod events;
pub mod models;
pub mod ordering;
pub mod requests;

pub use events::BoardEvent;
pub use models::*;
pub use ordering::{OrderingError, Positioned};
