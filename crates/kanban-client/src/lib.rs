//! Client side of the board: optimistic drag-and-drop state reconciled
//! against the server.
//!
//! | Module    | Responsibility                                           |
//! |-----------|----------------------------------------------------------|
//! | `api`     | `BoardApi` trait, `HttpBoardApi`, `ClientError`          |
//! | `state`   | Drag planning and the confirmed/speculative board        |
//! | `session` | Runs a drag end to end and re-fetches on rejection       |

pub mod api;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{BoardApi, ClientError, ClientResult, HttpBoardApi};
pub use session::{BoardSession, DragOutcome, SessionError};
pub use state::{DragKind, DragResult, DropLocation, Mutation, OptimisticBoard, StateError};
