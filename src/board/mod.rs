//! Board service: SQLite-backed Kanban boards with dense, transactional
//! ordering.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (Router, TraceLayer, CORS in dev)    │
//! │          │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘ WebSocket│         │                                        │
//!              (ws.rs)  │         │ DbHandle::call() on the blocking pool  │
//!                       │         v                                        │
//!                       │  reorder.rs   reorder_* / move_card              │
//!                       │  reader.rs    get_board_view                     │
//!                       │  cards.rs / checklists.rs   CRUD, search, filter │
//!                       │         │                                        │
//!                       │         v                                        │
//!                       │  positions.rs (Scope, dense sequence writes)     │
//!                       │  db.rs        (BoardDb, migrations, DbHandle)    │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering rule
//!
//! | Scope            | Parent    | Children in the sequence      |
//! |------------------|-----------|-------------------------------|
//! | `BoardLists`     | board     | every list                    |
//! | `ListCards`      | list      | non-archived cards            |
//! | `CardChecklists` | card      | every checklist               |
//! | `ChecklistItems` | checklist | every item                    |
//!
//! After any committed write, each scope's children read in position order
//! sit at exactly `0..n-1`. Creation appends, deletion and archiving compact,
//! and reorders and moves rewrite every affected sibling in one
//! `BEGIN IMMEDIATE` transaction.
//!
//! ## Typical Request Flow (drag a card to another list)
//!
//! 1. `PATCH /api/cards/move` → `api::move_card()`
//! 2. `BoardDb::move_card()` takes the write lock, checks the card is still
//!    in `source_list_id` (else 409), inserts it at the clamped index among
//!    the destination's cards and renumbers both lists.
//! 3. On commit the handler publishes `BoardEvent::CardMoved` to every
//!    `/ws` subscriber and returns `{"success": true}`.

pub mod api;
pub mod cards;
pub mod checklists;
pub mod db;
pub mod positions;
pub mod reader;
pub mod reorder;
pub mod seed;
pub mod server;
pub mod ws;

pub use cards::CardFilter;
pub use db::{BoardDb, DbHandle};
pub use positions::Scope;
pub use reorder::MAX_SCOPE_SIZE;
pub use seed::SeedOutcome;
