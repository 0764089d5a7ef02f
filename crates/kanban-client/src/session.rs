//! Drag-and-drop session: optimistic update, server call, reconcile.

use kanban_common::BoardView;
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{BoardApi, ClientError};
use crate::state::{DragResult, Mutation, OptimisticBoard, StateError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Api(#[from] ClientError),
}

/// What became of a drag gesture.
#[derive(Debug)]
pub enum DragOutcome {
    /// Nothing to send: dropped outside a container or onto its own slot.
    Ignored,
    /// The server accepted the change and the speculative view is confirmed.
    Confirmed,
    /// The server rejected the change; the board was re-fetched.
    Reverted(ClientError),
}

pub struct BoardSession<A: BoardApi> {
    api: A,
    board_id: i64,
    state: OptimisticBoard,
}

impl<A: BoardApi> BoardSession<A> {
    pub async fn load(api: A, board_id: i64) -> Result<Self, SessionError> {
        let board = api.get_board(board_id).await?;
        Ok(Self {
            api,
            board_id,
            state: OptimisticBoard::new(board),
        })
    }

    pub fn board_id(&self) -> i64 {
        self.board_id
    }

    pub fn view(&self) -> &BoardView {
        self.state.view()
    }

    pub fn state(&self) -> &OptimisticBoard {
        &self.state
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Apply `drag` locally, send it, and settle the optimistic state.
    ///
    /// A rejected mutation is not an error here: the speculative view is
    /// discarded, the authoritative board is re-fetched, and the rejection
    /// is returned in [`DragOutcome::Reverted`].
    ///
    /// A drag that no longer matches the local board (stale source index,
    /// unknown list or board) re-fetches the board before the
    /// [`StateError`] is returned, so the next gesture plans against
    /// server state.
    pub async fn handle_drag(&mut self, drag: &DragResult) -> Result<DragOutcome, SessionError> {
        let mutation = match self.state.begin(drag) {
            Ok(Some(mutation)) => mutation,
            Ok(None) => return Ok(DragOutcome::Ignored),
            Err(
                e @ (StateError::StaleDrag { .. }
                | StateError::UnknownList(_)
                | StateError::WrongBoard(_)),
            ) => {
                warn!(board_id = self.board_id, error = %e, "Drag does not match local board, re-fetching");
                self.refresh().await?;
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };

        match self.send(&mutation).await {
            Ok(()) => {
                self.state.confirm();
                Ok(DragOutcome::Confirmed)
            }
            Err(e) => {
                warn!(board_id = self.board_id, error = %e, "Mutation rejected, re-fetching board");
                self.state.rollback();
                self.refresh().await?;
                Ok(DragOutcome::Reverted(e))
            }
        }
    }

    /// Replace local state with the server's board.
    pub async fn refresh(&mut self) -> Result<(), SessionError> {
        let board = self.api.get_board(self.board_id).await?;
        info!(board_id = self.board_id, lists = board.lists.len(), "Board refreshed");
        self.state.replace(board);
        Ok(())
    }

    async fn send(&self, mutation: &Mutation) -> Result<(), ClientError> {
        match mutation {
            Mutation::ReorderLists { list_ids } => self.api.reorder_lists(list_ids).await,
            Mutation::ReorderCards { list_id, card_ids } => {
                self.api.reorder_cards(*list_id, card_ids).await
            }
            Mutation::MoveCard(request) => self.api.move_card(request).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ClientResult;
    use crate::state::{DragKind, DropLocation};
    use crate::test_support::{LIST_A, LIST_B, M, N, X, Y, Z, board_fixture, card_ids};
    use async_trait::async_trait;
    use kanban_common::requests::MoveCardRequest;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory server: records mutations, optionally rejects them.
    struct FakeApi {
        board: Mutex<BoardView>,
        reject_with: Option<u16>,
        fetches: AtomicUsize,
        sent: Mutex<Vec<Mutation>>,
    }

    impl FakeApi {
        fn new(reject_with: Option<u16>) -> Self {
            Self {
                board: Mutex::new(board_fixture()),
                reject_with,
                fetches: AtomicUsize::new(0),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn record(&self, mutation: Mutation) -> ClientResult<()> {
            self.sent.lock().unwrap().push(mutation);
            match self.reject_with {
                Some(status) => Err(ClientError::from_status(status, "rejected".into())),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl BoardApi for FakeApi {
        async fn get_board(&self, board_id: i64) -> ClientResult<BoardView> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let board = self.board.lock().unwrap().clone();
            if board.board.id == board_id {
                Ok(board)
            } else {
                Err(ClientError::NotFound(format!("Board {} not found", board_id)))
            }
        }

        async fn reorder_lists(&self, list_ids: &[i64]) -> ClientResult<()> {
            self.record(Mutation::ReorderLists {
                list_ids: list_ids.to_vec(),
            })
        }

        async fn reorder_cards(&self, list_id: i64, card_ids: &[i64]) -> ClientResult<()> {
            self.record(Mutation::ReorderCards {
                list_id,
                card_ids: card_ids.to_vec(),
            })
        }

        async fn move_card(&self, request: &MoveCardRequest) -> ClientResult<()> {
            self.record(Mutation::MoveCard(request.clone()))
        }
    }

    fn move_x_to_b() -> DragResult {
        DragResult {
            kind: DragKind::Card,
            draggable_id: X,
            source: DropLocation {
                droppable_id: LIST_A,
                index: 0,
            },
            destination: Some(DropLocation {
                droppable_id: LIST_B,
                index: 1,
            }),
        }
    }

    #[tokio::test]
    async fn test_accepted_move_is_confirmed() {
        let mut session = BoardSession::load(FakeApi::new(None), 1).await.unwrap();
        let outcome = session.handle_drag(&move_x_to_b()).await.unwrap();

        assert!(matches!(outcome, DragOutcome::Confirmed));
        assert!(!session.state().is_pending());
        assert_eq!(card_ids(session.view(), LIST_A), vec![Y, Z]);
        assert_eq!(card_ids(session.view(), LIST_B), vec![M, X, N]);
        assert_eq!(session.api().fetches.load(Ordering::SeqCst), 1);
        assert_eq!(
            session.api().sent.lock().unwrap().as_slice(),
            &[Mutation::MoveCard(MoveCardRequest {
                card_id: X,
                source_list_id: LIST_A,
                dest_list_id: LIST_B,
                dest_index: 1,
            })]
        );
    }

    #[tokio::test]
    async fn test_rejected_move_reverts_to_server_board() {
        let mut session = BoardSession::load(FakeApi::new(Some(409)), 1).await.unwrap();
        let outcome = session.handle_drag(&move_x_to_b()).await.unwrap();

        assert!(matches!(outcome, DragOutcome::Reverted(ClientError::Conflict(_))));
        assert!(!session.state().is_pending());
        assert_eq!(session.view(), &board_fixture());
        assert_eq!(session.api().fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dropped_outside_sends_nothing() {
        let mut session = BoardSession::load(FakeApi::new(None), 1).await.unwrap();
        let mut drag = move_x_to_b();
        drag.destination = None;

        let outcome = session.handle_drag(&drag).await.unwrap();
        assert!(matches!(outcome, DragOutcome::Ignored));
        assert!(session.api().sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_drag_sends_full_order() {
        let mut session = BoardSession::load(FakeApi::new(None), 1).await.unwrap();
        let drag = DragResult {
            kind: DragKind::List,
            draggable_id: LIST_B,
            source: DropLocation {
                droppable_id: 1,
                index: 1,
            },
            destination: Some(DropLocation {
                droppable_id: 1,
                index: 0,
            }),
        };
        session.handle_drag(&drag).await.unwrap();
        assert_eq!(session.view().list_ids(), vec![LIST_B, LIST_A]);
        assert_eq!(
            session.api().sent.lock().unwrap().as_slice(),
            &[Mutation::ReorderLists {
                list_ids: vec![LIST_B, LIST_A],
            }]
        );
    }

    #[tokio::test]
    async fn test_stale_drag_refetches_and_sends_nothing() {
        let mut session = BoardSession::load(FakeApi::new(None), 1).await.unwrap();
        let mut drag = move_x_to_b();
        drag.source.index = 1;

        let err = session.handle_drag(&drag).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::State(StateError::StaleDrag { .. })
        ));
        assert_eq!(session.api().fetches.load(Ordering::SeqCst), 2);
        assert!(session.api().sent.lock().unwrap().is_empty());
        assert!(!session.state().is_pending());
        assert_eq!(session.view(), &board_fixture());
    }

    #[tokio::test]
    async fn test_load_unknown_board_fails() {
        let result = BoardSession::load(FakeApi::new(None), 42).await;
        assert!(matches!(
            result,
            Err(SessionError::Api(ClientError::NotFound(_)))
        ));
    }
}
