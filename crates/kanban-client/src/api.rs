//! Transport to the board service.
//!
//! [`BoardApi`] is the seam the session talks through. [`HttpBoardApi`] is the
//! real implementation over the REST routes; tests substitute an in-memory fake.

use async_trait::async_trait;
use kanban_common::BoardView;
use kanban_common::requests::{Ack, MoveCardRequest, ReorderCardsRequest, ReorderListsRequest};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// Map a non-success status and its error message onto the taxonomy the
    /// server uses.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            404 => Self::NotFound(message),
            400 => Self::InvalidArgument(message),
            409 => Self::Conflict(message),
            _ => Self::Server { status, message },
        }
    }
}

/// Operations the drag-and-drop session needs from the server.
#[async_trait]
pub trait BoardApi: Send + Sync {
    async fn get_board(&self, board_id: i64) -> ClientResult<BoardView>;

    async fn reorder_lists(&self, list_ids: &[i64]) -> ClientResult<()>;

    async fn reorder_cards(&self, list_id: i64, card_ids: &[i64]) -> ClientResult<()>;

    async fn move_card(&self, request: &MoveCardRequest) -> ClientResult<()>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// [`BoardApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBoardApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpBoardApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(resp: reqwest::Response) -> ClientResult<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await?;
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        Err(ClientError::from_status(status.as_u16(), message))
    }

    async fn expect_ack(resp: reqwest::Response) -> ClientResult<()> {
        let ack: Ack = Self::check(resp).await?.json().await?;
        if ack.success {
            Ok(())
        } else {
            Err(ClientError::Server {
                status: 200,
                message: "Server did not acknowledge the change".to_string(),
            })
        }
    }
}

#[async_trait]
impl BoardApi for HttpBoardApi {
    async fn get_board(&self, board_id: i64) -> ClientResult<BoardView> {
        let resp = self
            .client
            .get(self.url(&format!("/api/boards/{}", board_id)))
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn reorder_lists(&self, list_ids: &[i64]) -> ClientResult<()> {
        debug!(count = list_ids.len(), "Reordering lists");
        let body = ReorderListsRequest {
            list_ids: list_ids.to_vec(),
        };
        let resp = self
            .client
            .patch(self.url("/api/lists/reorder"))
            .json(&body)
            .send()
            .await?;
        Self::expect_ack(resp).await
    }

    async fn reorder_cards(&self, list_id: i64, card_ids: &[i64]) -> ClientResult<()> {
        debug!(list_id, count = card_ids.len(), "Reordering cards");
        let body = ReorderCardsRequest {
            list_id,
            card_ids: card_ids.to_vec(),
        };
        let resp = self
            .client
            .patch(self.url("/api/cards/reorder"))
            .json(&body)
            .send()
            .await?;
        Self::expect_ack(resp).await
    }

    async fn move_card(&self, request: &MoveCardRequest) -> ClientResult<()> {
        debug!(
            card_id = request.card_id,
            dest_list_id = request.dest_list_id,
            dest_index = request.dest_index,
            "Moving card"
        );
        let resp = self
            .client
            .patch(self.url("/api/cards/move"))
            .json(request)
            .send()
            .await?;
        Self::expect_ack(resp).await
    }
}
