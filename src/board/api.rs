use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{FromRequest, Path, Query, Request, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post, put},
};
use chrono::Utc;
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::error;

use kanban_common::requests::*;
use kanban_common::{BoardEvent, DueWindow};

use super::cards::CardFilter;
use super::db::DbHandle;
use super::ws::{broadcast_event, ws_handler};
use crate::errors::BoardError;

/// Capacity of the change-feed channel. Slow subscribers that fall further
/// behind than this skip events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub ws_tx: broadcast::Sender<String>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(db: DbHandle) -> SharedState {
        let (ws_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self { db, ws_tx })
    }

    fn publish(&self, event: BoardEvent) {
        broadcast_event(&self.ws_tx, &event);
    }
}

// ── Query parameters ──────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
}

/// `labels` and `members` are comma-separated id lists.
#[derive(Deserialize)]
pub struct FilterParams {
    pub labels: Option<String>,
    pub members: Option<String>,
    pub due: Option<String>,
}

impl FilterParams {
    fn into_filter(self) -> Result<CardFilter, ApiError> {
        let due = match self.due.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<DueWindow>().map_err(ApiError::BadRequest)?),
        };
        Ok(CardFilter {
            label_ids: parse_id_list("labels", self.labels.as_deref())?,
            member_ids: parse_id_list("members", self.members.as_deref())?,
            due,
        })
    }
}

fn parse_id_list(name: &str, raw: Option<&str>) -> Result<Vec<i64>, ApiError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ApiError::BadRequest(format!("Invalid id in {}: {}", name, s)))
        })
        .collect()
}

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        match err {
            BoardError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            BoardError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            BoardError::Conflict(msg) => ApiError::Conflict(msg),
            BoardError::LockPoisoned | BoardError::Other(_) => {
                error!(error = ?err, "Request failed");
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// `Json` body extractor whose rejections are 400s with a JSON error body.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/boards", get(list_boards).post(create_board))
        .route("/api/boards/{id}", get(get_board))
        .route("/api/lists", post(create_list))
        .route("/api/lists/reorder", patch(reorder_lists))
        .route("/api/lists/{id}", put(update_list).delete(delete_list))
        .route("/api/cards", post(create_card))
        .route("/api/cards/reorder", patch(reorder_cards))
        .route("/api/cards/move", patch(move_card))
        .route("/api/cards/search", get(search_cards))
        .route("/api/cards/filter", get(filter_cards))
        .route("/api/cards/{id}", put(update_card).delete(delete_card))
        .route("/api/cards/{id}/labels", post(add_card_label))
        .route("/api/cards/{id}/labels/{label_id}", delete(remove_card_label))
        .route("/api/cards/{id}/members", post(add_card_member))
        .route("/api/cards/{id}/members/{member_id}", delete(remove_card_member))
        .route("/api/cards/{id}/checklists", post(add_checklist))
        .route("/api/cards/{id}/checklists/reorder", patch(reorder_checklists))
        .route("/api/checklists/{id}", delete(delete_checklist))
        .route("/api/checklists/{id}/items", post(add_item))
        .route("/api/checklists/{id}/items/reorder", patch(reorder_items))
        .route("/api/checklists/items/{id}", patch(update_item).delete(delete_item))
        .route("/api/labels", get(list_labels))
        .route("/api/members", get(list_members))
        .route("/ws", get(ws_handler))
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

// Boards

async fn list_boards(State(state): State<SharedState>) -> ApiResult<impl IntoResponse> {
    let boards = state.db.call(|db| db.list_boards()).await?;
    Ok(Json(boards))
}

async fn create_board(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CreateBoardRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".into()));
    }
    let board = state.db.call(move |db| db.create_board(&req.title)).await?;
    state.publish(BoardEvent::BoardCreated {
        board: board.clone(),
    });
    Ok((StatusCode::CREATED, Json(board)))
}

async fn get_board(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let view = state.db.call(move |db| db.get_board_view(id)).await?;
    Ok(Json(view))
}

// Lists

async fn create_list(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CreateListRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".into()));
    }
    let list = state
        .db
        .call(move |db| db.create_list(req.board_id, &req.title))
        .await?;
    state.publish(BoardEvent::ListCreated { list: list.clone() });
    Ok((StatusCode::CREATED, Json(list)))
}

async fn update_list(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<UpdateListRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".into()));
    }
    let list = state.db.call(move |db| db.update_list(id, &req.title)).await?;
    state.publish(BoardEvent::ListUpdated { list: list.clone() });
    Ok(Json(list))
}

async fn delete_list(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let list = state.db.call(move |db| db.delete_list(id)).await?;
    state.publish(BoardEvent::ListDeleted {
        list_id: list.id,
        board_id: list.board_id,
    });
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_lists(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<ReorderListsRequest>,
) -> ApiResult<impl IntoResponse> {
    let list_ids = req.list_ids;
    let ids = list_ids.clone();
    let board_id = state.db.call(move |db| db.reorder_lists(&ids)).await?;
    state.publish(BoardEvent::ListsReordered { board_id, list_ids });
    Ok(Json(Ack::OK))
}

// Cards

async fn create_card(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<CreateCardRequest>,
) -> ApiResult<impl IntoResponse> {
    let card = state
        .db
        .call(move |db| db.create_card(req.list_id, &req.title, req.description.as_deref()))
        .await?;
    state.publish(BoardEvent::CardCreated { card: card.clone() });
    Ok((StatusCode::CREATED, Json(card)))
}

async fn update_card(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<UpdateCardRequest>,
) -> ApiResult<impl IntoResponse> {
    let card = state.db.call(move |db| db.update_card(id, &req)).await?;
    state.publish(BoardEvent::CardUpdated { card: card.clone() });
    Ok(Json(card))
}

async fn delete_card(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let card = state.db.call(move |db| db.delete_card(id)).await?;
    state.publish(BoardEvent::CardDeleted {
        card_id: card.id,
        list_id: card.list_id,
    });
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_cards(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<ReorderCardsRequest>,
) -> ApiResult<impl IntoResponse> {
    let ReorderCardsRequest { list_id, card_ids } = req;
    let ids = card_ids.clone();
    state
        .db
        .call(move |db| db.reorder_cards(list_id, &ids))
        .await?;
    state.publish(BoardEvent::CardsReordered { list_id, card_ids });
    Ok(Json(Ack::OK))
}

async fn move_card(
    State(state): State<SharedState>,
    ApiJson(req): ApiJson<MoveCardRequest>,
) -> ApiResult<impl IntoResponse> {
    let MoveCardRequest {
        card_id,
        source_list_id,
        dest_list_id,
        dest_index,
    } = req;
    let card = state
        .db
        .call(move |db| db.move_card(card_id, source_list_id, dest_list_id, dest_index))
        .await?;
    state.publish(BoardEvent::CardMoved {
        card_id,
        source_list_id,
        dest_list_id,
        position: card.position,
    });
    Ok(Json(Ack::OK))
}

async fn search_cards(
    State(state): State<SharedState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let matches = state.db.call(move |db| db.search_cards(&params.q)).await?;
    Ok(Json(matches))
}

async fn filter_cards(
    State(state): State<SharedState>,
    Query(params): Query<FilterParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = params.into_filter()?;
    let matches = state
        .db
        .call(move |db| db.filter_cards(&filter, Utc::now()))
        .await?;
    Ok(Json(matches))
}

// Labels & members on cards

async fn add_card_label(
    State(state): State<SharedState>,
    Path(card_id): Path<i64>,
    ApiJson(req): ApiJson<AddLabelRequest>,
) -> ApiResult<impl IntoResponse> {
    let (labels, card) = state
        .db
        .call(move |db| {
            let labels = db.add_card_label(card_id, req.label_id)?;
            Ok((labels, db.get_card(card_id)?))
        })
        .await?;
    if let Some(card) = card {
        state.publish(BoardEvent::CardUpdated { card });
    }
    Ok(Json(labels))
}

async fn remove_card_label(
    State(state): State<SharedState>,
    Path((card_id, label_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    let (labels, card) = state
        .db
        .call(move |db| {
            let labels = db.remove_card_label(card_id, label_id)?;
            Ok((labels, db.get_card(card_id)?))
        })
        .await?;
    if let Some(card) = card {
        state.publish(BoardEvent::CardUpdated { card });
    }
    Ok(Json(labels))
}

async fn add_card_member(
    State(state): State<SharedState>,
    Path(card_id): Path<i64>,
    ApiJson(req): ApiJson<AddMemberRequest>,
) -> ApiResult<impl IntoResponse> {
    let (members, card) = state
        .db
        .call(move |db| {
            let members = db.add_card_member(card_id, req.member_id)?;
            Ok((members, db.get_card(card_id)?))
        })
        .await?;
    if let Some(card) = card {
        state.publish(BoardEvent::CardUpdated { card });
    }
    Ok(Json(members))
}

async fn remove_card_member(
    State(state): State<SharedState>,
    Path((card_id, member_id)): Path<(i64, i64)>,
) -> ApiResult<impl IntoResponse> {
    let (members, card) = state
        .db
        .call(move |db| {
            let members = db.remove_card_member(card_id, member_id)?;
            Ok((members, db.get_card(card_id)?))
        })
        .await?;
    if let Some(card) = card {
        state.publish(BoardEvent::CardUpdated { card });
    }
    Ok(Json(members))
}

// Checklists

async fn add_checklist(
    State(state): State<SharedState>,
    Path(card_id): Path<i64>,
    ApiJson(req): ApiJson<CreateChecklistRequest>,
) -> ApiResult<impl IntoResponse> {
    let checklist = state
        .db
        .call(move |db| db.add_checklist(card_id, &req.title))
        .await?;
    state.publish(BoardEvent::ChecklistsChanged { card_id });
    Ok((StatusCode::CREATED, Json(checklist)))
}

async fn reorder_checklists(
    State(state): State<SharedState>,
    Path(card_id): Path<i64>,
    ApiJson(req): ApiJson<ReorderChecklistsRequest>,
) -> ApiResult<impl IntoResponse> {
    state
        .db
        .call(move |db| db.reorder_checklists(card_id, &req.checklist_ids))
        .await?;
    state.publish(BoardEvent::ChecklistsChanged { card_id });
    Ok(Json(Ack::OK))
}

async fn delete_checklist(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let checklist = state.db.call(move |db| db.delete_checklist(id)).await?;
    state.publish(BoardEvent::ChecklistsChanged {
        card_id: checklist.card_id,
    });
    Ok(StatusCode::NO_CONTENT)
}

async fn add_item(
    State(state): State<SharedState>,
    Path(checklist_id): Path<i64>,
    ApiJson(req): ApiJson<CreateItemRequest>,
) -> ApiResult<impl IntoResponse> {
    let (item, card_id) = state
        .db
        .call(move |db| {
            let item = db.add_item(checklist_id, &req.title)?;
            Ok((item, db.checklist_card_id(checklist_id)?))
        })
        .await?;
    state.publish(BoardEvent::ChecklistsChanged { card_id });
    Ok((StatusCode::CREATED, Json(item)))
}

async fn reorder_items(
    State(state): State<SharedState>,
    Path(checklist_id): Path<i64>,
    ApiJson(req): ApiJson<ReorderItemsRequest>,
) -> ApiResult<impl IntoResponse> {
    let card_id = state
        .db
        .call(move |db| {
            db.reorder_items(checklist_id, &req.item_ids)?;
            db.checklist_card_id(checklist_id)
        })
        .await?;
    state.publish(BoardEvent::ChecklistsChanged { card_id });
    Ok(Json(Ack::OK))
}

async fn update_item(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    ApiJson(req): ApiJson<UpdateItemRequest>,
) -> ApiResult<impl IntoResponse> {
    let (item, card_id) = state
        .db
        .call(move |db| {
            let item = db.update_item(id, &req)?;
            let card_id = db.checklist_card_id(item.checklist_id)?;
            Ok((item, card_id))
        })
        .await?;
    state.publish(BoardEvent::ChecklistsChanged { card_id });
    Ok(Json(item))
}

async fn delete_item(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let card_id = state
        .db
        .call(move |db| {
            let item = db.delete_item(id)?;
            db.checklist_card_id(item.checklist_id)
        })
        .await?;
    state.publish(BoardEvent::ChecklistsChanged { card_id });
    Ok(StatusCode::NO_CONTENT)
}

// Labels & members

async fn list_labels(State(state): State<SharedState>) -> ApiResult<impl IntoResponse> {
    let labels = state.db.call(|db| db.list_labels()).await?;
    Ok(Json(labels))
}

async fn list_members(State(state): State<SharedState>) -> ApiResult<impl IntoResponse> {
    let members = state.db.call(|db| db.list_members()).await?;
    Ok(Json(members))
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::db::BoardDb;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use kanban_common::BoardView;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        let db = BoardDb::new_in_memory().unwrap();
        AppState::new(DbHandle::new(db))
    }

    fn test_app(state: &SharedState) -> Router {
        api_router().with_state(state.clone())
    }

    async fn body_json<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    /// Board with lists A=[X, Y, Z] and B=[M, N].
    struct Seeded {
        board: i64,
        a: i64,
        b: i64,
        xyz: Vec<i64>,
        mn: Vec<i64>,
    }

    fn seed(state: &SharedState) -> Seeded {
        let mut db = state.db.lock_sync().unwrap();
        let board = db.create_board("Board").unwrap();
        let a = db.create_list(board.id, "A").unwrap();
        let b = db.create_list(board.id, "B").unwrap();
        let xyz = ["X", "Y", "Z"]
            .iter()
            .map(|t| db.create_card(a.id, t, None).unwrap().id)
            .collect();
        let mn = ["M", "N"]
            .iter()
            .map(|t| db.create_card(b.id, t, None).unwrap().id)
            .collect();
        Seeded {
            board: board.id,
            a: a.id,
            b: b.id,
            xyz,
            mn,
        }
    }

    async fn board_view(app: &Router, id: i64) -> BoardView {
        let request = Request::builder()
            .uri(format!("/api/boards/{}", id))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        body_json(response.into_body()).await
    }

    // 1. Health check
    #[tokio::test]
    async fn test_health_check() {
        let state = test_state();
        let app = test_app(&state);

        let request = Request::builder()
            .method("GET")
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"ok");
    }

    // 2. Create board, list and card; board aggregate reflects them
    #[tokio::test]
    async fn test_create_and_get_board() {
        let state = test_state();
        let app = test_app(&state);

        let (status, board) = send(&app, "POST", "/api/boards", Some(serde_json::json!({"title": "Roadmap"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let board_id = board["id"].as_i64().unwrap();

        let (status, list) = send(
            &app,
            "POST",
            "/api/lists",
            Some(serde_json::json!({"title": "To Do", "board_id": board_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(list["position"], 0);

        let (status, card) = send(
            &app,
            "POST",
            "/api/cards",
            Some(serde_json::json!({"title": "Ship it", "list_id": list["id"]})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(card["position"], 0);

        let view = board_view(&app, board_id).await;
        assert_eq!(view.board.title, "Roadmap");
        assert_eq!(view.lists[0].cards[0].card.title, "Ship it");

        let (status, boards) = send(&app, "GET", "/api/boards", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(boards.as_array().unwrap().len(), 1);
    }

    // 3. Unknown board is 404 with a JSON error body
    #[tokio::test]
    async fn test_get_board_not_found() {
        let state = test_state();
        let app = test_app(&state);

        let (status, body) = send(&app, "GET", "/api/boards/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Board 999 not found");
    }

    // 4. Reorder lists
    #[tokio::test]
    async fn test_reorder_lists() {
        let state = test_state();
        let app = test_app(&state);
        let s = seed(&state);

        let (status, body) = send(
            &app,
            "PATCH",
            "/api/lists/reorder",
            Some(serde_json::json!({"list_ids": [s.b, s.a]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"success": true}));

        let view = board_view(&app, s.board).await;
        assert_eq!(view.list_ids(), vec![s.b, s.a]);
        let positions: Vec<i32> = view.lists.iter().map(|l| l.list.position).collect();
        assert_eq!(positions, vec![0, 1]);
    }

    // 5. Reorder cards: success, unknown id, and invalid set
    #[tokio::test]
    async fn test_reorder_cards() {
        let state = test_state();
        let app = test_app(&state);
        let s = seed(&state);
        let order = vec![s.xyz[2], s.xyz[0], s.xyz[1]];

        let (status, _) = send(
            &app,
            "PATCH",
            "/api/cards/reorder",
            Some(serde_json::json!({"list_id": s.a, "card_ids": order})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let view = board_view(&app, s.board).await;
        assert_eq!(view.list(s.a).unwrap().card_ids(), order);

        let (status, _) = send(
            &app,
            "PATCH",
            "/api/cards/reorder",
            Some(serde_json::json!({"list_id": s.a, "card_ids": [s.xyz[0], s.xyz[1], 424242]})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app,
            "PATCH",
            "/api/cards/reorder",
            Some(serde_json::json!({"list_id": s.a, "card_ids": [s.xyz[0], s.xyz[1]]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("omits"));

        // Failed requests leave the last good order in place.
        let view = board_view(&app, s.board).await;
        assert_eq!(view.list(s.a).unwrap().card_ids(), order);
    }

    // 6. Move card across lists
    #[tokio::test]
    async fn test_move_card() {
        let state = test_state();
        let app = test_app(&state);
        let s = seed(&state);

        let (status, body) = send(
            &app,
            "PATCH",
            "/api/cards/move",
            Some(serde_json::json!({
                "card_id": s.xyz[0],
                "source_list_id": s.a,
                "dest_list_id": s.b,
                "dest_index": 1
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let view = board_view(&app, s.board).await;
        assert_eq!(view.list(s.a).unwrap().card_ids(), vec![s.xyz[1], s.xyz[2]]);
        assert_eq!(
            view.list(s.b).unwrap().card_ids(),
            vec![s.mn[0], s.xyz[0], s.mn[1]]
        );
    }

    // 7. Move card failures map to 400 / 404 / 409
    #[tokio::test]
    async fn test_move_card_errors() {
        let state = test_state();
        let app = test_app(&state);
        let s = seed(&state);

        let mv = |card: i64, src: i64, dst: i64, idx: i64| {
            serde_json::json!({
                "card_id": card,
                "source_list_id": src,
                "dest_list_id": dst,
                "new_position": idx
            })
        };

        let (status, _) = send(&app, "PATCH", "/api/cards/move", Some(mv(s.xyz[0], s.a, s.b, -1))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "PATCH", "/api/cards/move", Some(mv(9999, s.a, s.b, 0))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "PATCH", "/api/cards/move", Some(mv(s.xyz[0], s.a, 9999, 0))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            send(&app, "PATCH", "/api/cards/move", Some(mv(s.xyz[0], s.b, s.a, 0))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().is_some());
    }

    // 8. Successful mutations are broadcast on the change feed
    #[tokio::test]
    async fn test_move_card_broadcasts_event() {
        let state = test_state();
        let app = test_app(&state);
        let s = seed(&state);
        let mut rx = state.ws_tx.subscribe();

        let (status, _) = send(
            &app,
            "PATCH",
            "/api/cards/move",
            Some(serde_json::json!({
                "card_id": s.xyz[2],
                "source_list_id": s.a,
                "dest_list_id": s.b,
                "dest_index": 99
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let event: BoardEvent = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(
            event,
            BoardEvent::CardMoved {
                card_id: s.xyz[2],
                source_list_id: s.a,
                dest_list_id: s.b,
                position: 2
            }
        );
    }

    // 9. Failed mutations publish nothing
    #[tokio::test]
    async fn test_failed_reorder_is_not_broadcast() {
        let state = test_state();
        let app = test_app(&state);
        let s = seed(&state);
        let mut rx = state.ws_tx.subscribe();

        let (status, _) = send(
            &app,
            "PATCH",
            "/api/lists/reorder",
            Some(serde_json::json!({"list_ids": [s.a, s.a, s.b]})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(rx.try_recv().is_err());
    }

    // 10. Archive via update, delete list
    #[tokio::test]
    async fn test_update_and_delete() {
        let state = test_state();
        let app = test_app(&state);
        let s = seed(&state);

        let (status, card) = send(
            &app,
            "PUT",
            &format!("/api/cards/{}", s.xyz[0]),
            Some(serde_json::json!({"archived": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(card["archived"], true);

        let view = board_view(&app, s.board).await;
        let a = view.list(s.a).unwrap();
        assert_eq!(a.card_ids(), vec![s.xyz[1], s.xyz[2]]);
        assert_eq!(a.cards[0].card.position, 0);

        let (status, _) = send(&app, "DELETE", &format!("/api/lists/{}", s.a), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let view = board_view(&app, s.board).await;
        assert_eq!(view.list_ids(), vec![s.b]);
        assert_eq!(view.lists[0].list.position, 0);

        let (status, _) = send(&app, "DELETE", &format!("/api/cards/{}", s.xyz[1]), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // 11. Labels, members, search and filter
    #[tokio::test]
    async fn test_labels_members_search_filter() {
        let state = test_state();
        let app = test_app(&state);
        let s = seed(&state);
        let (bug, jane) = {
            let mut db = state.db.lock_sync().unwrap();
            (
                db.create_label("Bug", "#eb5a46").unwrap(),
                db.create_member("Jane Smith", "jane@example.com", None).unwrap(),
            )
        };

        let (status, labels) = send(
            &app,
            "POST",
            &format!("/api/cards/{}/labels", s.mn[0]),
            Some(serde_json::json!({"label_id": bug.id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(labels[0]["name"], "Bug");

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/cards/{}/members", s.mn[1]),
            Some(serde_json::json!({"member_id": jane.id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, found) = send(&app, "GET", &format!("/api/cards/filter?labels={}", bug.id), None).await;
        assert_eq!(found.as_array().unwrap().len(), 1);
        assert_eq!(found[0]["id"], s.mn[0]);
        assert_eq!(found[0]["list"]["id"], s.b);

        let (_, found) = send(&app, "GET", &format!("/api/cards/filter?members={}", jane.id), None).await;
        assert_eq!(found[0]["id"], s.mn[1]);

        let (status, _) = send(&app, "GET", "/api/cards/filter?due=someday", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, "GET", "/api/cards/filter?labels=1,x", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, found) = send(&app, "GET", "/api/cards/search?q=y", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found.as_array().unwrap().len(), 1);
        assert_eq!(found[0]["title"], "Y");

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/cards/{}/labels/{}", s.mn[0], bug.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/api/cards/{}/labels/{}", s.mn[0], bug.id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, labels) = send(&app, "GET", "/api/labels", None).await;
        assert_eq!(labels.as_array().unwrap().len(), 1);
        let (_, members) = send(&app, "GET", "/api/members", None).await;
        assert_eq!(members[0]["name"], "Jane Smith");
    }

    // 12. Checklists and items
    #[tokio::test]
    async fn test_checklists_and_items() {
        let state = test_state();
        let app = test_app(&state);
        let s = seed(&state);
        let card = s.xyz[0];

        let (status, first) = send(
            &app,
            "POST",
            &format!("/api/cards/{}/checklists", card),
            Some(serde_json::json!({"title": "First"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (_, second) = send(
            &app,
            "POST",
            &format!("/api/cards/{}/checklists", card),
            Some(serde_json::json!({"title": "Second"})),
        )
        .await;

        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/api/cards/{}/checklists/reorder", card),
            Some(serde_json::json!({"checklist_ids": [second["id"], first["id"]]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let checklist_id = first["id"].as_i64().unwrap();
        let mut item_ids = Vec::new();
        for title in ["a", "b", "c"] {
            let (status, item) = send(
                &app,
                "POST",
                &format!("/api/checklists/{}/items", checklist_id),
                Some(serde_json::json!({"title": title})),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
            item_ids.push(item["id"].as_i64().unwrap());
        }

        let reversed: Vec<i64> = item_ids.iter().rev().copied().collect();
        let (status, _) = send(
            &app,
            "PATCH",
            &format!("/api/checklists/{}/items/reorder", checklist_id),
            Some(serde_json::json!({"item_ids": reversed})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, item) = send(
            &app,
            "PATCH",
            &format!("/api/checklists/items/{}", item_ids[0]),
            Some(serde_json::json!({"completed": true})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(item["completed"], true);

        let (status, _) = send(&app, "DELETE", &format!("/api/checklists/items/{}", item_ids[2]), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let view = board_view(&app, s.board).await;
        let card_view = &view.list(s.a).unwrap().cards[0];
        assert_eq!(card_view.checklists[0].checklist.id, second["id"].as_i64().unwrap());
        let items: Vec<(i64, i32)> = card_view.checklists[1]
            .items
            .iter()
            .map(|i| (i.id, i.position))
            .collect();
        assert_eq!(items, vec![(item_ids[1], 0), (item_ids[0], 1)]);

        let (status, _) = send(&app, "DELETE", &format!("/api/checklists/{}", second["id"]), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    // 13. Malformed JSON bodies are 400 with a JSON error, never a plain-text 422
    #[tokio::test]
    async fn test_malformed_payloads_are_bad_request() {
        let state = test_state();
        let app = test_app(&state);
        let s = seed(&state);

        let cases = [
            ("/api/lists/reorder", serde_json::json!({"list_ids": "abc"})),
            ("/api/cards/reorder", serde_json::json!({"card_ids": [1, "x"]})),
            (
                "/api/cards/move",
                serde_json::json!({
                    "card_id": s.xyz[0],
                    "source_list_id": s.a,
                    "dest_list_id": s.b,
                    "dest_index": "two"
                }),
            ),
            ("/api/cards/move", serde_json::json!({"dest_index": "two"})),
        ];
        for (uri, payload) in cases {
            let (status, body) = send(&app, "PATCH", uri, Some(payload)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].is_string(), "{uri}: {body}");
        }

        // Nothing moved
        let view = board_view(&app, s.board).await;
        assert_eq!(view.list(s.a).unwrap().card_ids(), s.xyz.to_vec());
    }
}
