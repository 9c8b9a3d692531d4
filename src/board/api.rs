use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::models::{
    CreatedResponse, ListBoardsQuery, MoveCardRequest, ReorderRequest, TitleRequest,
    UpdateCardRequest,
};
use super::repository::BoardRepository;
use super::ws::{BoardEvent, broadcast_event};
use crate::errors::BoardError;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub repo: Arc<BoardRepository>,
    pub ws_tx: broadcast::Sender<BoardEvent>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    fn emit(&self, event: BoardEvent) {
        broadcast_event(&self.ws_tx, event);
    }
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Timeout(String),
    Internal(String),
}

impl From<BoardError> for ApiError {
    fn from(err: BoardError) -> Self {
        let msg = err.to_string();
        match err {
            BoardError::Validation(_) | BoardError::ImportParse(_) => ApiError::BadRequest(msg),
            BoardError::NotFound { .. } => ApiError::NotFound(msg),
            BoardError::Timeout { .. } => ApiError::Timeout(msg),
            BoardError::Persistence(_) | BoardError::LockPoisoned => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(serde_json::json!({"error": message}))).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/boards", get(list_boards).post(create_board))
        .route("/api/boards/metadata", get(list_metadata))
        .route(
            "/api/boards/{id}",
            get(get_board).patch(rename_board).delete(delete_board),
        )
        .route("/api/boards/{id}/archive", post(archive_board))
        .route("/api/boards/{id}/unarchive", post(unarchive_board))
        .route("/api/boards/{id}/export", get(export_board))
        .route("/api/boards/{id}/lists", post(add_list))
        .route("/api/boards/{id}/lists/order", put(reorder_lists))
        .route(
            "/api/boards/{id}/lists/{list_id}",
            patch(rename_list).delete(delete_list),
        )
        .route("/api/boards/{id}/lists/{list_id}/cards", post(add_card))
        .route(
            "/api/boards/{id}/lists/{list_id}/cards/order",
            put(reorder_cards),
        )
        .route(
            "/api/boards/{id}/lists/{list_id}/cards/{card_id}",
            patch(update_card).delete(delete_card),
        )
        .route("/api/boards/{id}/cards/{card_id}/move", post(move_card))
        .route("/api/export", get(export_all))
        .route("/api/import", post(import_boards))
        .route("/health", get(health_check))
}

fn json_attachment(body: String, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn list_boards(
    State(state): State<SharedState>,
    Query(query): Query<ListBoardsQuery>,
) -> impl IntoResponse {
    Json(state.repo.list(query.include_archived).await)
}

async fn list_metadata(
    State(state): State<SharedState>,
    Query(query): Query<ListBoardsQuery>,
) -> impl IntoResponse {
    Json(state.repo.metadata(query.include_archived).await)
}

async fn create_board(
    State(state): State<SharedState>,
    Json(req): Json<TitleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state.repo.create(&req.title).await?;
    state.emit(BoardEvent::BoardCreated { board_id: id });
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn get_board(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.repo.get_by_id(id).await?))
}

async fn rename_board(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TitleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.repo.rename(id, &req.title).await?;
    state.emit(BoardEvent::BoardUpdated { board_id: id });
    Ok(Json(state.repo.get_by_id(id).await?))
}

async fn archive_board(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.repo.archive(id).await?;
    state.emit(BoardEvent::BoardArchived {
        board_id: id,
        archived: true,
    });
    Ok(StatusCode::NO_CONTENT)
}

async fn unarchive_board(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.repo.unarchive(id).await?;
    state.emit(BoardEvent::BoardArchived {
        board_id: id,
        archived: false,
    });
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_board(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.repo.delete(id).await?;
    state.emit(BoardEvent::BoardDeleted { board_id: id });
    Ok(StatusCode::NO_CONTENT)
}

async fn add_list(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TitleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let list_id = state.repo.add_list(id, &req.title).await?;
    state.emit(BoardEvent::ListsChanged { board_id: id });
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: list_id })))
}

async fn rename_list(
    State(state): State<SharedState>,
    Path((id, list_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<TitleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.repo.rename_list(id, list_id, &req.title).await?;
    state.emit(BoardEvent::ListsChanged { board_id: id });
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_list(
    State(state): State<SharedState>,
    Path((id, list_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    state.repo.delete_list(id, list_id).await?;
    state.emit(BoardEvent::ListsChanged { board_id: id });
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_lists(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.repo.reorder_lists(id, &req.ids).await?;
    state.emit(BoardEvent::ListsChanged { board_id: id });
    Ok(Json(state.repo.get_by_id(id).await?))
}

async fn add_card(
    State(state): State<SharedState>,
    Path((id, list_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<TitleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let card_id = state.repo.add_card(id, list_id, &req.title).await?;
    state.emit(BoardEvent::CardsChanged {
        board_id: id,
        list_id,
    });
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: card_id })))
}

async fn update_card(
    State(state): State<SharedState>,
    Path((id, list_id, card_id)): Path<(Uuid, Uuid, Uuid)>,
    Json(req): Json<UpdateCardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .repo
        .update_card(
            id,
            list_id,
            card_id,
            req.title.as_deref(),
            req.description.as_deref(),
        )
        .await?;
    state.emit(BoardEvent::CardsChanged {
        board_id: id,
        list_id,
    });
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_card(
    State(state): State<SharedState>,
    Path((id, list_id, card_id)): Path<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    state.repo.delete_card(id, list_id, card_id).await?;
    state.emit(BoardEvent::CardsChanged {
        board_id: id,
        list_id,
    });
    Ok(StatusCode::NO_CONTENT)
}

async fn reorder_cards(
    State(state): State<SharedState>,
    Path((id, list_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ReorderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.repo.reorder_cards(id, list_id, &req.ids).await?;
    state.emit(BoardEvent::CardsChanged {
        board_id: id,
        list_id,
    });
    Ok(StatusCode::NO_CONTENT)
}

async fn move_card(
    State(state): State<SharedState>,
    Path((id, card_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<MoveCardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let position = state
        .repo
        .move_card(id, req.from_list_id, req.to_list_id, card_id, req.position)
        .await?;
    state.emit(BoardEvent::CardMoved {
        board_id: id,
        card_id,
        from_list_id: req.from_list_id,
        to_list_id: req.to_list_id,
        position,
    });
    Ok(Json(state.repo.get_by_id(id).await?))
}

async fn export_board(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let body = state.repo.export_board(id).await?;
    Ok(json_attachment(body, &format!("board-{}.json", id)))
}

async fn export_all(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let body = state.repo.export_all_boards().await?;
    Ok(json_attachment(body, "boards.json"))
}

/// Takes the raw body so malformed JSON lands in the report, not a 4xx.
async fn import_boards(State(state): State<SharedState>, body: String) -> impl IntoResponse {
    let report = state.repo.import_boards(&body).await;
    if report.imported > 0 {
        state.emit(BoardEvent::BoardsImported {
            imported: report.imported,
        });
    }
    Json(report)
}

// ── Tests ─────────────────────────────────────────────────────────────
