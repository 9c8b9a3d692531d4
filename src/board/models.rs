//! Request/response payloads for the board API and the import result.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use corkboard_common::{Board, BoardMetadata, Card, List};

/// Outcome of an import. Partial success is normal; nothing here is fatal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct TitleRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCardRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct MoveCardRequest {
    pub from_list_id: Uuid,
    pub to_list_id: Uuid,
    pub position: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListBoardsQuery {
    #[serde(default)]
    pub include_archived: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}
