//! Persistence boundary.
//!
//! The repository never touches a backing store directly; it describes each
//! mutation as a batch of [`Change`]s against one board and hands the batch
//! to a [`BoardStore`], which must apply it all-or-nothing.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use corkboard_common::{Board, Card, List};
use uuid::Uuid;

/// A single row-level write scoped to one board.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Rewrite the board row (title, archive flag, modification time).
    UpdateBoard {
        title: String,
        is_archived: bool,
        last_modified: DateTime<Utc>,
    },
    InsertList {
        list: List,
    },
    UpdateListTitle {
        list_id: Uuid,
        title: String,
    },
    /// Deletes the list and every card it owns.
    DeleteList {
        list_id: Uuid,
    },
    /// Bulk position rewrite for lists of the board.
    UpsertListPositions {
        positions: Vec<(Uuid, i32)>,
    },
    InsertCard {
        list_id: Uuid,
        card: Card,
    },
    UpdateCard {
        card_id: Uuid,
        title: String,
        description: String,
    },
    DeleteCard {
        card_id: Uuid,
    },
    /// Bulk position rewrite for cards, re-parenting each one under `list_id`.
    UpsertCardPositions {
        list_id: Uuid,
        positions: Vec<(Uuid, i32)>,
    },
}

/// Backing store for boards.
///
/// All operations are async so remote and local backends share one surface.
/// Reads return lists and cards sorted ascending by position.
#[async_trait]
pub trait BoardStore: Send + Sync {
    /// Select every board with its full list/card tree.
    async fn load_all(&self) -> Result<Vec<Board>>;

    /// Select one board by id.
    async fn load_board(&self, id: Uuid) -> Result<Option<Board>>;

    /// Insert complete board trees in a single batch write.
    async fn insert_boards(&self, boards: &[Board]) -> Result<()>;

    /// Apply a batch of changes to one board atomically.
    async fn apply(&self, board_id: Uuid, changes: &[Change]) -> Result<()>;

    /// Delete a board and everything it owns.
    async fn delete_board(&self, id: Uuid) -> Result<()>;
}

/// Apply `changes` to an in-memory board tree.
///
/// Used by the document-backed stores, which keep a mirror of the whole
/// collection and serialize it after each write.
pub fn apply_to_board(board: &mut Board, changes: &[Change]) -> Result<()> {
    for change in changes {
        match change {
            Change::UpdateBoard {
                title,
                is_archived,
                last_modified,
            } => {
                board.title = title.clone();
                board.is_archived = *is_archived;
                board.last_modified = *last_modified;
            }
            Change::InsertList { list } => {
                anyhow::ensure!(
                    board.list(list.id).is_none(),
                    "List {} already exists",
                    list.id
                );
                board.lists.push(list.clone());
            }
            Change::UpdateListTitle { list_id, title } => {
                let list = board
                    .list_mut(*list_id)
                    .with_context(|| format!("List {} not found", list_id))?;
                list.title = title.clone();
            }
            Change::DeleteList { list_id } => {
                let before = board.lists.len();
                board.lists.retain(|l| l.id != *list_id);
                anyhow::ensure!(board.lists.len() < before, "List {} not found", list_id);
            }
            Change::UpsertListPositions { positions } => {
                for (list_id, position) in positions {
                    let list = board
                        .list_mut(*list_id)
                        .with_context(|| format!("List {} not found", list_id))?;
                    list.position = *position;
                }
            }
            Change::InsertCard { list_id, card } => {
                let list = board
                    .list_mut(*list_id)
                    .with_context(|| format!("List {} not found", list_id))?;
                list.cards.push(card.clone());
            }
            Change::UpdateCard {
                card_id,
                title,
                description,
            } => {
                let card = board
                    .lists
                    .iter_mut()
                    .find_map(|l| l.card_mut(*card_id))
                    .with_context(|| format!("Card {} not found", card_id))?;
                card.title = title.clone();
                card.description = description.clone();
            }
            Change::DeleteCard { card_id } => {
                let removed = board.lists.iter_mut().any(|l| {
                    let before = l.cards.len();
                    l.cards.retain(|c| c.id != *card_id);
                    l.cards.len() < before
                });
                anyhow::ensure!(removed, "Card {} not found", card_id);
            }
            Change::UpsertCardPositions { list_id, positions } => {
                for (card_id, position) in positions {
                    let mut card = take_card(board, *card_id)
                        .with_context(|| format!("Card {} not found", card_id))?;
                    card.position = *position;
                    board
                        .list_mut(*list_id)
                        .with_context(|| format!("List {} not found", list_id))?
                        .cards
                        .push(card);
                }
            }
        }
    }
    board.sort_by_position();
    Ok(())
}

fn take_card(board: &mut Board, card_id: Uuid) -> Option<Card> {
    board.lists.iter_mut().find_map(|l| {
        let idx = l.cards.iter().position(|c| c.id == card_id)?;
        Some(l.cards.remove(idx))
    })
}
