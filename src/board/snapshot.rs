//! Document-backed store.
//!
//! Keeps the whole board collection as one JSON array (the same shape as
//! "export all") and rewrites it after every successful write. Without a
//! path it is a pure in-memory store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use corkboard_common::Board;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{BoardStore, Change, apply_to_board};

pub struct SnapshotStore {
    boards: Mutex<Vec<Board>>,
    path: Option<PathBuf>,
}

impl SnapshotStore {
    /// Open the snapshot at `path`, starting empty if the file does not exist.
    pub async fn open(path: &Path) -> Result<Self> {
        let boards = match tokio::fs::read_to_string(path).await {
            Ok(raw) if raw.trim().is_empty() => Vec::new(),
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse snapshot {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read snapshot {}", path.display()));
            }
        };
        Ok(Self {
            boards: Mutex::new(boards),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            boards: Mutex::new(Vec::new()),
            path: None,
        }
    }

    /// Write `boards` to disk via a temp file + rename so readers never see
    /// a half-written document.
    async fn flush(&self, boards: &[Board]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create snapshot directory")?;
        }
        let json = serde_json::to_string_pretty(boards).context("Failed to serialize boards")?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Run `edit` against a copy of the collection, flush it, then commit.
    async fn write_with<F>(&self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<Board>) -> Result<()>,
    {
        let mut guard = self.boards.lock().await;
        let mut next = guard.clone();
        edit(&mut next)?;
        self.flush(&next).await?;
        *guard = next;
        Ok(())
    }
}

#[async_trait]
impl BoardStore for SnapshotStore {
    async fn load_all(&self) -> Result<Vec<Board>> {
        let mut boards = self.boards.lock().await.clone();
        for board in &mut boards {
            board.sort_by_position();
        }
        Ok(boards)
    }

    async fn load_board(&self, id: Uuid) -> Result<Option<Board>> {
        let boards = self.boards.lock().await;
        Ok(boards.iter().find(|b| b.id == id).cloned().map(|mut b| {
            b.sort_by_position();
            b
        }))
    }

    async fn insert_boards(&self, boards: &[Board]) -> Result<()> {
        self.write_with(|all| {
            for board in boards {
                anyhow::ensure!(
                    all.iter().all(|b| b.id != board.id),
                    "Board {} already exists",
                    board.id
                );
                all.push(board.clone());
            }
            Ok(())
        })
        .await
    }

    async fn apply(&self, board_id: Uuid, changes: &[Change]) -> Result<()> {
        self.write_with(|all| {
            let board = all
                .iter_mut()
                .find(|b| b.id == board_id)
                .with_context(|| format!("Board {} not found", board_id))?;
            apply_to_board(board, changes)
        })
        .await
    }

    async fn delete_board(&self, id: Uuid) -> Result<()> {
        self.write_with(|all| {
            let before = all.len();
            all.retain(|b| b.id != id);
            anyhow::ensure!(all.len() < before, "Board {} not found", id);
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corkboard_common::List;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_opens_empty() -> Result<()> {
        let dir = TempDir::new()?;
        let store = SnapshotStore::open(&dir.path().join("boards.json")).await?;
        assert!(store.load_all().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn writes_survive_reopen() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested").join("boards.json");
        let board = Board::new("Sprint 1");
        let list = List::new("Todo", 0);
        {
            let store = SnapshotStore::open(&path).await?;
            store.insert_boards(std::slice::from_ref(&board)).await?;
            store
                .apply(board.id, &[Change::InsertList { list: list.clone() }])
                .await?;
        }

        let reopened = SnapshotStore::open(&path).await?;
        let loaded = reopened.load_board(board.id).await?.expect("board");
        assert_eq!(loaded.lists, vec![list]);
        Ok(())
    }

    #[tokio::test]
    async fn failed_apply_leaves_collection_untouched() -> Result<()> {
        let store = SnapshotStore::in_memory();
        let board = Board::new("b");
        store.insert_boards(std::slice::from_ref(&board)).await?;

        let result = store
            .apply(
                board.id,
                &[
                    Change::InsertList {
                        list: List::new("kept?", 0),
                    },
                    Change::DeleteList {
                        list_id: Uuid::new_v4(),
                    },
                ],
            )
            .await;
        assert!(result.is_err());
        let loaded = store.load_board(board.id).await?.expect("board");
        assert!(loaded.lists.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() -> Result<()> {
        let store = SnapshotStore::in_memory();
        let board = Board::new("b");
        store.insert_boards(std::slice::from_ref(&board)).await?;
        assert!(store.insert_boards(&[board]).await.is_err());
        assert_eq!(store.load_all().await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn delete_unknown_board_fails() {
        let store = SnapshotStore::in_memory();
        assert!(store.delete_board(Uuid::new_v4()).await.is_err());
    }
}
