//! Kanban board back-end: boards hold ordered lists, lists hold ordered cards.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Client  │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │          │ <─────── │    └─ api.rs  (route handlers, AppState)         │
//! └──────────┘ WebSocket│         │                                        │
//!                       │         v                                        │
//!                       │  repository.rs  (BoardRepository, cache, locks)  │
//!                       │         │  ordering.rs  (position planning)      │
//!                       │         │  transfer.rs  (export / import)        │
//!                       │         v                                        │
//!                       │  store.rs  (BoardStore trait, Change batches)    │
//!                       │     ├─ db.rs        (SQLite via DbHandle)        │
//!                       │     └─ snapshot.rs  (single JSON document)       │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module   | Responsibility                                          |
//! |----------|---------------------------------------------------------|
//! | `models` | API payloads and `ImportReport`; re-exports shared types |
//! | `ws`     | `BoardEvent`, per-board `WsFilter`, `broadcast_event()` |
//!
//! ## Typical Request Flow (move a card)
//!
//! 1. `POST /api/boards/{id}/cards/{card_id}/move` → `api::move_card()`
//! 2. `BoardRepository::move_card()` takes the board's mutex and asks
//!    `ordering::plan_card_move()` for the new positions.
//! 3. The plan is applied to a copy of the board, persisted through
//!    `BoardStore::apply()` as one batch, then swapped into the cache.
//! 4. The handler broadcasts `BoardEvent::CardMoved` to WebSocket clients.

pub mod api;
pub mod db;
pub mod models;
pub mod ordering;
pub mod repository;
pub mod server;
pub mod snapshot;
pub mod store;
#[cfg(test)]
pub(crate) mod testing;
pub mod transfer;
pub mod ws;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::{CorkboardConfig, StorageBackend};
use db::{BoardDb, DbHandle};
use repository::{BoardRepository, RepositoryOptions};
use snapshot::SnapshotStore;
use store::BoardStore;

/// Open the configured store under `project_dir` and load it into a repository.
pub async fn open_repository(
    config: &CorkboardConfig,
    project_dir: &Path,
) -> Result<BoardRepository> {
    let path = config.storage.resolved_path(project_dir);
    let store: Arc<dyn BoardStore> = match config.storage.backend {
        StorageBackend::Sqlite => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .context("Failed to create database directory")?;
            }
            let db = BoardDb::new(&path).context("Failed to initialize board database")?;
            Arc::new(DbHandle::new(db))
        }
        StorageBackend::Snapshot => Arc::new(SnapshotStore::open(&path).await?),
        StorageBackend::Memory => Arc::new(SnapshotStore::in_memory()),
    };
    debug!(backend = %config.storage.backend, path = %path.display(), "Opened board store");

    let repo = BoardRepository::new(
        store,
        RepositoryOptions {
            persist_timeout: config.storage.persist_timeout(),
            compaction: config.ordering.compaction,
        },
    );
    repo.load().await.context("Failed to load boards")?;
    Ok(repo)
}
