//! Board repository: the single owner of board state.
//!
//! Reads are served from an in-memory cache. Every mutation is planned
//! against a copy of the board, persisted as one [`Change`] batch, and only
//! then swapped into the cache, so a failed write leaves no trace.
//! Mutations on the same board are serialised by a per-board async mutex.
//!
//! A timed-out write may still land in the store. The affected board is then
//! marked stale and reread with [`BoardStore::load_board`]; a stale board is
//! always reread before its next mutation is planned.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use corkboard_common::{Board, BoardMetadata, Card, List};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::models::ImportReport;
use super::ordering::{self, CompactionPolicy};
use super::store::{BoardStore, Change, apply_to_board};
use super::transfer;
use crate::errors::{BoardError, BoardResult};

/// Tunables for [`BoardRepository`].
#[derive(Debug, Clone, Copy)]
pub struct RepositoryOptions {
    /// Upper bound on any single store call.
    pub persist_timeout: Duration,
    pub compaction: CompactionPolicy,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            persist_timeout: Duration::from_secs(5),
            compaction: CompactionPolicy::Eager,
        }
    }
}

pub struct BoardRepository {
    store: Arc<dyn BoardStore>,
    boards: RwLock<HashMap<Uuid, Board>>,
    board_locks: std::sync::Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
    /// Boards whose cached copy may disagree with the store.
    stale: std::sync::Mutex<HashSet<Uuid>>,
    options: RepositoryOptions,
}

/// Trim `raw` and reject it if nothing is left.
fn clean_title(raw: &str, what: &str) -> BoardResult<String> {
    let title = raw.trim();
    if title.is_empty() {
        return Err(BoardError::Validation(format!(
            "{} title must not be empty",
            what
        )));
    }
    Ok(title.to_string())
}

fn find_list(board: &Board, list_id: Uuid) -> BoardResult<&List> {
    board
        .list(list_id)
        .ok_or_else(|| BoardError::list_not_found(list_id))
}

fn find_card(board: &Board, list_id: Uuid, card_id: Uuid) -> BoardResult<&Card> {
    find_list(board, list_id)?
        .card(card_id)
        .ok_or_else(|| BoardError::card_not_found(card_id))
}

impl BoardRepository {
    pub fn new(store: Arc<dyn BoardStore>, options: RepositoryOptions) -> Self {
        Self {
            store,
            boards: RwLock::new(HashMap::new()),
            board_locks: std::sync::Mutex::new(HashMap::new()),
            stale: std::sync::Mutex::new(HashSet::new()),
            options,
        }
    }

    /// Replace the cache with the store's current contents.
    pub async fn load(&self) -> BoardResult<usize> {
        let boards = self.persist("load_all", self.store.load_all()).await?;
        let count = boards.len();
        let mut cache = self.boards.write().await;
        cache.clear();
        for mut board in boards {
            board.sort_by_position();
            cache.insert(board.id, board);
        }
        drop(cache);
        self.stale
            .lock()
            .map_err(|_| BoardError::LockPoisoned)?
            .clear();
        info!(count, "Loaded boards from store");
        Ok(count)
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// Boards ordered by creation time. Archived boards only on request.
    pub async fn list(&self, include_archived: bool) -> Vec<Board> {
        let cache = self.boards.read().await;
        let mut boards: Vec<Board> = cache
            .values()
            .filter(|b| include_archived || !b.is_archived)
            .cloned()
            .collect();
        boards.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        boards
    }

    pub async fn metadata(&self, include_archived: bool) -> Vec<BoardMetadata> {
        self.list(include_archived)
            .await
            .iter()
            .map(Board::metadata)
            .collect()
    }

    pub async fn get_by_id(&self, id: Uuid) -> BoardResult<Board> {
        self.boards
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| BoardError::board_not_found(id))
    }

    // ── Boards ────────────────────────────────────────────────────────

    pub async fn create(&self, title: &str) -> BoardResult<Uuid> {
        let board = Board::new(clean_title(title, "Board")?);
        let id = board.id;
        let written = self
            .persist(
                "insert_board",
                self.store.insert_boards(std::slice::from_ref(&board)),
            )
            .await;
        if let Err(e) = written {
            if matches!(e, BoardError::Timeout { .. }) {
                self.recover(id).await;
            }
            return Err(e);
        }
        self.boards.write().await.insert(id, board);
        info!(board_id = %id, "Created board");
        Ok(id)
    }

    pub async fn rename(&self, id: Uuid, title: &str) -> BoardResult<()> {
        let title = clean_title(title, "Board")?;
        self.mutate(id, "rename_board", move |board| {
            board.title = title;
            Ok((Vec::new(), ()))
        })
        .await
    }

    pub async fn archive(&self, id: Uuid) -> BoardResult<()> {
        self.set_archived(id, true).await
    }

    pub async fn unarchive(&self, id: Uuid) -> BoardResult<()> {
        self.set_archived(id, false).await
    }

    async fn set_archived(&self, id: Uuid, archived: bool) -> BoardResult<()> {
        self.mutate(id, "archive_board", move |board| {
            board.is_archived = archived;
            Ok((Vec::new(), ()))
        })
        .await
    }

    pub async fn delete(&self, id: Uuid) -> BoardResult<()> {
        let lock = self.board_lock(id).await?;
        let _guard = lock.lock().await;
        if !self.boards.read().await.contains_key(&id) {
            self.forget_lock(id);
            return Err(BoardError::board_not_found(id));
        }
        let deleted = self
            .persist("delete_board", self.store.delete_board(id))
            .await;
        if let Err(e) = deleted {
            if matches!(e, BoardError::Timeout { .. }) {
                self.recover(id).await;
            }
            return Err(e);
        }
        self.boards.write().await.remove(&id);
        self.board_locks
            .lock()
            .map_err(|_| BoardError::LockPoisoned)?
            .remove(&id);
        info!(board_id = %id, "Deleted board");
        Ok(())
    }

    // ── Lists ─────────────────────────────────────────────────────────

    pub async fn add_list(&self, board_id: Uuid, title: &str) -> BoardResult<Uuid> {
        let title = clean_title(title, "List")?;
        self.mutate(board_id, "add_list", move |board| {
            let position = ordering::next_position(board.lists.iter().map(|l| l.position));
            let list = List::new(title, position);
            let id = list.id;
            Ok((vec![Change::InsertList { list }], id))
        })
        .await
    }

    pub async fn rename_list(&self, board_id: Uuid, list_id: Uuid, title: &str) -> BoardResult<()> {
        let title = clean_title(title, "List")?;
        self.mutate(board_id, "rename_list", move |board| {
            find_list(board, list_id)?;
            Ok((vec![Change::UpdateListTitle { list_id, title }], ()))
        })
        .await
    }

    pub async fn delete_list(&self, board_id: Uuid, list_id: Uuid) -> BoardResult<()> {
        let policy = self.options.compaction;
        self.mutate(board_id, "delete_list", move |board| {
            find_list(board, list_id)?;
            let mut changes = vec![Change::DeleteList { list_id }];
            if policy == CompactionPolicy::Eager {
                let positions = ordering::compact(
                    board
                        .lists
                        .iter()
                        .filter(|l| l.id != list_id)
                        .map(|l| (l.id, l.position)),
                );
                if !positions.is_empty() {
                    changes.push(Change::UpsertListPositions { positions });
                }
            }
            Ok((changes, ()))
        })
        .await
    }

    // ── Cards ─────────────────────────────────────────────────────────

    pub async fn add_card(&self, board_id: Uuid, list_id: Uuid, title: &str) -> BoardResult<Uuid> {
        let title = clean_title(title, "Card")?;
        self.mutate(board_id, "add_card", move |board| {
            let list = find_list(board, list_id)?;
            let position = ordering::next_position(list.cards.iter().map(|c| c.position));
            let card = Card::new(title, position);
            let id = card.id;
            Ok((vec![Change::InsertCard { list_id, card }], id))
        })
        .await
    }

    pub async fn rename_card(
        &self,
        board_id: Uuid,
        list_id: Uuid,
        card_id: Uuid,
        title: &str,
    ) -> BoardResult<()> {
        self.update_card(board_id, list_id, card_id, Some(title), None)
            .await
    }

    pub async fn update_card_description(
        &self,
        board_id: Uuid,
        list_id: Uuid,
        card_id: Uuid,
        description: &str,
    ) -> BoardResult<()> {
        self.update_card(board_id, list_id, card_id, None, Some(description))
            .await
    }

    /// Edit a card's title and/or description in a single mutation. Fields
    /// left as `None` keep their stored value.
    pub async fn update_card(
        &self,
        board_id: Uuid,
        list_id: Uuid,
        card_id: Uuid,
        title: Option<&str>,
        description: Option<&str>,
    ) -> BoardResult<()> {
        if title.is_none() && description.is_none() {
            return Err(BoardError::Validation(
                "Nothing to update: provide title and/or description".into(),
            ));
        }
        let title = title.map(|t| clean_title(t, "Card")).transpose()?;
        let description = description.map(str::to_string);
        self.mutate(board_id, "update_card", move |board| {
            let card = find_card(board, list_id, card_id)?;
            Ok((
                vec![Change::UpdateCard {
                    card_id,
                    title: title.unwrap_or_else(|| card.title.clone()),
                    description: description.unwrap_or_else(|| card.description.clone()),
                }],
                (),
            ))
        })
        .await
    }

    pub async fn delete_card(&self, board_id: Uuid, list_id: Uuid, card_id: Uuid) -> BoardResult<()> {
        let policy = self.options.compaction;
        self.mutate(board_id, "delete_card", move |board| {
            find_card(board, list_id, card_id)?;
            let mut changes = vec![Change::DeleteCard { card_id }];
            if policy == CompactionPolicy::Eager {
                let list = find_list(board, list_id)?;
                let positions = ordering::compact(
                    list.cards
                        .iter()
                        .filter(|c| c.id != card_id)
                        .map(|c| (c.id, c.position)),
                );
                if !positions.is_empty() {
                    changes.push(Change::UpsertCardPositions { list_id, positions });
                }
            }
            Ok((changes, ()))
        })
        .await
    }

    // ── Ordering ──────────────────────────────────────────────────────

    pub async fn reorder_lists(&self, board_id: Uuid, order: &[Uuid]) -> BoardResult<()> {
        if order.is_empty() {
            self.get_by_id(board_id).await?;
            return Ok(());
        }
        let order = order.to_vec();
        self.mutate(board_id, "reorder_lists", move |board| {
            let positions = ordering::plan_list_reorder(board, &order)?;
            Ok((vec![Change::UpsertListPositions { positions }], ()))
        })
        .await
    }

    pub async fn reorder_cards(
        &self,
        board_id: Uuid,
        list_id: Uuid,
        order: &[Uuid],
    ) -> BoardResult<()> {
        if order.is_empty() {
            find_list(&self.get_by_id(board_id).await?, list_id)?;
            return Ok(());
        }
        let order = order.to_vec();
        self.mutate(board_id, "reorder_cards", move |board| {
            let positions = ordering::plan_card_reorder(find_list(board, list_id)?, &order)?;
            Ok((vec![Change::UpsertCardPositions { list_id, positions }], ()))
        })
        .await
    }

    /// Move a card and return the position it actually landed on, which is
    /// smaller than `new_position` when that lies past the end.
    pub async fn move_card(
        &self,
        board_id: Uuid,
        from_list_id: Uuid,
        to_list_id: Uuid,
        card_id: Uuid,
        new_position: i32,
    ) -> BoardResult<i32> {
        let policy = self.options.compaction;
        self.mutate(board_id, "move_card", move |board| {
            let plan = ordering::plan_card_move(
                board,
                from_list_id,
                to_list_id,
                card_id,
                new_position,
                policy,
            )?;
            let landed = plan
                .target
                .iter()
                .find(|(id, _)| *id == card_id)
                .map(|(_, position)| *position)
                .unwrap_or_default();
            let mut changes = vec![Change::UpsertCardPositions {
                list_id: to_list_id,
                positions: plan.target,
            }];
            if !plan.source.is_empty() {
                changes.push(Change::UpsertCardPositions {
                    list_id: from_list_id,
                    positions: plan.source,
                });
            }
            Ok((changes, landed))
        })
        .await
    }

    // ── Import / export ───────────────────────────────────────────────

    pub async fn export_board(&self, id: Uuid) -> BoardResult<String> {
        let board = self.get_by_id(id).await?;
        transfer::export_board(&board).map_err(BoardError::Persistence)
    }

    /// Export every board, archived ones included.
    pub async fn export_all_boards(&self) -> BoardResult<String> {
        let boards = self.list(true).await;
        transfer::export_boards(&boards).map_err(BoardError::Persistence)
    }

    /// Import boards from untrusted JSON. Never fails; see [`ImportReport`].
    pub async fn import_boards(&self, raw: &str) -> ImportReport {
        let (boards, mut report) = transfer::parse_import(raw);
        for error in &report.errors {
            warn!(%error, "Skipped import candidate");
        }
        if boards.is_empty() {
            return report;
        }

        match self
            .persist("import_boards", self.store.insert_boards(&boards))
            .await
        {
            Ok(()) => {
                let mut cache = self.boards.write().await;
                for board in boards {
                    cache.insert(board.id, board);
                }
                info!(
                    imported = report.imported,
                    skipped = report.skipped,
                    "Imported boards"
                );
            }
            Err(e) => {
                report.skipped += report.imported;
                report.imported = 0;
                report.errors.push(format!("Failed to save imported boards: {}", e));
            }
        }
        report
    }

    // ── Internals ─────────────────────────────────────────────────────

    /// Lock for a cached board. Unknown ids never get an entry.
    async fn board_lock(&self, id: Uuid) -> BoardResult<Arc<tokio::sync::Mutex<()>>> {
        if !self.boards.read().await.contains_key(&id) {
            return Err(BoardError::board_not_found(id));
        }
        let mut locks = self
            .board_locks
            .lock()
            .map_err(|_| BoardError::LockPoisoned)?;
        Ok(locks.entry(id).or_default().clone())
    }

    fn forget_lock(&self, id: Uuid) {
        if let Ok(mut locks) = self.board_locks.lock() {
            locks.remove(&id);
        }
    }

    fn is_stale(&self, id: Uuid) -> BoardResult<bool> {
        Ok(self
            .stale
            .lock()
            .map_err(|_| BoardError::LockPoisoned)?
            .contains(&id))
    }

    /// Mark `id` stale after a timed-out write and try to reread it now.
    async fn recover(&self, id: Uuid) {
        if let Ok(mut stale) = self.stale.lock() {
            stale.insert(id);
        }
        if let Err(e) = self.resync(id).await {
            warn!(board_id = %id, error = %e, "Resync after timeout failed");
        }
    }

    /// Replace the cached copy of `id` with what the store holds.
    async fn resync(&self, id: Uuid) -> BoardResult<()> {
        let stored = self
            .persist("load_board", self.store.load_board(id))
            .await?;
        {
            let mut cache = self.boards.write().await;
            match stored {
                Some(mut board) => {
                    board.sort_by_position();
                    cache.insert(id, board);
                }
                None => {
                    cache.remove(&id);
                    self.forget_lock(id);
                }
            }
        }
        self.stale
            .lock()
            .map_err(|_| BoardError::LockPoisoned)?
            .remove(&id);
        debug!(board_id = %id, "Resynced board from store");
        Ok(())
    }

    /// Run a store call under the persistence timeout.
    async fn persist<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> BoardResult<T> {
        let after = self.options.persist_timeout;
        match tokio::time::timeout(after, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(operation, error = %format!("{:#}", e), "Persistence failed");
                Err(BoardError::Persistence(e))
            }
            Err(_) => {
                warn!(operation, ?after, "Persistence timed out");
                Err(BoardError::Timeout { operation, after })
            }
        }
    }

    /// Plan, persist and commit one mutation of `board_id`.
    ///
    /// `plan` receives a working copy of the board. It may edit the board's
    /// own fields (title, archive flag) directly; everything below the board
    /// must be expressed as returned changes. The board row is always
    /// rewritten with a bumped `last_modified`.
    async fn mutate<R, F>(&self, board_id: Uuid, operation: &'static str, plan: F) -> BoardResult<R>
    where
        F: FnOnce(&mut Board) -> BoardResult<(Vec<Change>, R)>,
    {
        let lock = self.board_lock(board_id).await?;
        let _guard = lock.lock().await;

        if self.is_stale(board_id)? {
            self.resync(board_id).await?;
        }
        let mut next = match self.get_by_id(board_id).await {
            Ok(board) => board,
            Err(e) => {
                self.forget_lock(board_id);
                return Err(e);
            }
        };
        let (mut changes, out) = plan(&mut next)?;
        apply_to_board(&mut next, &changes).map_err(BoardError::Persistence)?;
        next.touch();
        changes.push(Change::UpdateBoard {
            title: next.title.clone(),
            is_archived: next.is_archived,
            last_modified: next.last_modified,
        });

        let written = self
            .persist(operation, self.store.apply(board_id, &changes))
            .await;
        if let Err(e) = written {
            if matches!(e, BoardError::Timeout { .. }) {
                self.recover(board_id).await;
            }
            return Err(e);
        }
        debug!(board_id = %board_id, operation, changes = changes.len(), "Persisted mutation");
        self.boards.write().await.insert(board_id, next);
        Ok(out)
    }
}
