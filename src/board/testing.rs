//! Store double for exercising failure paths in tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use corkboard_common::Board;
use uuid::Uuid;

use super::snapshot::SnapshotStore;
use super::store::{BoardStore, Change};

/// In-memory store whose reads and writes can be made to fail or stall.
pub struct FlakyStore {
    inner: SnapshotStore,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    /// Stall before a write reaches the store.
    pub stall_writes: AtomicBool,
    /// Let the write land, then stall before reporting back.
    pub stall_after_commit: AtomicBool,
}

const STALL: Duration = Duration::from_secs(60);

impl FlakyStore {
    pub fn new() -> Self {
        Self {
            inner: SnapshotStore::in_memory(),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            stall_writes: AtomicBool::new(false),
            stall_after_commit: AtomicBool::new(false),
        }
    }

    fn check_read(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            anyhow::bail!("backing store unreadable");
        }
        Ok(())
    }

    async fn before_write(&self) -> Result<()> {
        if self.stall_writes.load(Ordering::SeqCst) {
            tokio::time::sleep(STALL).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("backing store unavailable");
        }
        Ok(())
    }

    async fn after_write(&self) {
        if self.stall_after_commit.load(Ordering::SeqCst) {
            tokio::time::sleep(STALL).await;
        }
    }
}

#[async_trait]
impl BoardStore for FlakyStore {
    async fn load_all(&self) -> Result<Vec<Board>> {
        self.check_read()?;
        self.inner.load_all().await
    }

    async fn load_board(&self, id: Uuid) -> Result<Option<Board>> {
        self.check_read()?;
        self.inner.load_board(id).await
    }

    async fn insert_boards(&self, boards: &[Board]) -> Result<()> {
        self.before_write().await?;
        self.inner.insert_boards(boards).await?;
        self.after_write().await;
        Ok(())
    }

    async fn apply(&self, board_id: Uuid, changes: &[Change]) -> Result<()> {
        self.before_write().await?;
        self.inner.apply(board_id, changes).await?;
        self.after_write().await;
        Ok(())
    }

    async fn delete_board(&self, id: Uuid) -> Result<()> {
        self.before_write().await?;
        self.inner.delete_board(id).await?;
        self.after_write().await;
        Ok(())
    }
}
