use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use corkboard_common::{Board, Card, List};
use rusqlite::{Connection, Transaction, params};
use uuid::Uuid;

use super::store::{BoardStore, Change};

/// Async-safe handle to the board database.
///
/// Wraps `BoardDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, preventing synchronous SQLite
/// I/O from tying up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<BoardDb>>,
}

impl DbHandle {
    pub fn new(db: BoardDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&BoardDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|e| anyhow::anyhow!("DB lock poisoned: {}", e))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

#[async_trait]
impl BoardStore for DbHandle {
    async fn load_all(&self) -> Result<Vec<Board>> {
        self.call(|db| db.load_all()).await
    }

    async fn load_board(&self, id: Uuid) -> Result<Option<Board>> {
        self.call(move |db| db.load_board(id)).await
    }

    async fn insert_boards(&self, boards: &[Board]) -> Result<()> {
        let boards = boards.to_vec();
        self.call(move |db| db.insert_boards(&boards)).await
    }

    async fn apply(&self, board_id: Uuid, changes: &[Change]) -> Result<()> {
        let changes = changes.to_vec();
        self.call(move |db| db.apply(board_id, &changes)).await
    }

    async fn delete_board(&self, id: Uuid) -> Result<()> {
        self.call(move |db| db.delete_board(id)).await
    }
}

pub struct BoardDb {
    conn: Connection,
}

impl BoardDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS boards (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL,
                    is_archived INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS lists (
                    id TEXT PRIMARY KEY,
                    board_id TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    position INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS cards (
                    id TEXT PRIMARY KEY,
                    list_id TEXT NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    position INTEGER NOT NULL DEFAULT 0
                );

                CREATE INDEX IF NOT EXISTS idx_lists_board ON lists(board_id);
                CREATE INDEX IF NOT EXISTS idx_cards_list ON cards(list_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Reads ─────────────────────────────────────────────────────────

    pub fn load_all(&self) -> Result<Vec<Board>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, title, is_archived, created_at, updated_at
                 FROM boards ORDER BY created_at, id",
            )
            .context("Failed to prepare load_all")?;
        let rows = stmt
            .query_map([], BoardRow::from_row)
            .context("Failed to query boards")?;
        let mut boards = Vec::new();
        for row in rows {
            boards.push(row.context("Failed to read board row")?.into_board()?);
        }

        let mut lists_by_board = self.select_lists(None)?;
        let mut cards_by_list = self.select_cards(None)?;
        for board in &mut boards {
            board.lists = lists_by_board.remove(&board.id).unwrap_or_default();
            for list in &mut board.lists {
                list.cards = cards_by_list.remove(&list.id).unwrap_or_default();
            }
        }
        Ok(boards)
    }

    pub fn load_board(&self, id: Uuid) -> Result<Option<Board>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, title, is_archived, created_at, updated_at
                 FROM boards WHERE id = ?1",
            )
            .context("Failed to prepare load_board")?;
        let mut rows = stmt
            .query_map(params![id.to_string()], BoardRow::from_row)
            .context("Failed to query board")?;
        let mut board = match rows.next() {
            Some(row) => row.context("Failed to read board row")?.into_board()?,
            None => return Ok(None),
        };

        board.lists = self
            .select_lists(Some(id))?
            .remove(&id)
            .unwrap_or_default();
        let mut cards_by_list = self.select_cards(Some(id))?;
        for list in &mut board.lists {
            list.cards = cards_by_list.remove(&list.id).unwrap_or_default();
        }
        Ok(Some(board))
    }

    /// Lists grouped by board, each group sorted ascending by position.
    fn select_lists(&self, board_id: Option<Uuid>) -> Result<HashMap<Uuid, Vec<List>>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, board_id, title, position FROM lists
                 WHERE ?1 IS NULL OR board_id = ?1
                 ORDER BY board_id, position",
            )
            .context("Failed to prepare select_lists")?;
        let rows = stmt
            .query_map(params![board_id.map(|id| id.to_string())], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)?,
                ))
            })
            .context("Failed to query lists")?;
        let mut grouped: HashMap<Uuid, Vec<List>> = HashMap::new();
        for row in rows {
            let (id, board_id, title, position) = row.context("Failed to read list row")?;
            grouped.entry(parse_id(&board_id)?).or_default().push(List {
                id: parse_id(&id)?,
                title,
                position,
                cards: Vec::new(),
            });
        }
        Ok(grouped)
    }

    /// Cards grouped by list, each group sorted ascending by position.
    fn select_cards(&self, board_id: Option<Uuid>) -> Result<HashMap<Uuid, Vec<Card>>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT c.id, c.list_id, c.title, c.description, c.position
                 FROM cards c JOIN lists l ON l.id = c.list_id
                 WHERE ?1 IS NULL OR l.board_id = ?1
                 ORDER BY c.list_id, c.position",
            )
            .context("Failed to prepare select_cards")?;
        let rows = stmt
            .query_map(params![board_id.map(|id| id.to_string())], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, i32>(4)?,
                ))
            })
            .context("Failed to query cards")?;
        let mut grouped: HashMap<Uuid, Vec<Card>> = HashMap::new();
        for row in rows {
            let (id, list_id, title, description, position) =
                row.context("Failed to read card row")?;
            grouped.entry(parse_id(&list_id)?).or_default().push(Card {
                id: parse_id(&id)?,
                title,
                description,
                position,
            });
        }
        Ok(grouped)
    }

    // ── Writes ────────────────────────────────────────────────────────

    pub fn insert_boards(&self, boards: &[Board]) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        for board in boards {
            tx.execute(
                "INSERT INTO boards (id, title, is_archived, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    board.id.to_string(),
                    board.title,
                    board.is_archived,
                    board.created_at.to_rfc3339(),
                    board.last_modified.to_rfc3339(),
                ],
            )
            .with_context(|| format!("Failed to insert board {}", board.id))?;
            for list in &board.lists {
                insert_list(&tx, board.id, list)?;
                for card in &list.cards {
                    insert_card(&tx, list.id, card)?;
                }
            }
        }
        tx.commit().context("Failed to commit board insert")?;
        Ok(())
    }

    pub fn apply(&self, board_id: Uuid, changes: &[Change]) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        for change in changes {
            apply_change(&tx, board_id, change)?;
        }
        tx.commit().context("Failed to commit board changes")?;
        Ok(())
    }

    pub fn delete_board(&self, id: Uuid) -> Result<()> {
        let count = self
            .conn
            .execute("DELETE FROM boards WHERE id = ?1", params![id.to_string()])
            .context("Failed to delete board")?;
        anyhow::ensure!(count > 0, "Board {} not found", id);
        Ok(())
    }
}

fn apply_change(tx: &Transaction<'_>, board_id: Uuid, change: &Change) -> Result<()> {
    let board_key = board_id.to_string();
    match change {
        Change::UpdateBoard {
            title,
            is_archived,
            last_modified,
        } => {
            let count = tx
                .execute(
                    "UPDATE boards SET title = ?1, is_archived = ?2, updated_at = ?3 WHERE id = ?4",
                    params![title, is_archived, last_modified.to_rfc3339(), board_key],
                )
                .context("Failed to update board")?;
            anyhow::ensure!(count > 0, "Board {} not found", board_id);
        }
        Change::InsertList { list } => insert_list(tx, board_id, list)?,
        Change::UpdateListTitle { list_id, title } => {
            let count = tx
                .execute(
                    "UPDATE lists SET title = ?1 WHERE id = ?2 AND board_id = ?3",
                    params![title, list_id.to_string(), board_key],
                )
                .context("Failed to update list")?;
            anyhow::ensure!(count > 0, "List {} not found", list_id);
        }
        Change::DeleteList { list_id } => {
            let count = tx
                .execute(
                    "DELETE FROM lists WHERE id = ?1 AND board_id = ?2",
                    params![list_id.to_string(), board_key],
                )
                .context("Failed to delete list")?;
            anyhow::ensure!(count > 0, "List {} not found", list_id);
        }
        Change::UpsertListPositions { positions } => {
            let mut stmt = tx
                .prepare("UPDATE lists SET position = ?1 WHERE id = ?2 AND board_id = ?3")
                .context("Failed to prepare list position upsert")?;
            for (list_id, position) in positions {
                let count = stmt
                    .execute(params![position, list_id.to_string(), board_key])
                    .context("Failed to upsert list position")?;
                anyhow::ensure!(count > 0, "List {} not found", list_id);
            }
        }
        Change::InsertCard { list_id, card } => insert_card(tx, *list_id, card)?,
        Change::UpdateCard {
            card_id,
            title,
            description,
        } => {
            let count = tx
                .execute(
                    "UPDATE cards SET title = ?1, description = ?2 WHERE id = ?3",
                    params![title, description, card_id.to_string()],
                )
                .context("Failed to update card")?;
            anyhow::ensure!(count > 0, "Card {} not found", card_id);
        }
        Change::DeleteCard { card_id } => {
            let count = tx
                .execute(
                    "DELETE FROM cards WHERE id = ?1",
                    params![card_id.to_string()],
                )
                .context("Failed to delete card")?;
            anyhow::ensure!(count > 0, "Card {} not found", card_id);
        }
        Change::UpsertCardPositions { list_id, positions } => {
            let mut stmt = tx
                .prepare("UPDATE cards SET list_id = ?1, position = ?2 WHERE id = ?3")
                .context("Failed to prepare card position upsert")?;
            for (card_id, position) in positions {
                let count = stmt
                    .execute(params![list_id.to_string(), position, card_id.to_string()])
                    .context("Failed to upsert card position")?;
                anyhow::ensure!(count > 0, "Card {} not found", card_id);
            }
        }
    }
    Ok(())
}

fn insert_list(tx: &Transaction<'_>, board_id: Uuid, list: &List) -> Result<()> {
    tx.execute(
        "INSERT INTO lists (id, board_id, title, position) VALUES (?1, ?2, ?3, ?4)",
        params![
            list.id.to_string(),
            board_id.to_string(),
            list.title,
            list.position
        ],
    )
    .with_context(|| format!("Failed to insert list {}", list.id))?;
    Ok(())
}

fn insert_card(tx: &Transaction<'_>, list_id: Uuid, card: &Card) -> Result<()> {
    tx.execute(
        "INSERT INTO cards (id, list_id, title, description, position) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            card.id.to_string(),
            list_id.to_string(),
            card.title,
            card.description,
            card.position
        ],
    )
    .with_context(|| format!("Failed to insert card {}", card.id))?;
    Ok(())
}

fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Invalid id in database: {}", raw))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid timestamp in database: {}", raw))?
        .with_timezone(&Utc))
}

/// Intermediate row struct for boards.
struct BoardRow {
    id: String,
    title: String,
    is_archived: bool,
    created_at: String,
    updated_at: String,
}

impl BoardRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            is_archived: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    fn into_board(self) -> Result<Board> {
        Ok(Board {
            id: parse_id(&self.id)?,
            title: self.title,
            lists: Vec::new(),
            created_at: parse_timestamp(&self.created_at)?,
            last_modified: parse_timestamp(&self.updated_at)?,
            is_archived: self.is_archived,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────
