//! Typed error hierarchy for Corkboard.
//!
//! `BoardError` is returned by every repository operation. Store
//! implementations speak `anyhow` internally and are wrapped into
//! `BoardError::Persistence` at the repository boundary.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// Which kind of entity a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Board,
    List,
    Card,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Board => write!(f, "Board"),
            EntityKind::List => write!(f, "List"),
            EntityKind::Card => write!(f, "Card"),
        }
    }
}

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: Uuid },

    #[error("Persistence failed: {0:#}")]
    Persistence(#[source] anyhow::Error),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Import payload is not valid JSON: {0}")]
    ImportParse(String),

    #[error("Board lock poisoned")]
    LockPoisoned,
}

impl BoardError {
    pub fn board_not_found(id: Uuid) -> Self {
        Self::NotFound {
            kind: EntityKind::Board,
            id,
        }
    }

    pub fn list_not_found(id: Uuid) -> Self {
        Self::NotFound {
            kind: EntityKind::List,
            id,
        }
    }

    pub fn card_not_found(id: Uuid) -> Self {
        Self::NotFound {
            kind: EntityKind::Card,
            id,
        }
    }
}

pub type BoardResult<T> = Result<T, BoardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_carries_kind_and_id() {
        let id = Uuid::new_v4();
        let err = BoardError::list_not_found(id);
        match &err {
            BoardError::NotFound { kind, id: got } => {
                assert_eq!(*kind, EntityKind::List);
                assert_eq!(*got, id);
            }
            _ => panic!("Expected NotFound"),
        }
        assert!(err.to_string().starts_with("List "));
        assert!(err.to_string().contains(&id.to_string()));
    }

    #[test]
    fn persistence_error_keeps_context_chain() {
        let inner = anyhow::anyhow!("disk full").context("Failed to insert card");
        let err = BoardError::Persistence(inner);
        let msg = err.to_string();
        assert!(msg.contains("Failed to insert card"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn timeout_names_operation() {
        let err = BoardError::Timeout {
            operation: "insert_card",
            after: Duration::from_millis(250),
        };
        assert!(err.to_string().contains("insert_card"));
        assert!(matches!(err, BoardError::Timeout { .. }));
    }

    #[test]
    fn all_variants_implement_std_error() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&BoardError::Validation("x".into()));
        assert_std_error(&BoardError::ImportParse("x".into()));
        assert_std_error(&BoardError::LockPoisoned);
    }
}
