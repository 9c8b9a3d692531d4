//! Shared domain types for Corkboard.
//!
//! A [`Board`] exclusively owns its [`List`]s and each list exclusively owns
//! its [`Card`]s. Sibling order is defined by the integer `position` field,
//! ascending. Serialized field names are camelCase so the same types double
//! as the local snapshot / export document format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a fresh identifier for a board, list or card.
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub position: i32,
}

impl Card {
    pub fn new(title: impl Into<String>, position: i32) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            description: String::new(),
            position,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: Uuid,
    pub title: String,
    pub position: i32,
    #[serde(default)]
    pub cards: Vec<Card>,
}

impl List {
    pub fn new(title: impl Into<String>, position: i32) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            position,
            cards: Vec::new(),
        }
    }

    pub fn card(&self, card_id: Uuid) -> Option<&Card> {
        self.cards.iter().find(|c| c.id == card_id)
    }

    pub fn card_mut(&mut self, card_id: Uuid) -> Option<&mut Card> {
        self.cards.iter_mut().find(|c| c.id == card_id)
    }

    /// Re-sort cards ascending by position.
    pub fn sort_cards(&mut self) {
        self.cards.sort_by_key(|c| c.position);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub lists: Vec<List>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    #[serde(default)]
    pub is_archived: bool,
}

impl Board {
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            title: title.into(),
            lists: Vec::new(),
            created_at: now,
            last_modified: now,
            is_archived: false,
        }
    }

    pub fn list(&self, list_id: Uuid) -> Option<&List> {
        self.lists.iter().find(|l| l.id == list_id)
    }

    pub fn list_mut(&mut self, list_id: Uuid) -> Option<&mut List> {
        self.lists.iter_mut().find(|l| l.id == list_id)
    }

    /// Bump `last_modified`, never moving it backwards even if the wall
    /// clock does.
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_modified {
            self.last_modified = now;
        }
    }

    /// Re-sort lists, and the cards of every list, ascending by position.
    pub fn sort_by_position(&mut self) {
        self.lists.sort_by_key(|l| l.position);
        for list in &mut self.lists {
            list.sort_cards();
        }
    }

    pub fn card_count(&self) -> usize {
        self.lists.iter().map(|l| l.cards.len()).sum()
    }

    pub fn metadata(&self) -> BoardMetadata {
        BoardMetadata {
            id: self.id,
            title: self.title.clone(),
            list_count: self.lists.len(),
            card_count: self.card_count(),
            created_at: self.created_at,
            last_modified: self.last_modified,
            is_archived: self.is_archived,
        }
    }
}

/// Read-only projection of a [`Board`] for listing views. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BoardMetadata {
    pub id: Uuid,
    pub title: String,
    pub list_count: usize,
    pub card_count: usize,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub is_archived: bool,
}
