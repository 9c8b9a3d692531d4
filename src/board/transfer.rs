//! Import/export of boards as JSON.
//!
//! Export is a plain serialization of the board tree. Import treats its input
//! as untrusted: every candidate board is validated independently, every id
//! is regenerated, and problems are collected into an [`ImportReport`]
//! instead of being raised.

use anyhow::{Context, Result};
use chrono::Utc;
use corkboard_common::{Board, Card, List};
use serde_json::Value;

use super::models::ImportReport;
use crate::errors::BoardError;

pub fn export_board(board: &Board) -> Result<String> {
    serde_json::to_string_pretty(board).context("Failed to serialize board")
}

pub fn export_boards(boards: &[Board]) -> Result<String> {
    serde_json::to_string_pretty(boards).context("Failed to serialize boards")
}

/// Validate an import payload into fresh boards.
///
/// Accepts a single board object or an array of them. A malformed document
/// yields no boards and a single parse error.
pub fn parse_import(raw: &str) -> (Vec<Board>, ImportReport) {
    let mut report = ImportReport::default();
    let payload: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            report
                .errors
                .push(BoardError::ImportParse(e.to_string()).to_string());
            return (Vec::new(), report);
        }
    };

    let candidates = match payload {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut boards = Vec::new();
    for (idx, candidate) in candidates.iter().enumerate() {
        match board_from_value(candidate) {
            Ok(board) => {
                report.imported += 1;
                boards.push(board);
            }
            Err(reason) => {
                report.skipped += 1;
                report.errors.push(format!("Board {}: {}", idx + 1, reason));
            }
        }
    }
    (boards, report)
}

fn non_empty_title(value: &Value) -> Option<String> {
    let title = value.get("title")?.as_str()?.trim();
    (!title.is_empty()).then(|| title.to_string())
}

fn board_from_value(value: &Value) -> std::result::Result<Board, &'static str> {
    if !value.is_object() {
        return Err("expected an object");
    }
    let title = non_empty_title(value).ok_or("missing or empty title")?;
    let lists = value
        .get("lists")
        .and_then(Value::as_array)
        .ok_or("missing lists array")?;

    let mut board = Board::new(title);
    board.lists = lists
        .iter()
        .filter_map(list_from_value)
        .enumerate()
        .map(|(idx, mut list)| {
            list.position = idx as i32;
            list
        })
        .collect();
    let now = Utc::now();
    board.created_at = now;
    board.last_modified = now;
    Ok(board)
}

/// Structurally invalid lists are dropped without being reported.
fn list_from_value(value: &Value) -> Option<List> {
    let title = non_empty_title(value)?;
    let mut list = List::new(title, 0);
    if let Some(cards) = value.get("cards").and_then(Value::as_array) {
        list.cards = cards
            .iter()
            .filter_map(card_from_value)
            .enumerate()
            .map(|(idx, mut card)| {
                card.position = idx as i32;
                card
            })
            .collect();
    }
    Some(list)
}

/// Structurally invalid cards are dropped without being reported.
fn card_from_value(value: &Value) -> Option<Card> {
    let title = non_empty_title(value)?;
    let mut card = Card::new(title, 0);
    card.description = value
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(card)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_board_object_is_imported() {
        let (boards, report) =
            parse_import(r#"{"title":"X","lists":[{"title":"A","cards":[{"title":"c1"}]}]}"#);
        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped, 0);
        assert!(report.errors.is_empty());
        assert_eq!(boards[0].title, "X");
        assert_eq!(boards[0].lists[0].title, "A");
        assert_eq!(boards[0].lists[0].cards[0].title, "c1");
        assert_eq!(boards[0].lists[0].cards[0].description, "");
    }

    #[test]
    fn invalid_board_is_skipped_with_ordinal() {
        let (boards, report) = parse_import(r#"[{"title":""},{"title":"Valid","lists":[]}]"#);
        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("Board 1"));
        assert_eq!(boards[0].title, "Valid");
    }

    #[test]
    fn malformed_json_reports_one_parse_error() {
        let (boards, report) = parse_import("{not json");
        assert!(boards.is_empty());
        assert_eq!(report.imported, 0);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("not valid JSON"));
    }

    #[test]
    fn missing_lists_array_skips_board() {
        let (_, report) = parse_import(r#"[{"title":"No lists"},{"title":"Bad","lists":{}}]"#);
        assert_eq!(report.skipped, 2);
        assert!(report.errors[1].starts_with("Board 2"));
    }

    #[test]
    fn invalid_lists_and_cards_are_dropped_silently() {
        let raw = r#"{"title":"B","lists":[
            {"title":""},
            {"cards":[]},
            {"title":"Keep","cards":[{"title":""},{"title":"ok","description":5},{"title":"d","description":"text"}]}
        ]}"#;
        let (boards, report) = parse_import(raw);
        assert_eq!(report.imported, 1);
        assert!(report.errors.is_empty());
        let lists = &boards[0].lists;
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].position, 0);
        assert_eq!(lists[0].cards.len(), 2);
        assert_eq!(lists[0].cards[0].description, "");
        assert_eq!(lists[0].cards[1].description, "text");
        assert_eq!(lists[0].cards[1].position, 1);
    }

    #[test]
    fn ids_are_regenerated() -> Result<()> {
        let mut original = Board::new("Orig");
        let mut list = List::new("L", 0);
        list.cards.push(Card::new("C", 0));
        original.lists.push(list);
        original.is_archived = true;

        let exported = export_board(&original)?;
        let (boards, report) = parse_import(&exported);
        assert_eq!(report.imported, 1);

        let copy = &boards[0];
        assert_ne!(copy.id, original.id);
        assert_ne!(copy.lists[0].id, original.lists[0].id);
        assert_ne!(copy.lists[0].cards[0].id, original.lists[0].cards[0].id);
        assert_eq!(copy.lists[0].cards[0].title, "C");
        assert!(!copy.is_archived);
        Ok(())
    }

    #[test]
    fn export_all_round_trips_as_array() -> Result<()> {
        let json = export_boards(&[Board::new("a"), Board::new("b")])?;
        let (boards, report) = parse_import(&json);
        assert_eq!(report.imported, 2);
        assert_eq!(boards[1].title, "b");
        Ok(())
    }
}
