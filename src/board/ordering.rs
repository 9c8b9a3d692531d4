//! Position/ordering engine.
//!
//! Pure functions that plan position rewrites over the in-memory tree. They
//! never mutate anything; the repository turns their output into
//! [`Change`](super::store::Change)s and persists them.
//!
//! A sibling set is *dense* when its positions are exactly `0..n` in display
//! order with no duplicates.

use std::collections::HashSet;

use corkboard_common::{Board, List};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{BoardError, BoardResult};

/// When sibling positions are recompacted after a removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompactionPolicy {
    /// Deletes and the source side of a card move rewrite the remaining
    /// siblings to be dense in the same write.
    #[default]
    Eager,
    /// Removals leave gaps until the next explicit reorder.
    Lazy,
}

impl std::fmt::Display for CompactionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompactionPolicy::Eager => write!(f, "eager"),
            CompactionPolicy::Lazy => write!(f, "lazy"),
        }
    }
}

impl std::str::FromStr for CompactionPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eager" => Ok(CompactionPolicy::Eager),
            "lazy" => Ok(CompactionPolicy::Lazy),
            _ => anyhow::bail!(
                "Invalid compaction policy '{}'. Valid values: eager, lazy",
                s
            ),
        }
    }
}

/// Append position for a new sibling: `max(-1, positions...) + 1`.
pub fn next_position(positions: impl IntoIterator<Item = i32>) -> i32 {
    positions.into_iter().max().unwrap_or(-1) + 1
}

/// Assign each id its index in `ids`.
pub fn dense_positions(ids: &[Uuid]) -> Vec<(Uuid, i32)> {
    ids.iter()
        .enumerate()
        .map(|(idx, id)| (*id, idx as i32))
        .collect()
}

/// Positions that make `siblings` dense, keeping their current relative
/// order. Only entries whose position actually changes are returned.
pub fn compact(siblings: impl IntoIterator<Item = (Uuid, i32)>) -> Vec<(Uuid, i32)> {
    let mut ordered: Vec<(Uuid, i32)> = siblings.into_iter().collect();
    ordered.sort_by_key(|(_, pos)| *pos);
    ordered
        .into_iter()
        .enumerate()
        .filter(|(idx, (_, pos))| *idx as i32 != *pos)
        .map(|(idx, (id, _))| (id, idx as i32))
        .collect()
}

/// Check that `requested` is an exact permutation of `current`.
fn validate_order(current: &[Uuid], requested: &[Uuid], what: &str) -> BoardResult<()> {
    let mut seen = HashSet::with_capacity(requested.len());
    for id in requested {
        if !seen.insert(*id) {
            return Err(BoardError::Validation(format!(
                "Duplicate {} id {} in requested order",
                what, id
            )));
        }
        if !current.contains(id) {
            return Err(BoardError::Validation(format!(
                "{} {} does not belong here",
                what, id
            )));
        }
    }
    if requested.len() != current.len() {
        return Err(BoardError::Validation(format!(
            "Requested order names {} of {} {}s",
            requested.len(),
            current.len(),
            what
        )));
    }
    Ok(())
}

/// Plan a full list reorder for `board`. An empty order is a no-op.
pub fn plan_list_reorder(board: &Board, order: &[Uuid]) -> BoardResult<Vec<(Uuid, i32)>> {
    if order.is_empty() {
        return Ok(Vec::new());
    }
    let current: Vec<Uuid> = board.lists.iter().map(|l| l.id).collect();
    validate_order(&current, order, "list")?;
    Ok(dense_positions(order))
}

/// Plan a full card reorder within `list`. An empty order is a no-op.
pub fn plan_card_reorder(list: &List, order: &[Uuid]) -> BoardResult<Vec<(Uuid, i32)>> {
    if order.is_empty() {
        return Ok(Vec::new());
    }
    let current: Vec<Uuid> = list.cards.iter().map(|c| c.id).collect();
    validate_order(&current, order, "card")?;
    Ok(dense_positions(order))
}

/// Position rewrites produced by moving one card.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardMove {
    /// Every card of the receiving list, moved card included, dense.
    pub target: Vec<(Uuid, i32)>,
    /// Rewrites for the source list; empty under [`CompactionPolicy::Lazy`]
    /// or when source and target are the same list.
    pub source: Vec<(Uuid, i32)>,
}

/// Plan relocating `card_id` from `from_list_id` to index `new_position`
/// of `to_list_id`. Positions past the end clamp to append.
pub fn plan_card_move(
    board: &Board,
    from_list_id: Uuid,
    to_list_id: Uuid,
    card_id: Uuid,
    new_position: i32,
    policy: CompactionPolicy,
) -> BoardResult<CardMove> {
    if new_position < 0 {
        return Err(BoardError::Validation(format!(
            "Target position must not be negative (got {})",
            new_position
        )));
    }
    let from = board
        .list(from_list_id)
        .ok_or_else(|| BoardError::list_not_found(from_list_id))?;
    let to = board
        .list(to_list_id)
        .ok_or_else(|| BoardError::list_not_found(to_list_id))?;
    if from.card(card_id).is_none() {
        return Err(BoardError::card_not_found(card_id));
    }

    let mut target: Vec<Uuid> = to
        .cards
        .iter()
        .map(|c| c.id)
        .filter(|id| *id != card_id)
        .collect();
    let index = (new_position as usize).min(target.len());
    target.insert(index, card_id);

    let source = if from_list_id == to_list_id || policy == CompactionPolicy::Lazy {
        Vec::new()
    } else {
        compact(
            from.cards
                .iter()
                .filter(|c| c.id != card_id)
                .map(|c| (c.id, c.position)),
        )
    };

    Ok(CardMove {
        target: dense_positions(&target),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use corkboard_common::Card;

    fn list_with(titles: &[&str]) -> List {
        let mut list = List::new("l", 0);
        for (i, t) in titles.iter().enumerate() {
            list.cards.push(Card::new(*t, i as i32));
        }
        list
    }

    fn board_with(lists: Vec<List>) -> Board {
        let mut board = Board::new("b");
        for (i, mut list) in lists.into_iter().enumerate() {
            list.position = i as i32;
            board.lists.push(list);
        }
        board
    }

    #[test]
    fn next_position_starts_at_zero() {
        assert_eq!(next_position(Vec::new()), 0);
        assert_eq!(next_position(vec![0, 4, 2]), 5);
    }

    #[test]
    fn compact_only_reports_changed_entries() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let changed = compact(vec![(c, 7), (a, 0), (b, 3)]);
        assert_eq!(changed, vec![(b, 1), (c, 2)]);
    }

    #[test]
    fn list_reorder_assigns_indices() -> BoardResult<()> {
        let board = board_with(vec![list_with(&[]), list_with(&[]), list_with(&[])]);
        let ids: Vec<Uuid> = board.lists.iter().rev().map(|l| l.id).collect();
        let plan = plan_list_reorder(&board, &ids)?;
        assert_eq!(plan, vec![(ids[0], 0), (ids[1], 1), (ids[2], 2)]);
        Ok(())
    }

    #[test]
    fn list_reorder_is_idempotent() -> BoardResult<()> {
        let board = board_with(vec![list_with(&[]), list_with(&[])]);
        let ids: Vec<Uuid> = board.lists.iter().rev().map(|l| l.id).collect();
        assert_eq!(
            plan_list_reorder(&board, &ids)?,
            plan_list_reorder(&board, &ids)?
        );
        Ok(())
    }

    #[test]
    fn empty_order_is_noop() -> BoardResult<()> {
        let board = board_with(vec![list_with(&["a"])]);
        assert!(plan_list_reorder(&board, &[])?.is_empty());
        assert!(plan_card_reorder(&board.lists[0], &[])?.is_empty());
        Ok(())
    }

    #[test]
    fn reorder_rejects_duplicates_unknowns_and_omissions() {
        let list = list_with(&["a", "b"]);
        let (a, b) = (list.cards[0].id, list.cards[1].id);

        let dup = plan_card_reorder(&list, &[a, a]);
        assert!(matches!(dup, Err(BoardError::Validation(msg)) if msg.contains("Duplicate")));

        let unknown = plan_card_reorder(&list, &[a, Uuid::new_v4()]);
        assert!(matches!(unknown, Err(BoardError::Validation(_))));

        let partial = plan_card_reorder(&list, &[b]);
        assert!(matches!(partial, Err(BoardError::Validation(_))));
    }

    #[test]
    fn move_across_lists_inserts_and_compacts_source() -> BoardResult<()> {
        let board = board_with(vec![list_with(&["a", "b", "c"]), list_with(&["x", "y"])]);
        let (from, to) = (board.lists[0].id, board.lists[1].id);
        let moved = board.lists[0].cards[0].id;

        let plan = plan_card_move(&board, from, to, moved, 1, CompactionPolicy::Eager)?;

        let target_ids: Vec<Uuid> = plan.target.iter().map(|(id, _)| *id).collect();
        assert_eq!(target_ids[1], moved);
        assert_eq!(
            plan.target.iter().map(|(_, p)| *p).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(
            plan.source,
            vec![(board.lists[0].cards[1].id, 0), (board.lists[0].cards[2].id, 1)]
        );
        Ok(())
    }

    #[test]
    fn lazy_move_leaves_source_gap() -> BoardResult<()> {
        let board = board_with(vec![list_with(&["a", "b"]), list_with(&[])]);
        let (from, to) = (board.lists[0].id, board.lists[1].id);
        let plan = plan_card_move(
            &board,
            from,
            to,
            board.lists[0].cards[0].id,
            0,
            CompactionPolicy::Lazy,
        )?;
        assert!(plan.source.is_empty());
        assert_eq!(plan.target.len(), 1);
        Ok(())
    }

    #[test]
    fn move_clamps_past_end_and_handles_same_list() -> BoardResult<()> {
        let board = board_with(vec![list_with(&["a", "b", "c"])]);
        let list_id = board.lists[0].id;
        let first = board.lists[0].cards[0].id;

        let plan = plan_card_move(&board, list_id, list_id, first, 99, CompactionPolicy::Eager)?;
        assert_eq!(plan.target.last(), Some(&(first, 2)));
        assert!(plan.source.is_empty());
        Ok(())
    }

    #[test]
    fn move_validates_inputs() {
        let board = board_with(vec![list_with(&["a"]), list_with(&[])]);
        let (from, to) = (board.lists[0].id, board.lists[1].id);
        let card = board.lists[0].cards[0].id;

        assert!(matches!(
            plan_card_move(&board, from, to, card, -1, CompactionPolicy::Eager),
            Err(BoardError::Validation(_))
        ));
        assert!(matches!(
            plan_card_move(&board, to, from, card, 0, CompactionPolicy::Eager),
            Err(BoardError::NotFound { .. })
        ));
        assert!(matches!(
            plan_card_move(&board, from, Uuid::new_v4(), card, 0, CompactionPolicy::Eager),
            Err(BoardError::NotFound { .. })
        ));
    }

    #[test]
    fn compaction_policy_parses() -> anyhow::Result<()> {
        assert_eq!("Eager".parse::<CompactionPolicy>()?, CompactionPolicy::Eager);
        assert_eq!("lazy".parse::<CompactionPolicy>()?, CompactionPolicy::Lazy);
        assert!("sometimes".parse::<CompactionPolicy>().is_err());
        Ok(())
    }
}
