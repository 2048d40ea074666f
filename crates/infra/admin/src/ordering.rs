//! Display-position maintenance for positioned collections.
//!
//! Categories and banners carry a zero-based `sort_order` that forms a
//! dense permutation of `0..N`. Moving a record up or down exchanges its
//! position with the adjacent record; nothing else is renumbered. The
//! exchange is persisted through a single backend procedure so both rows
//! change together.

use novel_admin_core::changes::ChangeKind;
use novel_admin_core::error::{AdminError, AdminResult};
use novel_admin_core::query::{Filter, Row};
use novel_admin_core::traits::{DataAccess, DataAccessExt, Orderable};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::marker::PhantomData;

use crate::AdminConsole;

/// Procedure that exchanges the `sort_order` of two rows atomically.
pub const SWAP_SORT_ORDER: &str = "swap_sort_order";

/// A record's identity and position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSlot {
    pub id: String,
    pub sort_order: u32,
}

impl OrderSlot {
    pub fn new(id: impl Into<String>, sort_order: u32) -> Self {
        Self {
            id: id.into(),
            sort_order,
        }
    }

    /// Position of any orderable record.
    pub fn of<T: Orderable>(record: &T) -> Self {
        Self::new(record.id(), record.sort_order())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// An adjacent transposition to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSwap {
    pub moved_id: String,
    pub moved_to: u32,
    pub neighbor_id: String,
    pub neighbor_to: u32,
}

/// Works out the exchange for moving `id` one step in `direction`.
///
/// Returns `Ok(None)` when the record is already first (up) or last
/// (down), or when no record holds the adjacent position.
pub fn plan_move(slots: &[OrderSlot], id: &str, direction: Direction) -> AdminResult<Option<PlannedSwap>> {
    let moved = slots
        .iter()
        .find(|s| s.id == id)
        .ok_or_else(|| AdminError::not_found("sort_order", "id", id))?;
    let k = moved.sort_order;

    let target = match direction {
        Direction::Up => match k.checked_sub(1) {
            Some(target) => target,
            None => return Ok(None),
        },
        Direction::Down => {
            let max = slots.iter().map(|s| s.sort_order).max().unwrap_or(k);
            if k >= max {
                return Ok(None);
            }
            k + 1
        }
    };

    Ok(slots
        .iter()
        .find(|s| s.sort_order == target && s.id != id)
        .map(|neighbor| PlannedSwap {
            moved_id: moved.id.clone(),
            moved_to: target,
            neighbor_id: neighbor.id.clone(),
            neighbor_to: k,
        }))
}

/// Applies a planned exchange to local slots.
pub fn apply_swap(slots: &mut [OrderSlot], swap: &PlannedSwap) {
    for slot in slots.iter_mut() {
        if slot.id == swap.moved_id {
            slot.sort_order = swap.moved_to;
        } else if slot.id == swap.neighbor_id {
            slot.sort_order = swap.neighbor_to;
        }
    }
}

/// Returns true if positions are exactly `0..N` without repeats.
pub fn is_dense(slots: &[OrderSlot]) -> bool {
    let positions: HashSet<u32> = slots.iter().map(|s| s.sort_order).collect();
    positions.len() == slots.len() && (0..slots.len() as u32).all(|p| positions.contains(&p))
}

/// Position for a record appended at the end.
pub fn next_sort_order(slots: &[OrderSlot]) -> u32 {
    slots.len() as u32
}

/// Renumbering that closes gaps, keeping the current relative order.
///
/// Only records whose position changes are returned. Ties are broken by id.
pub fn compact_plan(slots: &[OrderSlot]) -> Vec<OrderSlot> {
    let mut sorted: Vec<&OrderSlot> = slots.iter().collect();
    sorted.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.id.cmp(&b.id)));
    sorted
        .into_iter()
        .enumerate()
        .filter(|(position, slot)| slot.sort_order != *position as u32)
        .map(|(position, slot)| OrderSlot::new(slot.id.clone(), position as u32))
        .collect()
}

/// Position operations on one orderable collection.
pub struct Positions<'a, T: Orderable> {
    console: &'a AdminConsole,
    _record: PhantomData<T>,
}

impl<'a, T: Orderable> Positions<'a, T> {
    pub(crate) fn new(console: &'a AdminConsole) -> Self {
        Self {
            console,
            _record: PhantomData,
        }
    }

    /// Current positions, ascending.
    pub async fn slots(&self) -> AdminResult<Vec<OrderSlot>> {
        let records = self
            .console
            .logged(self.console.data().fetch_all::<T>("sort_order"))
            .await?;
        Ok(records.iter().map(OrderSlot::of).collect())
    }

    /// Position for a new record.
    pub async fn next_sort_order(&self) -> AdminResult<u32> {
        Ok(next_sort_order(&self.slots().await?))
    }

    /// Moves the record one position towards the start. No-op at the top.
    pub async fn move_up(&self, id: &str) -> AdminResult<Option<PlannedSwap>> {
        self.shift(id, Direction::Up).await
    }

    /// Moves the record one position towards the end. No-op at the bottom.
    pub async fn move_down(&self, id: &str) -> AdminResult<Option<PlannedSwap>> {
        self.shift(id, Direction::Down).await
    }

    async fn shift(&self, id: &str, direction: Direction) -> AdminResult<Option<PlannedSwap>> {
        self.console.authorize()?;
        self.console
            .submit("reorder", async {
                let slots = self.slots().await?;
                let Some(swap) = plan_move(&slots, id, direction)? else {
                    tracing::debug!(collection = T::COLLECTION, id, ?direction, "move is a no-op");
                    return Ok(None);
                };
                self.console
                    .data()
                    .invoke_procedure(
                        SWAP_SORT_ORDER,
                        json!({
                            "collection": T::COLLECTION,
                            "first_id": swap.moved_id,
                            "second_id": swap.neighbor_id,
                        }),
                    )
                    .await?;
                tracing::info!(
                    collection = T::COLLECTION,
                    id,
                    to = swap.moved_to,
                    neighbor = %swap.neighbor_id,
                    "record moved"
                );
                self.console.notify(
                    T::COLLECTION,
                    ChangeKind::Reordered,
                    vec![swap.moved_id.clone(), swap.neighbor_id.clone()],
                );
                Ok::<_, AdminError>(Some(swap))
            })
            .await
    }

    /// Closes gaps left by deletions. Returns the number of rows renumbered.
    ///
    /// Each renumbered row is a separate update; the first failure stops
    /// the pass and is returned.
    pub async fn compact(&self) -> AdminResult<usize> {
        self.console.authorize()?;
        self.console
            .submit("compact positions", async {
                let plan = compact_plan(&self.slots().await?);
                for slot in &plan {
                    let mut patch = Row::new();
                    patch.insert("sort_order".into(), json!(slot.sort_order));
                    self.console
                        .data()
                        .update(T::COLLECTION, patch, &[Filter::eq(T::KEY, slot.id.as_str())])
                        .await?;
                }
                if !plan.is_empty() {
                    tracing::info!(collection = T::COLLECTION, renumbered = plan.len(), "positions compacted");
                    self.console.notify(
                        T::COLLECTION,
                        ChangeKind::Reordered,
                        plan.iter().map(|s| s.id.clone()).collect(),
                    );
                }
                Ok::<_, AdminError>(plan.len())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slots(orders: &[u32]) -> Vec<OrderSlot> {
        orders
            .iter()
            .enumerate()
            .map(|(i, o)| OrderSlot::new(format!("r{}", i), *o))
            .collect()
    }

    #[test]
    fn test_move_up_last_of_three() {
        let mut s = slots(&[0, 1, 2]);
        let swap = plan_move(&s, "r2", Direction::Up).unwrap().unwrap();
        assert_eq!(swap.moved_to, 1);
        assert_eq!(swap.neighbor_id, "r1");
        assert_eq!(swap.neighbor_to, 2);
        apply_swap(&mut s, &swap);
        let orders: Vec<u32> = s.iter().map(|x| x.sort_order).collect();
        assert_eq!(orders, vec![0, 2, 1]);
        assert!(is_dense(&s));
    }

    #[test]
    fn test_boundaries_are_no_ops() {
        let s = slots(&[0, 1, 2]);
        assert_eq!(plan_move(&s, "r0", Direction::Up).unwrap(), None);
        assert_eq!(plan_move(&s, "r2", Direction::Down).unwrap(), None);
    }

    #[test]
    fn test_up_then_down_restores() {
        for n in 2..8u32 {
            let original = slots(&(0..n).collect::<Vec<_>>());
            for i in 1..n {
                let id = format!("r{}", i);
                let mut s = original.clone();
                let up = plan_move(&s, &id, Direction::Up).unwrap().unwrap();
                apply_swap(&mut s, &up);
                assert!(is_dense(&s));
                let down = plan_move(&s, &id, Direction::Down).unwrap().unwrap();
                apply_swap(&mut s, &down);
                assert_eq!(s, original);
            }
        }
    }

    #[test]
    fn test_missing_neighbor_is_no_op() {
        let s = slots(&[0, 2]);
        assert_eq!(plan_move(&s, "r1", Direction::Up).unwrap(), None);
    }

    #[test]
    fn test_unknown_id() {
        let s = slots(&[0]);
        assert!(matches!(
            plan_move(&s, "nope", Direction::Up),
            Err(AdminError::NotFound { .. })
        ));
    }

    #[test]
    fn test_density_and_compaction() {
        let gappy = slots(&[0, 2, 5]);
        assert!(!is_dense(&gappy));
        assert_eq!(next_sort_order(&gappy), 3);
        let plan = compact_plan(&gappy);
        assert_eq!(plan, vec![OrderSlot::new("r1", 1), OrderSlot::new("r2", 2)]);
        assert!(compact_plan(&slots(&[0, 1, 2])).is_empty());
        assert!(!is_dense(&slots(&[0, 0, 1])));
    }
}
