//! Pure quantity bookkeeping for a split workflow.
//!
//! The ledger tracks, per parent line item, how much quantity is still
//! unassigned and which child holds which slice. It performs no I/O; the
//! workflow engine is responsible for keeping it in lockstep with the
//! store-backed child list.
//!
//! Two invariants hold after every operation:
//! - conservation: `remaining + sum(assignments) == original_quantity` for
//!   every item;
//! - at most one assignment per `(item, child_index)` pair — re-assigning
//!   replaces, never adds.

use thiserror::Error;

use crate::domain::item::{ChildLineItem, ItemId, LineItem};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AllocationError {
    #[error("invalid quantity for item `{item_id}`: requested {requested}, available {available}")]
    InvalidQuantity { item_id: String, requested: u32, available: u32 },
    #[error("unknown line item: `{0}`")]
    UnknownItem(String),
}

/// A slice of one item's quantity held by the child at `child_index`.
///
/// Child indices are positional: index N is the N-th created child. The
/// workflow engine re-labels assignments through [`AllocationLedger::release_child`]
/// whenever a child is removed, so indices stay dense.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignment {
    pub child_index: usize,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AllocationEntry {
    pub item: LineItem,
    pub remaining: u32,
    pub assignments: Vec<Assignment>,
}

impl AllocationEntry {
    fn seeded(item: LineItem) -> Self {
        let remaining = item.original_quantity;
        Self { item, remaining, assignments: Vec::new() }
    }

    pub fn assigned_total(&self) -> u32 {
        self.assignments.iter().map(|assignment| assignment.quantity).sum()
    }

    fn assignment_for(&self, child_index: usize) -> Option<usize> {
        self.assignments.iter().position(|assignment| assignment.child_index == child_index)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AllocationLedger {
    entries: Vec<AllocationEntry>,
}

impl AllocationLedger {
    /// Seed one entry per line item with the full quantity remaining and no
    /// assignments.
    pub fn new(items: &[LineItem]) -> Self {
        Self { entries: items.iter().cloned().map(AllocationEntry::seeded).collect() }
    }

    pub fn entries(&self) -> &[AllocationEntry] {
        &self.entries
    }

    pub fn entry(&self, item_id: &ItemId) -> Option<&AllocationEntry> {
        self.entries.iter().find(|entry| &entry.item.item_id == item_id)
    }

    pub fn remaining(&self, item_id: &ItemId) -> Option<u32> {
        self.entry(item_id).map(|entry| entry.remaining)
    }

    pub fn line_items(&self) -> Vec<LineItem> {
        self.entries.iter().map(|entry| entry.item.clone()).collect()
    }

    pub fn total_original_quantity(&self) -> u32 {
        self.entries.iter().map(|entry| entry.item.original_quantity).sum()
    }

    /// Assign `quantity` of an item to the child at `child_index`,
    /// replacing any slice that child already holds for the item.
    ///
    /// The amount available to a child is the unassigned remainder plus
    /// whatever the same child already holds. A quantity of zero clears the
    /// child's slice for this item.
    pub fn assign(
        &mut self,
        item_id: &ItemId,
        child_index: usize,
        quantity: u32,
    ) -> Result<(), AllocationError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| &entry.item.item_id == item_id)
            .ok_or_else(|| AllocationError::UnknownItem(item_id.0.clone()))?;

        let prior = entry.assignment_for(child_index);
        let prior_quantity = prior.map(|pos| entry.assignments[pos].quantity).unwrap_or(0);
        let available = entry.remaining + prior_quantity;
        if quantity > available {
            return Err(AllocationError::InvalidQuantity {
                item_id: item_id.0.clone(),
                requested: quantity,
                available,
            });
        }

        if let Some(pos) = prior {
            entry.assignments.remove(pos);
        }
        entry.remaining = available - quantity;
        if quantity > 0 {
            entry.assignments.push(Assignment { child_index, quantity });
        }
        Ok(())
    }

    /// Return the quantities held by the child at `child_index` to the
    /// remainder and shift every later assignment down one index, keeping
    /// indices dense after a child is removed.
    pub fn release_child(&mut self, child_index: usize) {
        for entry in &mut self.entries {
            if let Some(pos) = entry.assignment_for(child_index) {
                let released = entry.assignments.remove(pos);
                entry.remaining += released.quantity;
            }
            for assignment in &mut entry.assignments {
                if assignment.child_index > child_index {
                    assignment.child_index -= 1;
                }
            }
        }
    }

    /// Drop every assignment and restore the full original quantities.
    pub fn reset(&mut self) {
        for entry in &mut self.entries {
            entry.remaining = entry.item.original_quantity;
            entry.assignments.clear();
        }
    }

    /// The line items the child at `child_index` would carry. Items with no
    /// slice for this child are omitted.
    pub fn items_for_child(&self, child_index: usize) -> Vec<ChildLineItem> {
        self.entries
            .iter()
            .filter_map(|entry| {
                entry
                    .assignment_for(child_index)
                    .map(|pos| entry.assignments[pos].quantity)
                    .map(|quantity| ChildLineItem::from_line_item(&entry.item, quantity))
            })
            .collect()
    }

    /// True when at least one item has a nonzero slice at `child_index`. A
    /// child with zero total quantity is not a valid child.
    pub fn has_assignment_for(&self, child_index: usize) -> bool {
        self.entries.iter().any(|entry| entry.assignment_for(child_index).is_some())
    }

    /// True when every item's remaining quantity has reached zero.
    pub fn is_exhausted(&self) -> bool {
        self.entries.iter().all(|entry| entry.remaining == 0)
    }

    pub fn total_remaining(&self) -> u32 {
        self.entries.iter().map(|entry| entry.remaining).sum()
    }

    #[cfg(test)]
    fn conserves_quantities(&self) -> bool {
        self.entries
            .iter()
            .all(|entry| entry.remaining + entry.assigned_total() == entry.item.original_quantity)
    }
}
