use serde::{Deserialize, Serialize};

use crate::domain::item::LineItem;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentId(pub String);

impl std::fmt::Display for ParentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The committed parent document (approved quotation or work order) whose
/// line items are being partitioned, as read from the store when a
/// workflow opens.
///
/// `workflow_completed` is the workflow lock: once a split workflow has
/// finalized against this parent, no new workflow may open for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParentSnapshot {
    pub id: ParentId,
    pub items: Vec<LineItem>,
    pub workflow_completed: bool,
}

impl ParentSnapshot {
    /// Sum of the original quantities across every line item. The number
    /// of splits can never exceed this.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.original_quantity).sum()
    }
}
