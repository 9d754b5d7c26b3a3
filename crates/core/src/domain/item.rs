use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId(pub String);

/// One line item of the parent document.
///
/// Sourced from the parent when a split workflow opens and never mutated for
/// the duration of that run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub item_id: ItemId,
    pub unit: UnitId,
    pub unit_price: Decimal,
    pub original_quantity: u32,
}

/// The slice of one parent line item carried by a single child document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChildLineItem {
    pub item_id: ItemId,
    pub quantity: u32,
    pub unit: UnitId,
    pub unit_price: Decimal,
}

impl ChildLineItem {
    pub fn from_line_item(item: &LineItem, quantity: u32) -> Self {
        Self {
            item_id: item.item_id.clone(),
            quantity,
            unit: item.unit.clone(),
            unit_price: item.unit_price,
        }
    }
}
