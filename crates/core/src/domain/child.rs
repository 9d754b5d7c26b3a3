use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::item::ChildLineItem;
use crate::domain::parent::ParentId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChildId(pub String);

impl std::fmt::Display for ChildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One produced split document (a delivery note or a purchase order).
///
/// The id is assigned by the store on creation; the engine never invents
/// one. While `is_draft` is true the record is editable and cancelable;
/// after finalize it is a committed business document and this engine must
/// never touch it again.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DraftChild {
    pub id: ChildId,
    pub parent_id: ParentId,
    pub is_draft: bool,
    pub items: Vec<ChildLineItem>,
    pub created_at: DateTime<Utc>,
}

impl DraftChild {
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::item::{ChildLineItem, ItemId, UnitId};
    use crate::domain::parent::ParentId;

    use super::{ChildId, DraftChild};

    #[test]
    fn total_quantity_sums_all_lines() {
        let child = DraftChild {
            id: ChildId("dn-17".to_string()),
            parent_id: ParentId("wo-204".to_string()),
            is_draft: true,
            items: vec![
                ChildLineItem {
                    item_id: ItemId("itm-a".to_string()),
                    quantity: 3,
                    unit: UnitId("nos".to_string()),
                    unit_price: Decimal::new(500, 2),
                },
                ChildLineItem {
                    item_id: ItemId("itm-b".to_string()),
                    quantity: 2,
                    unit: UnitId("nos".to_string()),
                    unit_price: Decimal::new(750, 2),
                },
            ],
            created_at: Utc::now(),
        };

        assert_eq!(child.total_quantity(), 5);
    }
}
