use splitflow_core::domain::child::ChildId;
use splitflow_core::domain::parent::ParentId;

/// Binds the generic engine to one concrete pair of backend resources.
///
/// The engine itself never knows whether it is splitting delivery notes or
/// purchase orders; the profile carries the collection paths, the name of
/// the parent's completion flag, and a label for log lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceProfile {
    pub child_collection: &'static str,
    pub parent_collection: &'static str,
    pub completion_field: &'static str,
    pub child_label: &'static str,
}

impl ResourceProfile {
    /// Delivery notes split from a work order.
    pub const fn delivery_notes() -> Self {
        Self {
            child_collection: "delivery-notes",
            parent_collection: "work-orders",
            completion_field: "delivery_workflow_completed",
            child_label: "delivery note",
        }
    }

    /// Partial purchase orders split from a quotation.
    pub const fn purchase_orders() -> Self {
        Self {
            child_collection: "purchase-orders",
            parent_collection: "quotations",
            completion_field: "partial_order_workflow_completed",
            child_label: "purchase order",
        }
    }

    pub fn child_collection_url(&self, base: &str) -> String {
        format!("{}/{}/", base.trim_end_matches('/'), self.child_collection)
    }

    pub fn child_url(&self, base: &str, child_id: &ChildId) -> String {
        format!("{}/{}/{}/", base.trim_end_matches('/'), self.child_collection, child_id.0)
    }

    pub fn parent_url(&self, base: &str, parent_id: &ParentId) -> String {
        format!("{}/{}/{}/", base.trim_end_matches('/'), self.parent_collection, parent_id.0)
    }
}

#[cfg(test)]
mod tests {
    use splitflow_core::domain::child::ChildId;
    use splitflow_core::domain::parent::ParentId;

    use super::ResourceProfile;

    #[test]
    fn delivery_note_urls_follow_the_resource_layout() {
        let profile = ResourceProfile::delivery_notes();
        let base = "https://erp.example.com/api/";

        assert_eq!(
            profile.child_collection_url(base),
            "https://erp.example.com/api/delivery-notes/"
        );
        assert_eq!(
            profile.child_url(base, &ChildId("41".to_string())),
            "https://erp.example.com/api/delivery-notes/41/"
        );
        assert_eq!(
            profile.parent_url(base, &ParentId("wo-9".to_string())),
            "https://erp.example.com/api/work-orders/wo-9/"
        );
    }

    #[test]
    fn profiles_use_distinct_completion_flags() {
        assert_eq!(
            ResourceProfile::delivery_notes().completion_field,
            "delivery_workflow_completed"
        );
        assert_eq!(
            ResourceProfile::purchase_orders().completion_field,
            "partial_order_workflow_completed"
        );
    }
}
