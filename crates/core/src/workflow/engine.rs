//! The draft lifecycle manager.
//!
//! [`SplitWorkflow`] drives one operator's partition run for one parent
//! document: it owns the allocation ledger and the ordered list of created
//! draft children, and translates ledger state into store effects. Store
//! failures never leave the two out of step — every mutating operation
//! either completes or changes nothing locally.

use tracing::{debug, info};

use crate::domain::child::DraftChild;
use crate::domain::item::{ItemId, LineItem};
use crate::domain::parent::ParentId;
use crate::errors::WorkflowError;
use crate::ledger::AllocationLedger;
use crate::store::{SplitStore, StoreError};

use super::guard::{self, CleanupOutcome};

use thiserror::Error;

/// State-contract violations. These are programming errors at the call
/// site, not user-facing recoverable conditions.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("a split workflow has already completed for parent `{0}`")]
    WorkflowAlreadyCompleted(String),
    #[error("parent `{0}` has no line items to partition")]
    NoLineItems(String),
    #[error("target count {requested} is outside the valid range 1..={max}")]
    TargetCountOutOfRange { requested: u32, max: u32 },
    #[error("target count is locked once children exist ({created} created)")]
    TargetLocked { created: usize },
    #[error("children are generated in order: expected index {expected}, got {requested}")]
    OutOfOrderGenerate { expected: usize, requested: usize },
    #[error("all {target} children have already been generated")]
    TargetReached { target: u32 },
    #[error("child {child_index} has no items with a positive quantity")]
    EmptyChild { child_index: usize },
    #[error("no created child at index {child_index} ({created} created)")]
    UnknownChild { child_index: usize, created: usize },
    #[error("cannot finalize: {created} of {target} children generated")]
    MissingChildren { created: usize, target: u32 },
    #[error("cannot finalize: {remaining} quantity still unassigned")]
    NotFullyAllocated { remaining: u32 },
    #[error("the workflow is already finalized")]
    AlreadyCompleted,
}

pub struct SplitWorkflow<S: SplitStore> {
    store: S,
    parent_id: ParentId,
    target_count: u32,
    ledger: AllocationLedger,
    created: Vec<DraftChild>,
    completed: bool,
}

impl<S: SplitStore> std::fmt::Debug for SplitWorkflow<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitWorkflow")
            .field("parent_id", &self.parent_id)
            .field("target_count", &self.target_count)
            .field("created", &self.created.len())
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}

impl<S: SplitStore> SplitWorkflow<S> {
    /// Open a partition run for `parent_id`, producing `target_count`
    /// children.
    ///
    /// Refuses parents whose workflow-completed flag is already set (the
    /// multi-session lock) and target counts outside
    /// `1..=total quantity` — more children than units would force an
    /// empty child.
    pub async fn open(
        store: S,
        parent_id: &ParentId,
        target_count: u32,
    ) -> Result<Self, WorkflowError> {
        let parent = store.load_parent(parent_id).await?;
        if parent.workflow_completed {
            return Err(PreconditionError::WorkflowAlreadyCompleted(parent.id.0.clone()).into());
        }
        if parent.items.is_empty() {
            return Err(PreconditionError::NoLineItems(parent.id.0.clone()).into());
        }
        let max = parent.total_quantity();
        if target_count == 0 || target_count > max {
            return Err(PreconditionError::TargetCountOutOfRange {
                requested: target_count,
                max,
            }
            .into());
        }

        info!(
            event_name = "workflow.opened",
            parent_id = %parent.id,
            target_count,
            "split workflow opened"
        );
        Ok(Self {
            store,
            parent_id: parent.id,
            target_count,
            ledger: AllocationLedger::new(&parent.items),
            created: Vec::new(),
            completed: false,
        })
    }

    pub fn parent_id(&self) -> &ParentId {
        &self.parent_id
    }

    pub fn target_count(&self) -> u32 {
        self.target_count
    }

    /// The index the operator is currently assigning to: always the next
    /// position in the created-children list.
    pub fn active_child_index(&self) -> usize {
        self.created.len()
    }

    pub fn children(&self) -> &[DraftChild] {
        &self.created
    }

    pub fn ledger(&self) -> &AllocationLedger {
        &self.ledger
    }

    pub fn line_items(&self) -> Vec<LineItem> {
        self.ledger.line_items()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// True when every item is fully assigned and all children exist —
    /// the gate for finalize.
    pub fn is_fully_allocated(&self) -> bool {
        self.ledger.is_exhausted() && self.created.len() == self.target_count as usize
    }

    /// Change the number of children to produce. Only permitted while no
    /// child has been generated; afterwards the count is locked, because a
    /// reset would orphan drafts the ledger no longer accounts for.
    pub fn set_target_count(&mut self, target_count: u32) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        if !self.created.is_empty() {
            return Err(PreconditionError::TargetLocked { created: self.created.len() }.into());
        }
        let max = self.ledger.total_original_quantity();
        if target_count == 0 || target_count > max {
            return Err(PreconditionError::TargetCountOutOfRange {
                requested: target_count,
                max,
            }
            .into());
        }
        self.target_count = target_count;
        self.ledger.reset();
        Ok(())
    }

    /// Assign `quantity` of an item to the child currently being composed.
    ///
    /// Once every child has been generated there is no child being
    /// composed: the active index would point past the last child, and
    /// quantity parked there could never be carried by any document.
    pub fn assign(&mut self, item_id: &ItemId, quantity: u32) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        if self.created.len() as u32 >= self.target_count {
            return Err(PreconditionError::TargetReached { target: self.target_count }.into());
        }
        let active = self.active_child_index();
        self.ledger.assign(item_id, active, quantity)?;
        Ok(())
    }

    /// Persist the child at `child_index` as a draft in the store.
    ///
    /// Children are generated strictly in order, so `child_index` must be
    /// the active index. On store failure nothing is mutated and the same
    /// generate may be retried.
    pub async fn generate_child(
        &mut self,
        child_index: usize,
    ) -> Result<DraftChild, WorkflowError> {
        self.ensure_open()?;
        let expected = self.active_child_index();
        if child_index != expected {
            return Err(PreconditionError::OutOfOrderGenerate {
                expected,
                requested: child_index,
            }
            .into());
        }
        if self.created.len() as u32 >= self.target_count {
            return Err(PreconditionError::TargetReached { target: self.target_count }.into());
        }
        if !self.ledger.has_assignment_for(child_index) {
            return Err(PreconditionError::EmptyChild { child_index }.into());
        }

        let items = self.ledger.items_for_child(child_index);
        let child = self.store.create_child(&self.parent_id, items).await?;
        info!(
            event_name = "workflow.child_generated",
            parent_id = %self.parent_id,
            child_id = %child.id,
            child_index,
            "draft child created"
        );
        self.created.push(child.clone());
        Ok(child)
    }

    /// Delete the draft at `child_index` and return its quantities to the
    /// pool.
    ///
    /// The store delete happens first; only when it succeeds (or the
    /// record is already gone) are the local child list and ledger
    /// updated, so a failed delete changes nothing.
    pub async fn cancel_child(&mut self, child_index: usize) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        if child_index >= self.created.len() {
            return Err(PreconditionError::UnknownChild {
                child_index,
                created: self.created.len(),
            }
            .into());
        }

        let child_id = self.created[child_index].id.clone();
        match self.store.delete_child(&child_id).await {
            Ok(()) => {}
            Err(StoreError::NotFound(_)) => {
                debug!(
                    event_name = "workflow.child_already_deleted",
                    child_id = %child_id,
                    "draft was already gone; treating delete as success"
                );
            }
            Err(error) => return Err(error.into()),
        }

        self.created.remove(child_index);
        self.ledger.release_child(child_index);
        info!(
            event_name = "workflow.child_cancelled",
            parent_id = %self.parent_id,
            child_id = %child_id,
            child_index,
            "draft child cancelled"
        );
        Ok(())
    }

    /// Delete every created draft and return the workflow to its initial
    /// state, keeping it open. Cancels from the last child down so the
    /// ledger's positional indices stay valid at each step.
    pub async fn cancel_all_children(&mut self) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        while !self.created.is_empty() {
            self.cancel_child(self.created.len() - 1).await?;
        }
        Ok(())
    }

    /// Change the quantity an already-generated child holds for one item.
    ///
    /// The edit is validated against the ledger first, then patched into
    /// the stored draft; ledger state only commits when the store accepted
    /// the new item list.
    pub async fn reassign(
        &mut self,
        child_index: usize,
        item_id: &ItemId,
        quantity: u32,
    ) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        if child_index >= self.created.len() {
            return Err(PreconditionError::UnknownChild {
                child_index,
                created: self.created.len(),
            }
            .into());
        }

        let mut next = self.ledger.clone();
        next.assign(item_id, child_index, quantity)?;
        let items = next.items_for_child(child_index);
        if items.is_empty() {
            return Err(PreconditionError::EmptyChild { child_index }.into());
        }

        let child_id = self.created[child_index].id.clone();
        let updated = self.store.update_child_items(&child_id, items).await?;
        self.created[child_index] = updated;
        self.ledger = next;
        Ok(())
    }

    /// Flip every draft to a committed document and mark the parent's
    /// workflow complete.
    ///
    /// The per-child patches and the parent patch are independent
    /// sequential calls, not a transaction. Each child's draft flag is
    /// recorded locally as soon as its patch succeeds, so when a call in
    /// the middle fails, retrying resumes from the first still-draft
    /// child instead of re-patching finished ones.
    pub async fn finalize(&mut self) -> Result<(), WorkflowError> {
        if self.completed {
            return Ok(());
        }
        if self.created.len() != self.target_count as usize {
            return Err(PreconditionError::MissingChildren {
                created: self.created.len(),
                target: self.target_count,
            }
            .into());
        }
        if !self.ledger.is_exhausted() {
            return Err(PreconditionError::NotFullyAllocated {
                remaining: self.ledger.total_remaining(),
            }
            .into());
        }

        for index in 0..self.created.len() {
            if !self.created[index].is_draft {
                continue;
            }
            let child_id = self.created[index].id.clone();
            let finalized = self.store.finalize_child(&child_id).await?;
            self.created[index] = finalized;
        }
        self.store.mark_parent_complete(&self.parent_id).await?;
        self.completed = true;
        info!(
            event_name = "workflow.finalized",
            parent_id = %self.parent_id,
            children = self.created.len(),
            "split workflow finalized"
        );
        Ok(())
    }

    /// The abandonment guard: best-effort deletion of every still-draft
    /// child when the operator leaves before finalize.
    ///
    /// Consumes the workflow — abandoned state is discarded either way.
    /// After a successful finalize this is a strict no-op: no delete call
    /// is ever issued against committed documents.
    pub async fn abandon(self) -> CleanupOutcome {
        if self.completed || self.created.is_empty() {
            return CleanupOutcome::default();
        }
        info!(
            event_name = "workflow.abandoned",
            parent_id = %self.parent_id,
            drafts = self.created.len(),
            "workflow abandoned before finalize; cleaning up drafts"
        );
        guard::delete_all(&self.store, &self.created).await
    }

    fn ensure_open(&self) -> Result<(), WorkflowError> {
        if self.completed {
            return Err(PreconditionError::AlreadyCompleted.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::item::{ItemId, LineItem, UnitId};
    use crate::domain::parent::{ParentId, ParentSnapshot};
    use crate::errors::WorkflowError;
    use crate::ledger::AllocationError;
    use crate::store::{ChildStore, InMemoryStore, StoreError};

    use super::{PreconditionError, SplitWorkflow};

    fn line(item_id: &str, quantity: u32) -> LineItem {
        LineItem {
            item_id: ItemId(item_id.to_string()),
            unit: UnitId("nos".to_string()),
            unit_price: Decimal::new(45_000, 2),
            original_quantity: quantity,
        }
    }

    fn id(item_id: &str) -> ItemId {
        ItemId(item_id.to_string())
    }

    async fn open_workflow(
        items: Vec<LineItem>,
        target_count: u32,
    ) -> SplitWorkflow<std::sync::Arc<InMemoryStore>> {
        let store = std::sync::Arc::new(InMemoryStore::default());
        store
            .seed_parent(ParentSnapshot {
                id: ParentId("wo-100".to_string()),
                items,
                workflow_completed: false,
            })
            .await;
        SplitWorkflow::open(store, &ParentId("wo-100".to_string()), target_count)
            .await
            .expect("open workflow")
    }

    #[tokio::test]
    async fn open_rejects_completed_parent() {
        let store = InMemoryStore::default();
        store
            .seed_parent(ParentSnapshot {
                id: ParentId("wo-done".to_string()),
                items: vec![line("itm-x", 4)],
                workflow_completed: true,
            })
            .await;

        let error = SplitWorkflow::open(store, &ParentId("wo-done".to_string()), 2)
            .await
            .expect_err("completed parent must be locked");

        assert!(matches!(
            error,
            WorkflowError::Precondition(PreconditionError::WorkflowAlreadyCompleted(_))
        ));
    }

    #[tokio::test]
    async fn open_rejects_target_count_beyond_total_quantity() {
        let store = InMemoryStore::default();
        store
            .seed_parent(ParentSnapshot {
                id: ParentId("wo-100".to_string()),
                items: vec![line("itm-x", 3)],
                workflow_completed: false,
            })
            .await;

        let error = SplitWorkflow::open(store, &ParentId("wo-100".to_string()), 4)
            .await
            .expect_err("4 children from 3 units is impossible");

        assert!(matches!(
            error,
            WorkflowError::Precondition(PreconditionError::TargetCountOutOfRange {
                requested: 4,
                max: 3
            })
        ));
    }

    #[tokio::test]
    async fn full_run_splits_ten_units_across_two_children() {
        let mut workflow = open_workflow(vec![line("itm-x", 10)], 2).await;

        workflow.assign(&id("itm-x"), 4).expect("assign 4 to child 0");
        assert_eq!(workflow.ledger().remaining(&id("itm-x")), Some(6));
        let first = workflow.generate_child(0).await.expect("generate child 0");
        assert!(first.is_draft);
        assert_eq!(first.total_quantity(), 4);

        workflow.assign(&id("itm-x"), 6).expect("assign 6 to child 1");
        assert_eq!(workflow.ledger().remaining(&id("itm-x")), Some(0));
        workflow.generate_child(1).await.expect("generate child 1");

        assert!(workflow.is_fully_allocated());
        workflow.finalize().await.expect("finalize");
        assert!(workflow.is_completed());
        assert!(workflow.children().iter().all(|child| !child.is_draft));
    }

    #[tokio::test]
    async fn generate_rejects_out_of_order_and_empty_children() {
        let mut workflow = open_workflow(vec![line("itm-x", 10)], 2).await;

        let out_of_order = workflow.generate_child(1).await.expect_err("index 1 before 0");
        assert!(matches!(
            out_of_order,
            WorkflowError::Precondition(PreconditionError::OutOfOrderGenerate {
                expected: 0,
                requested: 1
            })
        ));

        let empty = workflow.generate_child(0).await.expect_err("nothing assigned yet");
        assert!(matches!(
            empty,
            WorkflowError::Precondition(PreconditionError::EmptyChild { child_index: 0 })
        ));
    }

    #[tokio::test]
    async fn generate_beyond_target_is_rejected() {
        let mut workflow = open_workflow(vec![line("itm-x", 4)], 1).await;

        workflow.assign(&id("itm-x"), 4).expect("assign all");
        workflow.generate_child(0).await.expect("generate only child");

        let error = workflow.generate_child(1).await.expect_err("target already reached");
        assert!(matches!(
            error,
            WorkflowError::Precondition(PreconditionError::TargetReached { target: 1 })
        ));
    }

    #[tokio::test]
    async fn assign_after_last_generate_cannot_strand_quantity() {
        let mut workflow = open_workflow(vec![line("itm-x", 10)], 2).await;

        workflow.assign(&id("itm-x"), 3).expect("assign 3");
        workflow.generate_child(0).await.expect("generate child 0");
        workflow.assign(&id("itm-x"), 2).expect("assign 2");
        workflow.generate_child(1).await.expect("generate child 1");

        // No child is being composed any more; parking the remaining 5
        // units at the next index would make them vanish from every
        // generated document.
        let error = workflow.assign(&id("itm-x"), 5).expect_err("no child left to compose");
        assert!(matches!(
            error,
            WorkflowError::Precondition(PreconditionError::TargetReached { target: 2 })
        ));

        assert_eq!(workflow.ledger().remaining(&id("itm-x")), Some(5));
        let unallocated = workflow.finalize().await.expect_err("5 units still unassigned");
        assert!(matches!(
            unallocated,
            WorkflowError::Precondition(PreconditionError::NotFullyAllocated { remaining: 5 })
        ));
    }

    #[tokio::test]
    async fn finalize_requires_all_children_and_zero_remaining() {
        let mut workflow = open_workflow(vec![line("itm-x", 10)], 2).await;

        workflow.assign(&id("itm-x"), 4).expect("assign 4");
        workflow.generate_child(0).await.expect("generate child 0");

        let missing = workflow.finalize().await.expect_err("only one of two children");
        assert!(matches!(
            missing,
            WorkflowError::Precondition(PreconditionError::MissingChildren {
                created: 1,
                target: 2
            })
        ));

        workflow.assign(&id("itm-x"), 2).expect("assign 2, leaving 4 unassigned");
        workflow.generate_child(1).await.expect("generate child 1");
        let unallocated = workflow.finalize().await.expect_err("4 units still unassigned");
        assert!(matches!(
            unallocated,
            WorkflowError::Precondition(PreconditionError::NotFullyAllocated { remaining: 4 })
        ));
    }

    #[tokio::test]
    async fn cancel_mid_flow_restores_quantities_and_reindexes() {
        let mut workflow = open_workflow(vec![line("itm-x", 10)], 2).await;

        workflow.assign(&id("itm-x"), 4).expect("assign 4");
        workflow.generate_child(0).await.expect("generate child 0");
        workflow.assign(&id("itm-x"), 6).expect("assign 6");
        workflow.generate_child(1).await.expect("generate child 1");

        workflow.cancel_child(0).await.expect("cancel child 0");

        assert_eq!(workflow.ledger().remaining(&id("itm-x")), Some(4));
        assert_eq!(workflow.children().len(), 1);
        assert_eq!(workflow.active_child_index(), 1);
        // The surviving child's slice moved down to index 0.
        assert_eq!(workflow.ledger().items_for_child(0)[0].quantity, 6);

        workflow.assign(&id("itm-x"), 4).expect("assign the returned 4");
        workflow.generate_child(1).await.expect("generate replacement child 1");
        assert!(workflow.is_fully_allocated());
    }

    #[tokio::test]
    async fn failed_generate_leaves_state_untouched_and_is_retryable() {
        let store = std::sync::Arc::new(InMemoryStore::default());
        store
            .seed_parent(ParentSnapshot {
                id: ParentId("wo-100".to_string()),
                items: vec![line("itm-x", 10)],
                workflow_completed: false,
            })
            .await;
        let mut workflow =
            SplitWorkflow::open(store.clone(), &ParentId("wo-100".to_string()), 2)
                .await
                .expect("open workflow");

        workflow.assign(&id("itm-x"), 4).expect("assign 4");
        store.set_offline(true);
        let error = workflow.generate_child(0).await.expect_err("store offline");
        assert!(error.is_retryable());
        assert_eq!(workflow.children().len(), 0);
        assert_eq!(workflow.ledger().remaining(&id("itm-x")), Some(6));

        store.set_offline(false);
        workflow.generate_child(0).await.expect("retry succeeds");
        assert_eq!(workflow.children().len(), 1);
    }

    #[tokio::test]
    async fn failed_cancel_changes_nothing() {
        let store = std::sync::Arc::new(InMemoryStore::default());
        store
            .seed_parent(ParentSnapshot {
                id: ParentId("wo-100".to_string()),
                items: vec![line("itm-x", 10)],
                workflow_completed: false,
            })
            .await;
        let mut workflow =
            SplitWorkflow::open(store.clone(), &ParentId("wo-100".to_string()), 2)
                .await
                .expect("open workflow");
        workflow.assign(&id("itm-x"), 4).expect("assign 4");
        workflow.generate_child(0).await.expect("generate child 0");

        store.set_offline(true);
        let error = workflow.cancel_child(0).await.expect_err("delete fails offline");
        assert!(error.is_retryable());
        assert_eq!(workflow.children().len(), 1);
        assert_eq!(workflow.ledger().remaining(&id("itm-x")), Some(6));
    }

    #[tokio::test]
    async fn cancel_tolerates_already_deleted_child() {
        let store = std::sync::Arc::new(InMemoryStore::default());
        store
            .seed_parent(ParentSnapshot {
                id: ParentId("wo-100".to_string()),
                items: vec![line("itm-x", 10)],
                workflow_completed: false,
            })
            .await;
        let mut workflow =
            SplitWorkflow::open(store.clone(), &ParentId("wo-100".to_string()), 2)
                .await
                .expect("open workflow");
        workflow.assign(&id("itm-x"), 4).expect("assign 4");
        let child = workflow.generate_child(0).await.expect("generate child 0");

        // Someone else already removed the record.
        store.delete_child(&child.id).await.expect("delete out of band");

        workflow.cancel_child(0).await.expect("cancel treats missing record as deleted");
        assert_eq!(workflow.children().len(), 0);
        assert_eq!(workflow.ledger().remaining(&id("itm-x")), Some(10));
    }

    #[tokio::test]
    async fn partial_finalize_failure_resumes_from_first_still_draft_child() {
        let store = std::sync::Arc::new(InMemoryStore::default());
        store
            .seed_parent(ParentSnapshot {
                id: ParentId("wo-100".to_string()),
                items: vec![line("itm-x", 10)],
                workflow_completed: false,
            })
            .await;
        let mut workflow =
            SplitWorkflow::open(store.clone(), &ParentId("wo-100".to_string()), 2)
                .await
                .expect("open workflow");
        workflow.assign(&id("itm-x"), 4).expect("assign 4");
        let first = workflow.generate_child(0).await.expect("generate child 0");
        workflow.assign(&id("itm-x"), 6).expect("assign 6");
        let second = workflow.generate_child(1).await.expect("generate child 1");

        store.deny_finalize_for(&second.id).await;
        let error = workflow.finalize().await.expect_err("second patch fails");
        assert!(error.is_retryable());
        assert!(!workflow.is_completed());
        // First child is already committed locally and remotely.
        assert!(!workflow.children()[0].is_draft);
        assert!(!store.child(&first.id).await.expect("first child").is_draft);
        assert!(store.child(&second.id).await.expect("second child").is_draft);

        store.clear_finalize_denials().await;
        workflow.finalize().await.expect("retry completes the run");
        assert!(workflow.is_completed());
        assert!(store.parent(&ParentId("wo-100".to_string())).await.expect("parent").workflow_completed);
    }

    #[tokio::test]
    async fn finalize_is_idempotent_after_success() {
        let mut workflow = open_workflow(vec![line("itm-x", 2)], 1).await;
        workflow.assign(&id("itm-x"), 2).expect("assign all");
        workflow.generate_child(0).await.expect("generate");
        workflow.finalize().await.expect("finalize");

        workflow.finalize().await.expect("second finalize is a no-op");
        assert!(workflow.is_completed());
    }

    #[tokio::test]
    async fn target_count_is_locked_once_a_child_exists() {
        let mut workflow = open_workflow(vec![line("itm-x", 10)], 2).await;

        workflow.set_target_count(3).expect("no children yet; change allowed");
        assert_eq!(workflow.target_count(), 3);

        workflow.assign(&id("itm-x"), 4).expect("assign 4");
        workflow.generate_child(0).await.expect("generate child 0");

        let error = workflow.set_target_count(2).expect_err("locked after generation");
        assert!(matches!(
            error,
            WorkflowError::Precondition(PreconditionError::TargetLocked { created: 1 })
        ));
        assert_eq!(workflow.target_count(), 3);
    }

    #[tokio::test]
    async fn changing_target_count_resets_assignment_intent() {
        let mut workflow = open_workflow(vec![line("itm-x", 10)], 2).await;
        workflow.assign(&id("itm-x"), 7).expect("assign 7");

        workflow.set_target_count(5).expect("change target");

        assert_eq!(workflow.ledger().remaining(&id("itm-x")), Some(10));
        assert!(!workflow.ledger().has_assignment_for(0));
    }

    #[tokio::test]
    async fn over_assignment_fails_without_touching_the_ledger() {
        let mut workflow = open_workflow(vec![line("itm-x", 10)], 2).await;
        workflow.assign(&id("itm-x"), 4).expect("assign 4");
        workflow.generate_child(0).await.expect("generate child 0");

        let error = workflow.assign(&id("itm-x"), 7).expect_err("7 > remaining 6");
        assert!(matches!(
            error,
            WorkflowError::Allocation(AllocationError::InvalidQuantity {
                requested: 7,
                available: 6,
                ..
            })
        ));
        assert_eq!(workflow.ledger().remaining(&id("itm-x")), Some(6));
    }

    #[tokio::test]
    async fn reassign_edits_draft_in_store_and_ledger_together() {
        let store = std::sync::Arc::new(InMemoryStore::default());
        store
            .seed_parent(ParentSnapshot {
                id: ParentId("wo-100".to_string()),
                items: vec![line("itm-x", 10), line("itm-y", 2)],
                workflow_completed: false,
            })
            .await;
        let mut workflow =
            SplitWorkflow::open(store.clone(), &ParentId("wo-100".to_string()), 2)
                .await
                .expect("open workflow");
        workflow.assign(&id("itm-x"), 4).expect("assign x");
        workflow.assign(&id("itm-y"), 1).expect("assign y");
        let child = workflow.generate_child(0).await.expect("generate child 0");

        workflow.reassign(0, &id("itm-x"), 6).await.expect("grow child 0's slice");

        assert_eq!(workflow.ledger().remaining(&id("itm-x")), Some(4));
        let stored = store.child(&child.id).await.expect("stored child");
        let x_line =
            stored.items.iter().find(|item| item.item_id == id("itm-x")).expect("x line");
        assert_eq!(x_line.quantity, 6);
        assert_eq!(workflow.children()[0], stored);
    }

    #[tokio::test]
    async fn failed_reassign_leaves_ledger_unchanged() {
        let store = std::sync::Arc::new(InMemoryStore::default());
        store
            .seed_parent(ParentSnapshot {
                id: ParentId("wo-100".to_string()),
                items: vec![line("itm-x", 10)],
                workflow_completed: false,
            })
            .await;
        let mut workflow =
            SplitWorkflow::open(store.clone(), &ParentId("wo-100".to_string()), 2)
                .await
                .expect("open workflow");
        workflow.assign(&id("itm-x"), 4).expect("assign 4");
        workflow.generate_child(0).await.expect("generate child 0");

        store.set_offline(true);
        let error = workflow.reassign(0, &id("itm-x"), 6).await.expect_err("patch fails");
        assert!(error.is_retryable());
        assert_eq!(workflow.ledger().remaining(&id("itm-x")), Some(6));
        assert_eq!(workflow.children()[0].items[0].quantity, 4);
    }

    #[tokio::test]
    async fn cancel_all_children_returns_workflow_to_initial_state() {
        let store = std::sync::Arc::new(InMemoryStore::default());
        store
            .seed_parent(ParentSnapshot {
                id: ParentId("wo-100".to_string()),
                items: vec![line("itm-x", 10)],
                workflow_completed: false,
            })
            .await;
        let mut workflow =
            SplitWorkflow::open(store.clone(), &ParentId("wo-100".to_string()), 2)
                .await
                .expect("open workflow");
        workflow.assign(&id("itm-x"), 4).expect("assign 4");
        workflow.generate_child(0).await.expect("generate child 0");
        workflow.assign(&id("itm-x"), 6).expect("assign 6");
        workflow.generate_child(1).await.expect("generate child 1");

        workflow.cancel_all_children().await.expect("cancel all");

        assert_eq!(workflow.children().len(), 0);
        assert_eq!(workflow.ledger().remaining(&id("itm-x")), Some(10));
        assert_eq!(store.child_count().await, 0);
        assert!(!workflow.is_completed());
    }

    #[tokio::test]
    async fn abandon_deletes_every_draft() {
        let store = std::sync::Arc::new(InMemoryStore::default());
        store
            .seed_parent(ParentSnapshot {
                id: ParentId("wo-100".to_string()),
                items: vec![line("itm-x", 10)],
                workflow_completed: false,
            })
            .await;
        let mut workflow =
            SplitWorkflow::open(store.clone(), &ParentId("wo-100".to_string()), 2)
                .await
                .expect("open workflow");
        workflow.assign(&id("itm-x"), 4).expect("assign 4");
        workflow.generate_child(0).await.expect("generate child 0");
        workflow.assign(&id("itm-x"), 6).expect("assign 6");
        workflow.generate_child(1).await.expect("generate child 1");

        let outcome = workflow.abandon().await;

        assert!(outcome.is_clean());
        assert_eq!(outcome.deleted.len(), 2);
        assert_eq!(store.child_count().await, 0);
    }

    #[tokio::test]
    async fn abandon_after_finalize_issues_no_deletes() {
        let store = std::sync::Arc::new(InMemoryStore::default());
        store
            .seed_parent(ParentSnapshot {
                id: ParentId("wo-100".to_string()),
                items: vec![line("itm-x", 4)],
                workflow_completed: false,
            })
            .await;
        let mut workflow =
            SplitWorkflow::open(store.clone(), &ParentId("wo-100".to_string()), 1)
                .await
                .expect("open workflow");
        workflow.assign(&id("itm-x"), 4).expect("assign all");
        workflow.generate_child(0).await.expect("generate");
        workflow.finalize().await.expect("finalize");

        // Even with the store down, abandoning a completed workflow must
        // not attempt anything.
        store.set_offline(true);
        let outcome = workflow.abandon().await;

        assert!(outcome.is_clean());
        assert!(outcome.deleted.is_empty());
        store.set_offline(false);
        assert_eq!(store.child_count().await, 1);
    }
}
