pub mod config;
pub mod domain;
pub mod errors;
pub mod ledger;
pub mod store;
pub mod workflow;

pub use domain::child::{ChildId, DraftChild};
pub use domain::item::{ChildLineItem, ItemId, LineItem, UnitId};
pub use domain::parent::{ParentId, ParentSnapshot};
pub use errors::WorkflowError;
pub use ledger::{AllocationEntry, AllocationError, AllocationLedger, Assignment};
pub use store::{ChildStore, InMemoryStore, ParentStore, SplitStore, StoreError};
pub use workflow::{
    sweep_orphaned_drafts, CleanupOutcome, PreconditionError, SplitWorkflow, SweepReport,
};
