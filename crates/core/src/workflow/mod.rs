pub mod engine;
pub mod guard;

pub use engine::{PreconditionError, SplitWorkflow};
pub use guard::{sweep_orphaned_drafts, CleanupOutcome, SweepReport};
