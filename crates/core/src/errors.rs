use thiserror::Error;

use crate::ledger::AllocationError;
use crate::store::StoreError;
use crate::workflow::PreconditionError;

/// Unified error surface of the split workflow engine.
///
/// `Allocation` and `Store` are operator-recoverable: state is left
/// untouched and the action can be corrected or retried. `Precondition`
/// means the caller attempted an operation outside its state contract;
/// the UI layer is expected to make those unreachable by disabling the
/// action.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(StoreError::Unavailable(_)))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Allocation(_) => "The assigned quantity is not available for this item.",
            Self::Precondition(_) => "This action is not available in the current workflow state.",
            Self::Store(_) => "The document store did not accept the request. Please retry.",
        }
    }
}
