//! The seam between the workflow engine and the remote resource store.
//!
//! The engine only ever talks to the store through these traits; the REST
//! adapter lives in `splitflow-store`, and [`InMemoryStore`] backs tests
//! and local development.

pub mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::child::{ChildId, DraftChild};
use crate::domain::item::ChildLineItem;
use crate::domain::parent::{ParentId, ParentSnapshot};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Network or server failure. The operation may be retried.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// The store understood and refused the request.
    #[error("store rejected the request: {0}")]
    Rejected(String),
    /// The addressed record does not exist. Callers deleting a child must
    /// treat this as success so cleanup retries do not cascade.
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Create, edit, finalize, delete and enumerate split child records.
///
/// `create_child` persists the record with the draft marker set; the store
/// assigns the id. Zero-quantity lines are filtered out by the caller and
/// an empty item list is invalid.
#[async_trait]
pub trait ChildStore: Send + Sync {
    async fn create_child(
        &self,
        parent_id: &ParentId,
        items: Vec<ChildLineItem>,
    ) -> Result<DraftChild, StoreError>;

    /// Replace a draft child's item list. Rejected once the child is no
    /// longer a draft.
    async fn update_child_items(
        &self,
        child_id: &ChildId,
        items: Vec<ChildLineItem>,
    ) -> Result<DraftChild, StoreError>;

    /// Flip the child's draft marker off, making it a committed document.
    async fn finalize_child(&self, child_id: &ChildId) -> Result<DraftChild, StoreError>;

    async fn delete_child(&self, child_id: &ChildId) -> Result<(), StoreError>;

    /// Every still-draft child, optionally narrowed to one parent. Backs
    /// the orphaned-draft sweep.
    async fn list_drafts(&self, parent_id: Option<&ParentId>)
        -> Result<Vec<DraftChild>, StoreError>;
}

#[async_trait]
pub trait ParentStore: Send + Sync {
    async fn load_parent(&self, parent_id: &ParentId) -> Result<ParentSnapshot, StoreError>;

    /// Set the workflow-completed flag on the parent. Called exactly once,
    /// at the end of finalize.
    async fn mark_parent_complete(&self, parent_id: &ParentId) -> Result<(), StoreError>;
}

/// Everything the workflow engine needs from the store.
pub trait SplitStore: ChildStore + ParentStore {}

impl<T: ChildStore + ParentStore> SplitStore for T {}

#[async_trait]
impl<T> ChildStore for std::sync::Arc<T>
where
    T: ChildStore + ?Sized,
{
    async fn create_child(
        &self,
        parent_id: &ParentId,
        items: Vec<ChildLineItem>,
    ) -> Result<DraftChild, StoreError> {
        (**self).create_child(parent_id, items).await
    }

    async fn update_child_items(
        &self,
        child_id: &ChildId,
        items: Vec<ChildLineItem>,
    ) -> Result<DraftChild, StoreError> {
        (**self).update_child_items(child_id, items).await
    }

    async fn finalize_child(&self, child_id: &ChildId) -> Result<DraftChild, StoreError> {
        (**self).finalize_child(child_id).await
    }

    async fn delete_child(&self, child_id: &ChildId) -> Result<(), StoreError> {
        (**self).delete_child(child_id).await
    }

    async fn list_drafts(
        &self,
        parent_id: Option<&ParentId>,
    ) -> Result<Vec<DraftChild>, StoreError> {
        (**self).list_drafts(parent_id).await
    }
}

#[async_trait]
impl<T> ParentStore for std::sync::Arc<T>
where
    T: ParentStore + ?Sized,
{
    async fn load_parent(&self, parent_id: &ParentId) -> Result<ParentSnapshot, StoreError> {
        (**self).load_parent(parent_id).await
    }

    async fn mark_parent_complete(&self, parent_id: &ParentId) -> Result<(), StoreError> {
        (**self).mark_parent_complete(parent_id).await
    }
}
