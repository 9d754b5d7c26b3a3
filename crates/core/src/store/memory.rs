//! In-memory store used by tests and local development.
//!
//! Mirrors the remote store's contract, including the failure paths the
//! engine has to survive: it can be taken offline wholesale and individual
//! finalize calls can be made to fail, which is how the partial-finalize
//! and cleanup tests drive the engine into its recovery branches.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::child::{ChildId, DraftChild};
use crate::domain::item::ChildLineItem;
use crate::domain::parent::{ParentId, ParentSnapshot};

use super::{ChildStore, ParentStore, StoreError};

#[derive(Default)]
pub struct InMemoryStore {
    parents: RwLock<HashMap<String, ParentSnapshot>>,
    children: RwLock<HashMap<String, DraftChild>>,
    offline: AtomicBool,
    deny_finalize: RwLock<HashSet<String>>,
}

impl InMemoryStore {
    pub async fn seed_parent(&self, parent: ParentSnapshot) {
        let mut parents = self.parents.write().await;
        parents.insert(parent.id.0.clone(), parent);
    }

    /// Insert a child record verbatim, bypassing creation-time validation.
    /// Lets tests stage drafts with arbitrary `created_at` timestamps.
    pub async fn seed_child(&self, child: DraftChild) {
        let mut children = self.children.write().await;
        children.insert(child.id.0.clone(), child);
    }

    /// While offline, every call fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Make finalize fail for one specific child until cleared.
    pub async fn deny_finalize_for(&self, child_id: &ChildId) {
        let mut denied = self.deny_finalize.write().await;
        denied.insert(child_id.0.clone());
    }

    pub async fn clear_finalize_denials(&self) {
        let mut denied = self.deny_finalize.write().await;
        denied.clear();
    }

    pub async fn child(&self, child_id: &ChildId) -> Option<DraftChild> {
        let children = self.children.read().await;
        children.get(&child_id.0).cloned()
    }

    pub async fn parent(&self, parent_id: &ParentId) -> Option<ParentSnapshot> {
        let parents = self.parents.read().await;
        parents.get(&parent_id.0).cloned()
    }

    pub async fn child_count(&self) -> usize {
        let children = self.children.read().await;
        children.len()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }

    fn validate_items(items: &[ChildLineItem]) -> Result<(), StoreError> {
        if items.is_empty() {
            return Err(StoreError::Rejected("child must carry at least one item".to_string()));
        }
        if items.iter().any(|item| item.quantity == 0) {
            return Err(StoreError::Rejected("item quantities must be positive".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChildStore for InMemoryStore {
    async fn create_child(
        &self,
        parent_id: &ParentId,
        items: Vec<ChildLineItem>,
    ) -> Result<DraftChild, StoreError> {
        self.ensure_online()?;
        Self::validate_items(&items)?;

        let child = DraftChild {
            id: ChildId(format!("ch-{}", Uuid::new_v4())),
            parent_id: parent_id.clone(),
            is_draft: true,
            items,
            created_at: Utc::now(),
        };
        let mut children = self.children.write().await;
        children.insert(child.id.0.clone(), child.clone());
        Ok(child)
    }

    async fn update_child_items(
        &self,
        child_id: &ChildId,
        items: Vec<ChildLineItem>,
    ) -> Result<DraftChild, StoreError> {
        self.ensure_online()?;
        Self::validate_items(&items)?;

        let mut children = self.children.write().await;
        let child = children
            .get_mut(&child_id.0)
            .ok_or_else(|| StoreError::NotFound(child_id.0.clone()))?;
        if !child.is_draft {
            return Err(StoreError::Rejected("child is no longer a draft".to_string()));
        }
        child.items = items;
        Ok(child.clone())
    }

    async fn finalize_child(&self, child_id: &ChildId) -> Result<DraftChild, StoreError> {
        self.ensure_online()?;
        {
            let denied = self.deny_finalize.read().await;
            if denied.contains(&child_id.0) {
                return Err(StoreError::Unavailable(format!(
                    "finalize refused for {child_id}"
                )));
            }
        }

        let mut children = self.children.write().await;
        let child = children
            .get_mut(&child_id.0)
            .ok_or_else(|| StoreError::NotFound(child_id.0.clone()))?;
        child.is_draft = false;
        Ok(child.clone())
    }

    async fn delete_child(&self, child_id: &ChildId) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut children = self.children.write().await;
        match children.remove(&child_id.0) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(child_id.0.clone())),
        }
    }

    async fn list_drafts(
        &self,
        parent_id: Option<&ParentId>,
    ) -> Result<Vec<DraftChild>, StoreError> {
        self.ensure_online()?;
        let children = self.children.read().await;
        let mut drafts: Vec<DraftChild> = children
            .values()
            .filter(|child| child.is_draft)
            .filter(|child| parent_id.map_or(true, |parent| &child.parent_id == parent))
            .cloned()
            .collect();
        drafts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(drafts)
    }
}

#[async_trait::async_trait]
impl ParentStore for InMemoryStore {
    async fn load_parent(&self, parent_id: &ParentId) -> Result<ParentSnapshot, StoreError> {
        self.ensure_online()?;
        let parents = self.parents.read().await;
        parents.get(&parent_id.0).cloned().ok_or_else(|| StoreError::NotFound(parent_id.0.clone()))
    }

    async fn mark_parent_complete(&self, parent_id: &ParentId) -> Result<(), StoreError> {
        self.ensure_online()?;
        let mut parents = self.parents.write().await;
        let parent = parents
            .get_mut(&parent_id.0)
            .ok_or_else(|| StoreError::NotFound(parent_id.0.clone()))?;
        parent.workflow_completed = true;
        Ok(())
    }
}
