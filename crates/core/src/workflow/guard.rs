//! Cleanup of draft children: abandonment and the orphan sweep.
//!
//! Both paths are best-effort. A failed delete leaves the record orphaned
//! in the store and is reported rather than retried forever; the periodic
//! sweep exists to collect exactly those leftovers.

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use tracing::{info, warn};

use crate::domain::child::{ChildId, DraftChild};
use crate::domain::parent::ParentId;
use crate::store::{ChildStore, StoreError};

/// What happened to each draft during a cleanup pass.
#[derive(Debug, Default)]
pub struct CleanupOutcome {
    pub deleted: Vec<ChildId>,
    pub failed: Vec<(ChildId, StoreError)>,
}

impl CleanupOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Delete the given drafts concurrently. "Already deleted" counts as
/// deleted; other failures are surfaced in the outcome and logged, never
/// propagated — cleanup must not block leaving the workflow.
pub(crate) async fn delete_all<S>(store: &S, children: &[DraftChild]) -> CleanupOutcome
where
    S: ChildStore + ?Sized,
{
    let results = join_all(children.iter().map(|child| async move {
        let result = store.delete_child(&child.id).await;
        (child.id.clone(), result)
    }))
    .await;

    let mut outcome = CleanupOutcome::default();
    for (child_id, result) in results {
        match result {
            Ok(()) | Err(StoreError::NotFound(_)) => outcome.deleted.push(child_id),
            Err(error) => {
                warn!(
                    event_name = "workflow.cleanup_failed",
                    child_id = %child_id,
                    error = %error,
                    "draft delete failed; record left orphaned for the sweep"
                );
                outcome.failed.push((child_id, error));
            }
        }
    }
    outcome
}

/// Result of one orphaned-draft sweep pass.
#[derive(Debug)]
pub struct SweepReport {
    /// Drafts inspected before the age filter.
    pub examined: usize,
    /// Drafts older than the cutoff. In a dry run these are only listed.
    pub stale: Vec<ChildId>,
    pub deleted: Vec<ChildId>,
    pub failed: Vec<(ChildId, StoreError)>,
    pub cutoff: DateTime<Utc>,
    pub dry_run: bool,
}

/// Delete draft children older than `min_age`, optionally narrowed to one
/// parent.
///
/// This is the out-of-band garbage collection for drafts that escaped
/// their workflow (browser crash, failed abandonment delete). `min_age`
/// keeps it from racing a live workflow's freshly created drafts.
pub async fn sweep_orphaned_drafts<S>(
    store: &S,
    parent_id: Option<&ParentId>,
    min_age: Duration,
    dry_run: bool,
) -> Result<SweepReport, StoreError>
where
    S: ChildStore + ?Sized,
{
    let cutoff = Utc::now() - min_age;
    let drafts = store.list_drafts(parent_id).await?;
    let examined = drafts.len();
    let stale: Vec<DraftChild> =
        drafts.into_iter().filter(|draft| draft.created_at < cutoff).collect();
    let stale_ids: Vec<ChildId> = stale.iter().map(|draft| draft.id.clone()).collect();

    if dry_run {
        return Ok(SweepReport {
            examined,
            stale: stale_ids,
            deleted: Vec::new(),
            failed: Vec::new(),
            cutoff,
            dry_run,
        });
    }

    let outcome = delete_all(store, &stale).await;
    info!(
        event_name = "sweep.completed",
        examined,
        deleted = outcome.deleted.len(),
        failed = outcome.failed.len(),
        "orphaned draft sweep finished"
    );
    Ok(SweepReport {
        examined,
        stale: stale_ids,
        deleted: outcome.deleted,
        failed: outcome.failed,
        cutoff,
        dry_run,
    })
}
