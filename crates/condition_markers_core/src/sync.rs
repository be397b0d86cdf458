//! Marker sync protocol against the shared scene store.
//!
//! # Responsibility
//! - Issue batched creates, single-call updates and single-call deletes.
//! - Verify index-to-id alignment of update batches before writing.
//!
//! # Invariants
//! - Create batches never exceed `max_batch_len` and run strictly one after
//!   another; a failed batch leaves earlier batches applied.
//! - An update entry is written only when the store copy at that index has
//!   the requested id; misaligned entries are skipped and reported.
//! - Empty inputs issue no store calls.

use crate::model::item::{AttachmentBehavior, ItemId, SceneItem};
use crate::reconcile::MarkerUpdate;
use crate::store::{SceneStore, StoreResult};
use log::{debug, error, info};

/// Outcome of `apply_creates`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateReport {
    pub batches: usize,
    pub created: usize,
}

/// Update entry whose store copy did not match the requested id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignmentMismatch {
    pub index: usize,
    /// Requested id at `index`; `None` when the store returned extra items.
    pub expected: Option<ItemId>,
    pub actual: ItemId,
}

/// Outcome of `apply_updates`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    pub applied: Vec<ItemId>,
    pub skipped: Vec<AlignmentMismatch>,
}

impl UpdateReport {
    pub fn is_empty(&self) -> bool {
        self.applied.is_empty() && self.skipped.is_empty()
    }
}

/// Adds `items` in sequential batches of at most `max_batch_len`.
///
/// # Errors
/// - Returns the first failing batch's error; later batches are not sent.
pub fn apply_creates<S: SceneStore + ?Sized>(
    store: &S,
    items: &[SceneItem],
    max_batch_len: usize,
) -> StoreResult<CreateReport> {
    let mut report = CreateReport::default();
    for batch in items.chunks(max_batch_len.max(1)) {
        if let Err(err) = store.add_items(batch) {
            error!(
                "event=sync_create module=sync status=error applied_batches={} applied_items={} error={err}",
                report.batches, report.created
            );
            return Err(err);
        }
        report.batches += 1;
        report.created += batch.len();
    }
    if report.created > 0 {
        info!(
            "event=sync_create module=sync status=ok batches={} items={}",
            report.batches, report.created
        );
    }
    Ok(report)
}

/// Writes `updates` with one store call.
///
/// Each store copy receives the planned position, scale and rotation and is
/// detached from parent rotation and scale inheritance.
pub fn apply_updates<S: SceneStore + ?Sized>(
    store: &S,
    updates: &[MarkerUpdate],
) -> StoreResult<UpdateReport> {
    let mut report = UpdateReport::default();
    if updates.is_empty() {
        return Ok(report);
    }

    let ids: Vec<ItemId> = updates.iter().map(|update| update.marker_id).collect();
    let mut mutator = |items: &mut [SceneItem]| {
        for (index, item) in items.iter_mut().enumerate() {
            match updates.get(index) {
                Some(update) if update.marker_id == item.id => {
                    item.position = update.position;
                    item.scale = update.scale;
                    item.rotation = update.rotation;
                    item.disable_attachment_behavior =
                        vec![AttachmentBehavior::Rotation, AttachmentBehavior::Scale];
                    report.applied.push(item.id);
                }
                other => {
                    let expected = other.map(|update| update.marker_id);
                    error!(
                        "event=sync_update module=sync status=skip error_code=id_mismatch index={index} expected={} actual={}",
                        expected.map_or_else(|| "none".to_string(), |id| id.to_string()),
                        item.id
                    );
                    report.skipped.push(AlignmentMismatch {
                        index,
                        expected,
                        actual: item.id,
                    });
                }
            }
        }
    };
    store.update_items(&ids, &mut mutator)?;

    debug!(
        "event=sync_update module=sync status=ok requested={} applied={} skipped={}",
        ids.len(),
        report.applied.len(),
        report.skipped.len()
    );
    Ok(report)
}

/// Deletes `ids` with one store call. Unknown ids are ignored by the store.
pub fn apply_deletes<S: SceneStore + ?Sized>(store: &S, ids: &[ItemId]) -> StoreResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    store.delete_items(ids)?;
    info!(
        "event=sync_delete module=sync status=ok requested={}",
        ids.len()
    );
    Ok(())
}
