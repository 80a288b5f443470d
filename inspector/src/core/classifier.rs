//! Classification of mutation batches into selection events.

use std::rc::Rc;

use crate::core::types::{MutationKind, MutationRecord, TrackingOptions};

/// What a single batch means for the current selection.
#[derive(Debug)]
pub struct MutationSummary<F> {
    /// At least one `attributes` record was seen.
    pub attribute_changed: bool,
    /// Target of the first `childList` record after which the selection was
    /// no longer connected. `None` when the selection stayed connected.
    pub detached_parent: Option<Rc<F>>,
}

impl<F> MutationSummary<F> {
    pub fn is_empty(&self) -> bool {
        !self.attribute_changed && self.detached_parent.is_none()
    }
}

/// Classify one batch.
///
/// - Any `attributes` record sets `attribute_changed` once.
/// - Each `childList` record re-checks connectivity until the first check
///   fails; that record's target becomes `detached_parent` and no further
///   checks run for the batch.
/// - Paths disabled in `options` are skipped entirely, so `is_connected` is
///   never invoked when detachment is not tracked.
pub fn classify_mutations<F>(
    records: &[MutationRecord<F>],
    options: &TrackingOptions,
    mut is_connected: impl FnMut() -> bool,
) -> MutationSummary<F> {
    let mut attribute_changed = false;
    let mut detached_parent = None;

    for record in records {
        match record.kind {
            MutationKind::Attributes if options.attributes => attribute_changed = true,
            MutationKind::ChildList
                if options.detached && detached_parent.is_none() && !is_connected() =>
            {
                detached_parent = Some(Rc::clone(&record.target));
            }
            _ => {}
        }
    }

    MutationSummary {
        attribute_changed,
        detached_parent,
    }
}
