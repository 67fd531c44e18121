//! Dataset diff engine

use cv_core::{ChartError, LiveView, SnapshotSet, TabularSnapshot};

use crate::compare::{classify, SnapshotDelta};

/// Reconcile one named dataset inside a live view.
///
/// Side-effects only the named dataset; the blanket `resize` belongs to
/// `reconcile_pass`. The view handle is borrowed for this call only.
pub fn reconcile(
    view: &dyn LiveView,
    name: &str,
    prev: Option<&TabularSnapshot>,
    next: Option<&TabularSnapshot>,
) -> Result<(), ChartError> {
    // Identity short-circuit: an untouched producer handle means no new data.
    if let (Some(prev), Some(next)) = (prev, next) {
        if prev.same_handle(next) {
            return Ok(());
        }
    }

    let verdict = classify(prev, next);
    tracing::trace!(dataset = name, ?verdict, "reconciling dataset");

    match (verdict, next) {
        (SnapshotDelta::NoChange, _) => {}
        (SnapshotDelta::Removed, _) => {
            // Nothing was ever inserted under this name when prev is empty;
            // touching the view would clobber an aliased dataset.
            if prev.map(|prev| !prev.is_empty()).unwrap_or(false) {
                match view.remove_dataset(name) {
                    Err(ChartError::DatasetNotFound(_)) => {
                        tracing::debug!(dataset = name, "dataset already absent from view");
                    }
                    result => result?,
                }
            }
        }
        (SnapshotDelta::Added, Some(next)) => {
            view.insert_rows(name, next.all_rows())?;
        }
        (SnapshotDelta::Extended { new_rows }, Some(next)) => {
            view.insert_rows(name, next.tail_rows(next.row_count() - new_rows))?;
        }
        (SnapshotDelta::DifferentData, Some(next)) => {
            view.replace_dataset(name, next.all_rows())?;
        }
        // classify never yields an insert verdict without a next snapshot
        _ => {}
    }

    Ok(())
}

/// Reconcile an entire render pass against the view.
///
/// Processes the primary snapshot under the default dataset name, then
/// every named dataset, then sweeps datasets that were present in the
/// previous render but are absent now (the default name excluded), and
/// finally issues exactly one `resize` since row-count changes can move
/// layout bounds.
pub async fn reconcile_pass(
    view: &dyn LiveView,
    prev: &SnapshotSet,
    next: &SnapshotSet,
    default_dataset: &str,
) -> Result<(), ChartError> {
    reconcile(
        view,
        default_dataset,
        prev.primary.as_ref(),
        next.primary.as_ref(),
    )?;

    for (name, snapshot) in &next.named {
        reconcile(view, name, prev.named.get(name), Some(snapshot))?;
    }

    for (name, snapshot) in &prev.named {
        if name != default_dataset && !next.named.contains_key(name) {
            reconcile(view, name, Some(snapshot), None)?;
        }
    }

    view.resize().await
}
