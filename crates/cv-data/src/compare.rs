//! Snapshot comparator

use cv_core::TabularSnapshot;

/// Relationship between two successive snapshots of one logical dataset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotDelta {
    /// Same shape, same rows
    NoChange,

    /// The dataset disappeared or became empty
    Removed,

    /// The dataset appeared where there was none
    Added,

    /// The previous rows are an exact prefix of the next snapshot
    Extended { new_rows: usize },

    /// Anything else; the dataset must be replaced wholesale
    DifferentData,
}

/// Classify the relationship between two successive snapshots.
///
/// Pure function of row/column counts and row content. The append check is
/// an O(prev rows x columns) prefix comparison, so callers short-circuit
/// on snapshot identity (`same_handle`) before calling this on every
/// render.
pub fn classify(
    prev: Option<&TabularSnapshot>,
    next: Option<&TabularSnapshot>,
) -> SnapshotDelta {
    let next = match next {
        Some(next) if !next.is_empty() => next,
        _ => return SnapshotDelta::Removed,
    };
    let prev = match prev {
        Some(prev) if !prev.is_empty() => prev,
        _ => return SnapshotDelta::Added,
    };

    if next.starts_with(prev) {
        if next.row_count() > prev.row_count() {
            return SnapshotDelta::Extended {
                new_rows: next.row_count() - prev.row_count(),
            };
        }
        return SnapshotDelta::NoChange;
    }

    SnapshotDelta::DifferentData
}
