//! Read-only handles over producer-owned tabular data

use std::fmt;
use std::sync::Arc;

use arrow::record_batch::RecordBatch;

/// A cheaply clonable, read-only handle over one tabular snapshot.
///
/// Snapshots are produced upstream and never mutated here. Two handles are
/// compared by identity first (`same_handle`), which keeps the common
/// no-new-data render at O(1); shape and content checks only run when the
/// identity check fails.
#[derive(Clone)]
pub struct TabularSnapshot {
    batch: Arc<RecordBatch>,
}

impl TabularSnapshot {
    /// Wrap a record batch in a shared snapshot handle
    pub fn new(batch: RecordBatch) -> Self {
        Self {
            batch: Arc::new(batch),
        }
    }

    /// Wrap an already shared record batch without copying it
    pub fn from_shared(batch: Arc<RecordBatch>) -> Self {
        Self { batch }
    }

    pub fn row_count(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column_count(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    /// Whether both handles point at the same underlying batch
    pub fn same_handle(&self, other: &TabularSnapshot) -> bool {
        Arc::ptr_eq(&self.batch, &other.batch)
    }

    /// Same column count and column names, in order
    pub fn shape_compatible(&self, other: &TabularSnapshot) -> bool {
        if self.column_count() != other.column_count() {
            return false;
        }
        let ours = self.batch.schema();
        let theirs = other.batch.schema();
        ours.fields()
            .iter()
            .zip(theirs.fields().iter())
            .all(|(a, b)| a.name() == b.name())
    }

    /// All rows, for full inserts and replacements
    pub fn all_rows(&self) -> RecordBatch {
        self.batch.as_ref().clone()
    }

    /// The rows from `from` to the end, zero-copy
    pub fn tail_rows(&self, from: usize) -> RecordBatch {
        self.batch.slice(from, self.row_count() - from)
    }

    /// Whether rows `[0, prefix.row_count())` of `self` are identical to
    /// all of `prefix`. This is the O(rows x columns) append check; callers
    /// short-circuit on `same_handle` before reaching it.
    pub fn starts_with(&self, prefix: &TabularSnapshot) -> bool {
        if prefix.row_count() > self.row_count() || !self.shape_compatible(prefix) {
            return false;
        }
        let head = self.batch.slice(0, prefix.row_count());
        head.columns()
            .iter()
            .zip(prefix.batch.columns().iter())
            .all(|(a, b)| a.to_data() == b.to_data())
    }
}

impl fmt::Debug for TabularSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabularSnapshot")
            .field("rows", &self.row_count())
            .field("columns", &self.column_count())
            .finish()
    }
}
