//! Snapshot classification and dataset reconciliation for live chart views

pub mod compare;
pub mod reconcile;

// Re-exports
pub use compare::{classify, SnapshotDelta};
pub use reconcile::{reconcile, reconcile_pass};
