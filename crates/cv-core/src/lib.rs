//! Core model and collaborator boundaries for the chart view runtime.
//!
//! This crate defines the per-render chart element, the read-only tabular
//! snapshot handle, the rendering-engine and state-store trait seams, and
//! the error taxonomy shared by the reconciliation crates.

pub mod element;
pub mod error;
pub mod selection;
pub mod snapshot;
pub mod spec;
pub mod store;
pub mod view;

// Re-export commonly used types
pub use element::{ChartElement, NamedDataset, SnapshotSet, DEFAULT_DATASET_NAME};
pub use error::ChartError;
pub use selection::SelectionPayload;
pub use snapshot::TabularSnapshot;
pub use spec::{BasicSpecCompiler, CompiledSpec, RenderOptions, SpecCompiler};
pub use store::{MemoryStateStore, StateKey, StateStore, VIEW_STATE};
pub use view::{
    CreatedView, Finalizer, LiveView, SignalHandler, Surface, ViewFactory, ViewOptions,
};
