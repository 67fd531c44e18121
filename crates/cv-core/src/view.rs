//! Rendering-engine boundary: the live view handle and its factory

use std::sync::Arc;

use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChartError;
use crate::spec::CompiledSpec;

/// Handler invoked when a view signal fires
pub type SignalHandler = Box<dyn Fn(&str, &Value) + Send + Sync>;

/// The rendering surface a view is mounted into
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Surface {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

impl Surface {
    pub fn new(id: u64, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Options forwarded to the rendering-engine factory
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewOptions {
    /// Evaluate spec expressions in the sandboxed interpreter
    pub sandboxed_expressions: bool,

    /// Apply the engine's default styling
    pub default_style: bool,

    /// Always render the actions menu
    pub force_actions_menu: bool,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            sandboxed_expressions: true,
            default_style: false,
            force_actions_menu: true,
        }
    }
}

/// The mutable handle for one rendered chart.
///
/// Owned exclusively by the view lifecycle manager; every other component
/// borrows it for the duration of a single call, or holds a `Weak`
/// reference it upgrades per use. Dataset mutations are queued by the
/// engine and flushed by `run`/`resize`.
#[async_trait]
pub trait LiveView: Send + Sync {
    /// Append rows to the named dataset, creating it if absent
    fn insert_rows(&self, name: &str, rows: RecordBatch) -> Result<(), ChartError>;

    /// Clear the named dataset and insert the given rows
    fn replace_dataset(&self, name: &str, rows: RecordBatch) -> Result<(), ChartError>;

    /// Drop the named dataset; fails with `DatasetNotFound` when the view
    /// never saw it
    fn remove_dataset(&self, name: &str) -> Result<(), ChartError>;

    /// Flush pending dataset work and render once
    async fn run(&self) -> Result<(), ChartError>;

    /// Recompute layout bounds and flush
    async fn resize(&self) -> Result<(), ChartError>;

    /// Current selection state, filtered to the given signal names; an
    /// empty filter returns the full state
    fn selection_state(&self, filter: &[String]) -> Option<Value>;

    /// Apply a previously captured selection state
    fn set_selection_state(&self, state: Value) -> Result<(), ChartError>;

    /// Register a listener for a named signal
    fn add_signal_listener(&self, signal: &str, handler: SignalHandler);
}

/// Consumes the engine teardown callback, at most once
pub struct Finalizer(Option<Box<dyn FnOnce() + Send>>);

impl Finalizer {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(teardown)))
    }

    pub fn noop() -> Self {
        Self(None)
    }

    pub fn invoke(mut self) {
        if let Some(teardown) = self.0.take() {
            teardown();
        }
    }
}

/// A freshly created view plus its teardown callback
pub struct CreatedView {
    pub view: Arc<dyn LiveView>,
    pub finalize: Finalizer,
}

/// Asynchronous view factory the rendering engine exposes
#[async_trait]
pub trait ViewFactory: Send + Sync {
    async fn create_view(
        &self,
        surface: &Surface,
        spec: &CompiledSpec,
        options: &ViewOptions,
    ) -> anyhow::Result<CreatedView>;
}
