//! Test doubles shared by the lifecycle and instance tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arrow::array::Int64Array;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

use cv_core::{
    BasicSpecCompiler, ChartError, CompiledSpec, CreatedView, Finalizer, LiveView, RenderOptions,
    SignalHandler, SpecCompiler, Surface, TabularSnapshot, ViewFactory, ViewOptions,
};

pub fn snapshot(values: &[i64]) -> TabularSnapshot {
    let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, false)]));
    let batch =
        RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(values.to_vec()))]).unwrap();
    TabularSnapshot::new(batch)
}

pub fn rows(count: usize, offset: i64) -> TabularSnapshot {
    snapshot(&(0..count as i64).map(|i| offset + i).collect::<Vec<_>>())
}

pub fn spec_with_data() -> CompiledSpec {
    BasicSpecCompiler
        .compile(
            r#"{ "mark": "bar", "data": { "name": "source" } }"#,
            &RenderOptions::default(),
        )
        .unwrap()
}

pub fn spec_without_data() -> CompiledSpec {
    BasicSpecCompiler
        .compile(r#"{ "mark": "bar" }"#, &RenderOptions::default())
        .unwrap()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewOp {
    Insert(String, usize),
    Replace(String, usize),
    Remove(String),
    Run,
    Resize,
}

/// Live-view double recording every operation
#[derive(Default)]
pub struct MockView {
    ops: Mutex<Vec<ViewOp>>,
    datasets: Mutex<HashSet<String>>,
    listeners: Mutex<HashMap<String, Vec<SignalHandler>>>,
    restored: Mutex<Vec<Value>>,
}

impl MockView {
    pub fn ops(&self) -> Vec<ViewOp> {
        self.ops.lock().clone()
    }

    pub fn restored(&self) -> Vec<Value> {
        self.restored.lock().clone()
    }

    pub fn listener_count(&self, signal: &str) -> usize {
        self.listeners.lock().get(signal).map(Vec::len).unwrap_or(0)
    }
}

#[async_trait]
impl LiveView for MockView {
    fn insert_rows(&self, name: &str, rows: RecordBatch) -> Result<(), ChartError> {
        self.datasets.lock().insert(name.to_string());
        self.ops
            .lock()
            .push(ViewOp::Insert(name.to_string(), rows.num_rows()));
        Ok(())
    }

    fn replace_dataset(&self, name: &str, rows: RecordBatch) -> Result<(), ChartError> {
        self.datasets.lock().insert(name.to_string());
        self.ops
            .lock()
            .push(ViewOp::Replace(name.to_string(), rows.num_rows()));
        Ok(())
    }

    fn remove_dataset(&self, name: &str) -> Result<(), ChartError> {
        if !self.datasets.lock().remove(name) {
            return Err(ChartError::DatasetNotFound(name.to_string()));
        }
        self.ops.lock().push(ViewOp::Remove(name.to_string()));
        Ok(())
    }

    async fn run(&self) -> Result<(), ChartError> {
        self.ops.lock().push(ViewOp::Run);
        Ok(())
    }

    async fn resize(&self) -> Result<(), ChartError> {
        self.ops.lock().push(ViewOp::Resize);
        Ok(())
    }

    fn selection_state(&self, _filter: &[String]) -> Option<Value> {
        None
    }

    fn set_selection_state(&self, state: Value) -> Result<(), ChartError> {
        self.restored.lock().push(state);
        Ok(())
    }

    fn add_signal_listener(&self, signal: &str, handler: SignalHandler) {
        self.listeners
            .lock()
            .entry(signal.to_string())
            .or_default()
            .push(handler);
    }
}

/// View factory double: counts creations and teardowns, optionally fails,
/// optionally holds every creation until released
#[derive(Clone)]
pub struct MockFactory {
    inner: Arc<FactoryInner>,
}

struct FactoryInner {
    views: Mutex<Vec<Arc<MockView>>>,
    teardowns: AtomicUsize,
    fail: bool,
    gate: Option<Notify>,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::build(false, false)
    }

    pub fn failing() -> Self {
        Self::build(true, false)
    }

    pub fn gated() -> Self {
        Self::build(false, true)
    }

    fn build(fail: bool, gated: bool) -> Self {
        Self {
            inner: Arc::new(FactoryInner {
                views: Mutex::new(Vec::new()),
                teardowns: AtomicUsize::new(0),
                fail,
                gate: gated.then(Notify::new),
            }),
        }
    }

    pub fn arc(&self) -> Arc<dyn ViewFactory> {
        Arc::new(self.clone())
    }

    /// Let one gated creation proceed
    pub fn release(&self) {
        if let Some(gate) = &self.inner.gate {
            gate.notify_one();
        }
    }

    pub fn created(&self) -> usize {
        self.inner.views.lock().len()
    }

    pub fn view(&self, index: usize) -> Arc<MockView> {
        self.inner.views.lock()[index].clone()
    }

    pub fn teardowns(&self) -> usize {
        self.inner.teardowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ViewFactory for MockFactory {
    async fn create_view(
        &self,
        _surface: &Surface,
        _spec: &CompiledSpec,
        _options: &ViewOptions,
    ) -> anyhow::Result<CreatedView> {
        if let Some(gate) = &self.inner.gate {
            gate.notified().await;
        }
        if self.inner.fail {
            anyhow::bail!("factory exploded");
        }

        let view = Arc::new(MockView::default());
        self.inner.views.lock().push(view.clone());
        let inner = self.inner.clone();
        Ok(CreatedView {
            view,
            finalize: Finalizer::new(move || {
                inner.teardowns.fetch_add(1, Ordering::SeqCst);
            }),
        })
    }
}
