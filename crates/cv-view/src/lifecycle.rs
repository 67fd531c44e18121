//! View lifecycle manager

use std::sync::Arc;

use parking_lot::Mutex;

use cv_core::{
    ChartError, CompiledSpec, Finalizer, LiveView, NamedDataset, Surface, TabularSnapshot,
    ViewFactory, ViewOptions, DEFAULT_DATASET_NAME,
};

/// Owns at most one live view per chart instance.
///
/// Creating a new view always finalizes the previous one first; the
/// generation counter detects creations that resolve after they have been
/// superseded or torn down, whose results are discarded silently.
pub struct ViewLifecycleManager {
    factory: Arc<dyn ViewFactory>,
    options: ViewOptions,
    inner: Mutex<LifecycleState>,
}

struct LifecycleState {
    surface: Option<Surface>,
    view: Option<Arc<dyn LiveView>>,
    finalizer: Option<Finalizer>,
    default_dataset: String,
    generation: u64,
}

impl ViewLifecycleManager {
    pub fn new(factory: Arc<dyn ViewFactory>) -> Self {
        Self::with_options(factory, ViewOptions::default())
    }

    pub fn with_options(factory: Arc<dyn ViewFactory>, options: ViewOptions) -> Self {
        Self {
            factory,
            options,
            inner: Mutex::new(LifecycleState {
                surface: None,
                view: None,
                finalizer: None,
                default_dataset: DEFAULT_DATASET_NAME.to_string(),
                generation: 0,
            }),
        }
    }

    /// Bind the rendering surface views are mounted into
    pub fn bind_surface(&self, surface: Surface) {
        self.inner.lock().surface = Some(surface);
    }

    pub fn surface(&self) -> Option<Surface> {
        self.inner.lock().surface
    }

    /// The current live view, if any
    pub fn view(&self) -> Option<Arc<dyn LiveView>> {
        self.inner.lock().view.clone()
    }

    /// The dataset name the primary snapshot is addressed by.
    ///
    /// Resolved once per creation and stable until the next one.
    pub fn default_dataset(&self) -> String {
        self.inner.lock().default_dataset.clone()
    }

    /// Create a view for the compiled spec and seed it with data.
    ///
    /// Returns `Ok(None)` when the creation resolved after being
    /// superseded; the result is discarded and the fresh view finalized.
    pub async fn create(
        &self,
        spec: &CompiledSpec,
        primary: Option<&TabularSnapshot>,
        datasets: &[NamedDataset],
    ) -> Result<Option<Arc<dyn LiveView>>, ChartError> {
        let (surface, generation, finalizer) = {
            let mut state = self.inner.lock();
            let surface = state.surface.ok_or(ChartError::MissingSurface)?;
            // The predecessor is always gone before its replacement exists.
            let finalizer = state.finalizer.take();
            state.view = None;
            state.generation += 1;
            (surface, state.generation, finalizer)
        };
        if let Some(finalizer) = finalizer {
            finalizer.invoke();
        }

        tracing::debug!(fingerprint = spec.fingerprint(), "creating live view");
        let created = self
            .factory
            .create_view(&surface, spec, &self.options)
            .await
            .map_err(|err| ChartError::Factory(err.to_string()))?;

        let default_dataset = resolve_default_dataset(datasets, spec);
        let view = {
            let mut state = self.inner.lock();
            if state.generation != generation {
                drop(state);
                tracing::debug!("creation superseded mid-flight, discarding view");
                created.finalize.invoke();
                return Ok(None);
            }
            state.default_dataset = default_dataset.clone();
            state.view = Some(created.view.clone());
            state.finalizer = Some(created.finalize);
            created.view
        };

        // Seed the primary snapshot and every named dataset.
        if let Some(primary) = primary {
            if !primary.is_empty() {
                view.insert_rows(&default_dataset, primary.all_rows())?;
            }
        }
        for dataset in datasets {
            if !dataset.data.is_empty() {
                view.insert_rows(dataset.effective_name(), dataset.data.all_rows())?;
            }
        }

        view.run().await?;
        // The engine sizes the first paint against an unmeasured container.
        view.resize().await?;

        Ok(Some(view))
    }

    /// Tear down the current view, if any.
    ///
    /// Safe to call repeatedly; the teardown callback runs at most once
    /// per created view.
    pub fn finalize(&self) {
        let finalizer = {
            let mut state = self.inner.lock();
            state.view = None;
            state.generation += 1;
            state.finalizer.take()
        };
        if let Some(finalizer) = finalizer {
            tracing::debug!("finalizing live view");
            finalizer.invoke();
        }
    }
}

/// Default-dataset-name precedence: a single auxiliary dataset lends its
/// name; otherwise the sentinel, which inline spec data also renders under.
fn resolve_default_dataset(datasets: &[NamedDataset], spec: &CompiledSpec) -> String {
    match datasets {
        [only] => only.effective_name().to_string(),
        [] if spec.declares_inline_data() => DEFAULT_DATASET_NAME.to_string(),
        _ => DEFAULT_DATASET_NAME.to_string(),
    }
}
