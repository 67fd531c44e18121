//! Per-chart instance record and update orchestration

use std::sync::Arc;

use cv_core::{
    ChartElement, ChartError, LiveView, RenderOptions, SnapshotSet, SpecCompiler, StateStore,
    Surface, ViewFactory,
};
use cv_data::reconcile_pass;
use cv_sync::{SelectionSynchronizer, DEFAULT_DEBOUNCE};

use crate::lifecycle::ViewLifecycleManager;

/// All cross-render state of one chart, owned in a single record.
///
/// On every update pass this record decides whether the live view can be
/// patched in place (data-only change) or must be rebuilt (compiled-spec
/// change), and hands the borrowed view to the diff engine or the
/// synchronizer for the duration of that pass only.
pub struct ChartInstance {
    chart_id: String,
    compiler: Arc<dyn SpecCompiler>,
    lifecycle: ViewLifecycleManager,
    synchronizer: SelectionSynchronizer,

    /// Snapshots of the previous render, for diffing
    prev: SnapshotSet,

    /// Fingerprint the live view was built from
    fingerprint: Option<u64>,

    /// Fingerprint of a creation that failed terminally
    failed_fingerprint: Option<u64>,
}

impl ChartInstance {
    pub fn new(
        chart_id: impl Into<String>,
        form_id: Option<String>,
        factory: Arc<dyn ViewFactory>,
        compiler: Arc<dyn SpecCompiler>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        let chart_id = chart_id.into();
        Self {
            synchronizer: SelectionSynchronizer::new(
                chart_id.clone(),
                form_id,
                store,
                DEFAULT_DEBOUNCE,
            ),
            lifecycle: ViewLifecycleManager::new(factory),
            chart_id,
            compiler,
            prev: SnapshotSet::default(),
            fingerprint: None,
            failed_fingerprint: None,
        }
    }

    /// Build an instance keyed by an element's identity and enclosing form
    pub fn for_element(
        element: &ChartElement,
        factory: Arc<dyn ViewFactory>,
        compiler: Arc<dyn SpecCompiler>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self::new(
            element.id.clone(),
            element.form_id.clone(),
            factory,
            compiler,
            store,
        )
    }

    pub fn chart_id(&self) -> &str {
        &self.chart_id
    }

    /// Bind or replace the rendering surface; a size change moves the
    /// compiled fingerprint and forces a rebuild on the next update.
    pub fn bind_surface(&self, surface: Surface) {
        self.lifecycle.bind_surface(surface);
    }

    pub fn view(&self) -> Option<Arc<dyn LiveView>> {
        self.lifecycle.view()
    }

    /// Synchronize the live view with a freshly produced element.
    pub async fn update(&mut self, element: &ChartElement) -> Result<(), ChartError> {
        let options = RenderOptions {
            use_container_width: element.use_container_width,
            theme: element.theme.clone(),
            selection_mode: element.selection_mode.clone(),
            surface_size: self.lifecycle.surface().map(|surface| surface.size()),
        };
        // An injection conflict surfaces before any view work happens.
        let compiled = self.compiler.compile(&element.spec, &options)?;
        let next = SnapshotSet::from_element(element);

        let rebuild =
            self.lifecycle.view().is_none() || self.fingerprint != Some(compiled.fingerprint());
        if !rebuild {
            if let Some(view) = self.lifecycle.view() {
                reconcile_pass(
                    view.as_ref(),
                    &self.prev,
                    &next,
                    &self.lifecycle.default_dataset(),
                )
                .await?;
                self.prev = next;
            }
            return Ok(());
        }

        // A failed creation is terminal until its inputs move.
        if self.failed_fingerprint == Some(compiled.fingerprint())
            && same_snapshots(&self.prev, &next)
        {
            tracing::debug!(chart = %self.chart_id, "skipping re-render of failed chart");
            return Ok(());
        }

        match self
            .lifecycle
            .create(&compiled, next.primary.as_ref(), &element.datasets)
            .await
        {
            Ok(Some(view)) => {
                self.synchronizer.attach(&view, &element.selection_mode);
                self.fingerprint = Some(compiled.fingerprint());
                self.failed_fingerprint = None;
                self.prev = next;
                Ok(())
            }
            Ok(None) => {
                // Superseded mid-flight; the superseding pass owns the state.
                tracing::debug!(chart = %self.chart_id, "stale creation discarded");
                Ok(())
            }
            Err(err) => {
                self.failed_fingerprint = Some(compiled.fingerprint());
                self.fingerprint = None;
                self.prev = next;
                Err(err)
            }
        }
    }

    /// Reset the externally visible selection, as when an enclosing form
    /// is cleared.
    pub fn clear_selection(&self) {
        self.synchronizer.clear();
    }

    /// Tear down the live view; the next update rebuilds from scratch.
    pub fn finalize(&mut self) {
        self.lifecycle.finalize();
        self.fingerprint = None;
        self.prev = SnapshotSet::default();
    }
}

/// Whether two render passes carry the exact same snapshot handles
fn same_snapshots(prev: &SnapshotSet, next: &SnapshotSet) -> bool {
    let primary_same = match (&prev.primary, &next.primary) {
        (None, None) => true,
        (Some(a), Some(b)) => a.same_handle(b),
        _ => false,
    };
    primary_same
        && prev.named.len() == next.named.len()
        && next.named.iter().all(|(name, snapshot)| {
            prev.named
                .get(name)
                .map(|previous| previous.same_handle(snapshot))
                .unwrap_or(false)
        })
}
