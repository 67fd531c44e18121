//! Selection synchronizer

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::{json, Map, Value};

use cv_core::selection::store_signal_name;
use cv_core::{LiveView, SelectionPayload, StateKey, StateStore, VIEW_STATE};

use crate::debounce::{DebounceAction, Debouncer};

/// Default quiet window between a selection signal and its persistence
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

/// Keeps user selection state synchronized between one live view and the
/// external state store.
///
/// The synchronizer never holds a strong view reference: listeners and
/// pending debounce firings carry a `Weak` handle and silently drop their
/// work when the view has been finalized underneath them.
pub struct SelectionSynchronizer {
    chart_id: String,
    widget_key: StateKey,
    store: Arc<dyn StateStore>,
    debouncer: Arc<Debouncer>,
    params: Vec<String>,
}

impl SelectionSynchronizer {
    pub fn new(
        chart_id: impl Into<String>,
        form_id: Option<String>,
        store: Arc<dyn StateStore>,
        debounce_window: Duration,
    ) -> Self {
        let chart_id = chart_id.into();
        Self {
            widget_key: StateKey::new(chart_id.clone(), form_id),
            chart_id,
            store,
            debouncer: Arc::new(Debouncer::new(debounce_window)),
            params: Vec::new(),
        }
    }

    /// Active selection parameter names
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Restore persisted selection state into a freshly created view and
    /// register one debounced listener per active selection parameter.
    ///
    /// Called once after every view creation; listeners registered on a
    /// previous view die with it.
    pub fn attach(&mut self, view: &Arc<dyn LiveView>, selection_mode: &[String]) {
        self.params = selection_mode.to_vec();
        if self.params.is_empty() {
            return;
        }

        if !self.chart_id.is_empty() {
            if let Some(state) = self.store.element_state(&self.chart_id, VIEW_STATE) {
                if let Err(err) = view.set_selection_state(state) {
                    // A corrupt or incompatible persisted state must never
                    // abort chart rendering.
                    tracing::warn!(
                        chart = %self.chart_id,
                        error = %err,
                        "could not restore persisted selection state"
                    );
                }
            }
        }

        let filters: Arc<Vec<String>> = Arc::new(
            self.params
                .iter()
                .map(|param| store_signal_name(param))
                .collect(),
        );

        for param in &self.params {
            let action = self.persist_action(view, &filters, param);
            let debouncer = self.debouncer.clone();
            let key = param.clone();
            view.add_signal_listener(
                param,
                Box::new(move |_signal, value| {
                    debouncer.submit(&key, value.clone(), action.clone());
                }),
            );
        }
    }

    /// Reset the externally visible selection to one empty object per
    /// active parameter. Invoked when an enclosing form is cleared.
    pub fn clear(&self) {
        if self.params.is_empty() {
            return;
        }

        let mut selection = Map::new();
        for param in &self.params {
            selection.insert(param.clone(), json!({}));
        }
        let empty = json!({ "selection": selection });

        let current = self.store.get(&self.widget_key);
        if current.as_ref() != Some(&empty) {
            self.store.set(&self.widget_key, empty, true);
        }
    }

    fn persist_action(
        &self,
        view: &Arc<dyn LiveView>,
        filters: &Arc<Vec<String>>,
        param: &str,
    ) -> DebounceAction {
        let view = Arc::downgrade(view);
        let store = self.store.clone();
        let chart_id = self.chart_id.clone();
        let widget_key = self.widget_key.clone();
        let filters = filters.clone();
        let param = param.to_string();

        Arc::new(move |value| {
            persist_selection(
                &view,
                store.as_ref(),
                &chart_id,
                &widget_key,
                &filters,
                &param,
                value,
            );
        })
    }
}

/// One debounced firing: snapshot the view's internal selection stores,
/// then merge the decoded payload into the externally visible state.
fn persist_selection(
    view: &Weak<dyn LiveView>,
    store: &dyn StateStore,
    chart_id: &str,
    widget_key: &StateKey,
    filters: &[String],
    param: &str,
    value: Value,
) {
    let Some(view) = view.upgrade() else {
        tracing::debug!(param, "selection fired after view teardown, dropping");
        return;
    };

    if !chart_id.is_empty() {
        if let Some(state) = view.selection_state(filters) {
            store.set_element_state(chart_id, VIEW_STATE, state);
        }
    }

    let payload = SelectionPayload::from_signal(&value).into_value();

    let current = store.get(widget_key);
    let mut merged = match current.clone() {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    let selection = merged.entry("selection").or_insert_with(|| json!({}));
    if let Some(selection) = selection.as_object_mut() {
        selection.insert(param.to_string(), payload);
    }
    let merged = Value::Object(merged);

    // The store may see concurrent external writers; only publish a
    // user-originated change when the value actually moved.
    if current.as_ref() != Some(&merged) {
        store.set(widget_key, merged, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cv_core::{ChartError, MemoryStateStore, SignalHandler};
    use parking_lot::Mutex;
    use std::collections::HashMap;

    /// View stub with controllable selection stores and live signals
    #[derive(Default)]
    struct ScriptedView {
        listeners: Mutex<HashMap<String, Vec<SignalHandler>>>,
        stores: Mutex<Value>,
        restored: Mutex<Vec<Value>>,
        reject_restore: bool,
    }

    impl ScriptedView {
        fn rejecting_restore() -> Self {
            Self {
                reject_restore: true,
                ..Default::default()
            }
        }

        fn set_stores(&self, value: Value) {
            *self.stores.lock() = value;
        }

        fn fire(&self, signal: &str, value: Value) {
            let listeners = self.listeners.lock();
            if let Some(handlers) = listeners.get(signal) {
                for handler in handlers {
                    handler(signal, &value);
                }
            }
        }

        fn listener_count(&self, signal: &str) -> usize {
            self.listeners
                .lock()
                .get(signal)
                .map(Vec::len)
                .unwrap_or(0)
        }
    }

    #[async_trait]
    impl LiveView for ScriptedView {
        fn insert_rows(
            &self,
            _name: &str,
            _rows: arrow::record_batch::RecordBatch,
        ) -> Result<(), ChartError> {
            Ok(())
        }

        fn replace_dataset(
            &self,
            _name: &str,
            _rows: arrow::record_batch::RecordBatch,
        ) -> Result<(), ChartError> {
            Ok(())
        }

        fn remove_dataset(&self, _name: &str) -> Result<(), ChartError> {
            Ok(())
        }

        async fn run(&self) -> Result<(), ChartError> {
            Ok(())
        }

        async fn resize(&self) -> Result<(), ChartError> {
            Ok(())
        }

        fn selection_state(&self, filter: &[String]) -> Option<Value> {
            let stores = self.stores.lock();
            let full = stores.as_object()?;
            let filtered: Map<String, Value> = full
                .iter()
                .filter(|(name, _)| filter.contains(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            if filtered.is_empty() {
                None
            } else {
                Some(Value::Object(filtered))
            }
        }

        fn set_selection_state(&self, state: Value) -> Result<(), ChartError> {
            if self.reject_restore {
                return Err(ChartError::StateRestore("incompatible state".to_string()));
            }
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

    /// Store wrapper that counts user-originated widget writes
    struct CountingStore {
        inner: MemoryStateStore,
        writes: Mutex<Vec<(StateKey, Value, bool)>>,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStateStore::new(),
                writes: Mutex::new(Vec::new()),
            }
        }

        fn writes(&self) -> Vec<(StateKey, Value, bool)> {
            self.writes.lock().clone()
        }
    }

    impl StateStore for CountingStore {
        fn get(&self, key: &StateKey) -> Option<Value> {
            self.inner.get(key)
        }

        fn set(&self, key: &StateKey, value: Value, from_ui: bool) {
            self.writes.lock().push((key.clone(), value.clone(), from_ui));
            self.inner.set(key, value, from_ui);
        }

        fn element_state(&self, owner_id: &str, name: &str) -> Option<Value> {
            self.inner.element_state(owner_id, name)
        }

        fn set_element_state(&self, owner_id: &str, name: &str, value: Value) {
            self.inner.set_element_state(owner_id, name, value);
        }
    }

    fn synchronizer(store: &Arc<CountingStore>) -> SelectionSynchronizer {
        SelectionSynchronizer::new(
            "chart-1",
            Some("form-a".to_string()),
            store.clone() as Arc<dyn StateStore>,
            DEFAULT_DEBOUNCE,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_firings_persist_once_with_latest_value() {
        // Scenario D: two firings inside the window, one write with {a:2}.
        let store = Arc::new(CountingStore::new());
        let scripted = Arc::new(ScriptedView::default());
        let view: Arc<dyn LiveView> = scripted.clone();

        let mut sync = synchronizer(&store);
        sync.attach(&view, &["brush".to_string()]);

        scripted.fire("brush", json!({ "a": 1 }));
        scripted.fire("brush", json!({ "a": 2 }));
        tokio::time::sleep(Duration::from_millis(300)).await;

        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        let (key, value, from_ui) = &writes[0];
        assert_eq!(key, &StateKey::new("chart-1", Some("form-a".to_string())));
        assert_eq!(value, &json!({ "selection": { "brush": { "a": 2 } } }));
        assert!(from_ui);
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_state_is_persisted_filtered_to_param_stores() {
        let store = Arc::new(CountingStore::new());
        let scripted = Arc::new(ScriptedView::default());
        scripted.set_stores(json!({
            "brush_store": [{ "fields": [], "values": [] }],
            "unrelated": true
        }));
        let view: Arc<dyn LiveView> = scripted.clone();

        let mut sync = synchronizer(&store);
        sync.attach(&view, &["brush".to_string()]);

        scripted.fire("brush", json!({ "a": 1 }));
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(
            store.element_state("chart-1", VIEW_STATE),
            Some(json!({ "brush_store": [{ "fields": [], "values": [] }] }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_point_wrapper_is_unwrapped_before_merge() {
        let store = Arc::new(CountingStore::new());
        let scripted = Arc::new(ScriptedView::default());
        let view: Arc<dyn LiveView> = scripted.clone();

        let mut sync = synchronizer(&store);
        sync.attach(&view, &["point".to_string()]);

        scripted.fire(
            "point",
            json!({ "vlPoint": { "or": [{ "i": 3 }] }, "i": [3] }),
        );
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(
            store.get(&StateKey::new("chart-1", Some("form-a".to_string()))),
            Some(json!({ "selection": { "point": [{ "i": 3 }] } }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_state_is_not_rewritten() {
        let store = Arc::new(CountingStore::new());
        let key = StateKey::new("chart-1", Some("form-a".to_string()));
        store
            .inner
            .set(&key, json!({ "selection": { "brush": { "a": 1 } } }), false);

        let scripted = Arc::new(ScriptedView::default());
        let view: Arc<dyn LiveView> = scripted.clone();
        let mut sync = synchronizer(&store);
        sync.attach(&view, &["brush".to_string()]);

        scripted.fire("brush", json!({ "a": 1 }));
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(store.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_merge_preserves_other_params() {
        let store = Arc::new(CountingStore::new());
        let key = StateKey::new("chart-1", Some("form-a".to_string()));
        store
            .inner
            .set(&key, json!({ "selection": { "point": [{ "i": 1 }] } }), false);

        let scripted = Arc::new(ScriptedView::default());
        let view: Arc<dyn LiveView> = scripted.clone();
        let mut sync = synchronizer(&store);
        sync.attach(&view, &["brush".to_string(), "point".to_string()]);

        scripted.fire("brush", json!({ "x": [0, 4] }));
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(
            store.get(&key),
            Some(json!({
                "selection": {
                    "brush": { "x": [0, 4] },
                    "point": [{ "i": 1 }]
                }
            }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_restore_applies_persisted_state() {
        let store = Arc::new(CountingStore::new());
        store
            .inner
            .set_element_state("chart-1", VIEW_STATE, json!({ "brush_store": [1, 2] }));

        let scripted = Arc::new(ScriptedView::default());
        let view: Arc<dyn LiveView> = scripted.clone();
        let mut sync = synchronizer(&store);
        sync.attach(&view, &["brush".to_string()]);

        assert_eq!(
            scripted.restored.lock().clone(),
            vec![json!({ "brush_store": [1, 2] })]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupt_restore_is_swallowed() {
        let store = Arc::new(CountingStore::new());
        store
            .inner
            .set_element_state("chart-1", VIEW_STATE, json!("garbage"));

        let scripted = Arc::new(ScriptedView::rejecting_restore());
        let view: Arc<dyn LiveView> = scripted.clone();
        let mut sync = synchronizer(&store);
        sync.attach(&view, &["brush".to_string()]);

        // Rendering proceeds: the listener is registered regardless.
        assert_eq!(scripted.listener_count("brush"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_listeners_without_selection_params() {
        let store = Arc::new(CountingStore::new());
        let scripted = Arc::new(ScriptedView::default());
        let view: Arc<dyn LiveView> = scripted.clone();

        let mut sync = synchronizer(&store);
        sync.attach(&view, &[]);

        assert_eq!(scripted.listener_count("brush"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_writes_one_empty_object_per_param() {
        // Scenario E: a held selection resets to {selection:{brush:{}}}.
        let store = Arc::new(CountingStore::new());
        let key = StateKey::new("chart-1", Some("form-a".to_string()));
        store
            .inner
            .set(&key, json!({ "selection": { "brush": { "a": 2 } } }), false);

        let scripted = Arc::new(ScriptedView::default());
        let view: Arc<dyn LiveView> = scripted.clone();
        let mut sync = synchronizer(&store);
        sync.attach(&view, &["brush".to_string()]);

        sync.clear();
        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1, json!({ "selection": { "brush": {} } }));
        assert!(writes[0].2);

        // Clearing an already empty selection writes nothing.
        sync.clear();
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_firing_after_teardown_is_dropped() {
        let store = Arc::new(CountingStore::new());
        let scripted = Arc::new(ScriptedView::default());
        let view: Arc<dyn LiveView> = scripted.clone();

        let mut sync = synchronizer(&store);
        sync.attach(&view, &["brush".to_string()]);

        scripted.fire("brush", json!({ "a": 1 }));
        drop(view);
        drop(scripted);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(store.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_state_is_scoped_per_instance() {
        // Two charts debouncing the same parameter name must not coalesce
        // into one firing.
        let store = Arc::new(CountingStore::new());
        let first_view = Arc::new(ScriptedView::default());
        let second_view = Arc::new(ScriptedView::default());

        let mut first = SelectionSynchronizer::new(
            "chart-1",
            None,
            store.clone() as Arc<dyn StateStore>,
            DEFAULT_DEBOUNCE,
        );
        let mut second = SelectionSynchronizer::new(
            "chart-2",
            None,
            store.clone() as Arc<dyn StateStore>,
            DEFAULT_DEBOUNCE,
        );
        first.attach(&(first_view.clone() as Arc<dyn LiveView>), &["brush".to_string()]);
        second.attach(
            &(second_view.clone() as Arc<dyn LiveView>),
            &["brush".to_string()],
        );

        first_view.fire("brush", json!({ "chart": 1 }));
        second_view.fire("brush", json!({ "chart": 2 }));
        tokio::time::sleep(Duration::from_millis(300)).await;

        let writes = store.writes();
        assert_eq!(writes.len(), 2);
        assert!(writes
            .iter()
            .any(|(key, _, _)| key == &StateKey::new("chart-1", None)));
        assert!(writes
            .iter()
            .any(|(key, _, _)| key == &StateKey::new("chart-2", None)));
    }
}
