//! External state store boundary and an in-process reference implementation

use ahash::AHashMap;
use parking_lot::RwLock;
use serde_json::Value;

/// Name under which a chart's engine view state is persisted
pub const VIEW_STATE: &str = "viewState";

/// Key addressing one widget's externally visible state
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub widget_id: String,
    pub form_id: Option<String>,
}

impl StateKey {
    pub fn new(widget_id: impl Into<String>, form_id: Option<String>) -> Self {
        Self {
            widget_id: widget_id.into(),
            form_id,
        }
    }
}

/// Shared key-value store for widget and element state.
///
/// The store is externally synchronized: reads and writes are
/// last-write-wins at the granularity of a single key, and writers must
/// tolerate concurrent external updates, hence the compare-before-write
/// guard in the synchronizer. All values are JSON-serializable.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &StateKey) -> Option<Value>;

    /// `from_ui` tags the write as user-originated
    fn set(&self, key: &StateKey, value: Value, from_ui: bool);

    /// Per-element state slot, keyed by owner id and slot name
    fn element_state(&self, owner_id: &str, name: &str) -> Option<Value>;

    fn set_element_state(&self, owner_id: &str, name: &str, value: Value);
}

/// In-process store used by tests and single-process embedders
#[derive(Default)]
pub struct MemoryStateStore {
    widgets: RwLock<AHashMap<StateKey, Value>>,
    elements: RwLock<AHashMap<(String, String), Value>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn get(&self, key: &StateKey) -> Option<Value> {
        self.widgets.read().get(key).cloned()
    }

    fn set(&self, key: &StateKey, value: Value, _from_ui: bool) {
        self.widgets.write().insert(key.clone(), value);
    }

    fn element_state(&self, owner_id: &str, name: &str) -> Option<Value> {
        self.elements
            .read()
            .get(&(owner_id.to_string(), name.to_string()))
            .cloned()
    }

    fn set_element_state(&self, owner_id: &str, name: &str, value: Value) {
        self.elements
            .write()
            .insert((owner_id.to_string(), name.to_string()), value);
    }
}
