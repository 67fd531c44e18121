//! Timer-based event coalescing

use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;

/// Action invoked with the latest coalesced value once a key goes quiet
pub type DebounceAction = Arc<dyn Fn(Value) + Send + Sync>;

/// Trailing-edge debouncer keyed by parameter name.
///
/// Each submission restarts the quiet window for its key and replaces any
/// value still pending there, so rapid repeated firings collapse to the
/// latest value only. A `Debouncer` is owned by one chart instance; two
/// instances never share a slot map, even for identical parameter names.
pub struct Debouncer {
    window: Duration,
    slots: Arc<Mutex<AHashMap<String, Slot>>>,
}

struct Slot {
    latest: Value,
    action: DebounceAction,
    deadline: Instant,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slots: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of keys with a firing still pending
    pub fn pending(&self) -> usize {
        self.slots.lock().len()
    }

    /// Submit a value for `key`, restarting its quiet window.
    ///
    /// Must be called from within a tokio runtime; the timer task exits on
    /// its own when the debouncer is dropped.
    pub fn submit(&self, key: &str, value: Value, action: DebounceAction) {
        let deadline = Instant::now() + self.window;
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(key) {
            slot.latest = value;
            slot.action = action;
            slot.deadline = deadline;
            return;
        }

        slots.insert(
            key.to_string(),
            Slot {
                latest: value,
                action,
                deadline,
            },
        );
        drop(slots);

        let weak = Arc::downgrade(&self.slots);
        let key = key.to_string();
        tokio::spawn(async move {
            loop {
                let deadline = match weak.upgrade() {
                    Some(slots) => match slots.lock().get(&key) {
                        Some(slot) => slot.deadline,
                        None => return,
                    },
                    None => return,
                };
                tokio::time::sleep_until(deadline).await;

                let ready = match weak.upgrade() {
                    Some(slots) => {
                        let mut slots = slots.lock();
                        let due = slots
                            .get(&key)
                            .map(|slot| slot.deadline <= Instant::now())
                            .unwrap_or(false);
                        if due {
                            slots.remove(&key)
                        } else {
                            None
                        }
                    }
                    None => return,
                };

                if let Some(slot) = ready {
                    (slot.action)(slot.latest);
                    return;
                }
                // Deadline moved while we slept; wait out the new window.
            }
        });
    }
}
