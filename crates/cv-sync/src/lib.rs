//! Selection-state synchronization between live views and the state store

pub mod debounce;
pub mod synchronizer;

// Re-exports
pub use debounce::{DebounceAction, Debouncer};
pub use synchronizer::{SelectionSynchronizer, DEFAULT_DEBOUNCE};
