//! Per-key mutual exclusion.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Table of one mutex per key.
///
/// Work on the same key is serialized; work on different keys runs
/// independently. Entries are removed once no caller holds them.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_lock<T>(&self, key: &str, f: impl FnOnce() -> T) -> T {
        let slot = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(key.to_string()).or_default())
        };

        let result = {
            // A panic in another holder leaves no partial record behind, so poisoning is ignored
            let _guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };

        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the table plus ours means nobody else is waiting
        if Arc::strong_count(&slot) == 2 {
            table.remove(key);
        }
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.lock().unwrap().len()
    }
}
