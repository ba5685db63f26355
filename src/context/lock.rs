//! Per-token serialization.
//!
//! Generation for one data token is check-then-write against storage; two
//! callers generating the same token at once can race. [`TokenLocks`] lets
//! callers that need it run one operation per token at a time.

use crate::types::DataToken;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One mutex per data token currently in use
#[derive(Debug, Default)]
pub struct TokenLocks {
    locks: Mutex<HashMap<DataToken, Arc<Mutex<()>>>>,
}

impl TokenLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `data`.
    pub fn with_token<T>(&self, data: &DataToken, f: impl FnOnce() -> T) -> T {
        let lock = self
            .locks
            .lock()
            .entry(data.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = lock.lock();
            f()
        };

        let mut locks = self.locks.lock();
        // map entry plus our clone: nobody else is waiting
        if Arc::strong_count(&lock) == 2 {
            locks.remove(data);
        }
        result
    }

    /// Tokens with a lock currently held or awaited.
    pub fn active(&self) -> usize {
        self.locks.lock().len()
    }
}
