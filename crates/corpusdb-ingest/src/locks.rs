use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per corpus name. Holding the guard gives exclusive
/// ingest/delete rights for that corpus only.
#[derive(Default)]
pub struct CorpusLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl CorpusLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, corpus: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(corpus.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Non-blocking probe used by status views.
    pub fn is_locked(&self, corpus: &str) -> bool {
        let map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(corpus).is_some_and(|l| l.try_lock().is_err())
    }
}
