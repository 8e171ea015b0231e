//! In-memory store of [`Thread`]s, keyed by thread id.

use dashmap::DashMap;
use thiserror::Error;

use super::Thread;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("thread not found: {0}")]
    NotFound(String),
}

/// Concurrent in-memory thread store.
///
/// One process may run several threads at once (e.g. a server fielding multiple
/// sessions); `DashMap` gives per-shard locking instead of a single global lock.
/// This crate does not persist threads to disk — a host embedding it is expected
/// to snapshot `Thread` (it's `Serialize`) on its own schedule.
#[derive(Default)]
pub struct ConversationStore {
    threads: DashMap<String, Thread>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self {
            threads: DashMap::new(),
        }
    }

    pub fn insert(&self, thread: Thread) {
        self.threads.insert(thread.id.clone(), thread);
    }

    pub fn get(&self, id: &str) -> Result<Thread, StoreError> {
        self.threads
            .get(id)
            .map(|t| t.clone())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    pub fn with_mut<F, R>(&self, id: &str, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Thread) -> R,
    {
        let mut entry = self
            .threads
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(f(&mut entry))
    }

    pub fn remove(&self, id: &str) -> Option<Thread> {
        self.threads.remove(id).map(|(_, t)| t)
    }

    pub fn len(&self) -> usize {
        self.threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Message;

    #[test]
    fn insert_then_get_roundtrips() {
        let store = ConversationStore::new();
        let mut thread = Thread::new("t1", 0);
        thread.push(Message::user("hi"), 1);
        store.insert(thread);

        let fetched = store.get("t1").unwrap();
        assert_eq!(fetched.messages.len(), 1);
    }

    #[test]
    fn get_missing_thread_errors() {
        let store = ConversationStore::new();
        assert!(matches!(store.get("missing"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn with_mut_appends_message() {
        let store = ConversationStore::new();
        store.insert(Thread::new("t1", 0));
        store
            .with_mut("t1", |t| t.push(Message::assistant("hello"), 5))
            .unwrap();
        assert_eq!(store.get("t1").unwrap().messages.len(), 1);
    }
}
