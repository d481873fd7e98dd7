use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::stream::session::SessionHandle;

/// Live stream sessions: `session_id -> handle`.
pub struct SessionRegistry {
    sessions: DashMap<u64, SessionHandle>,
    seq: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            seq: AtomicU64::new(1),
        }
    }

    /// Next session id (monotonic, starts at 1).
    pub fn next_id(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert(&self, handle: SessionHandle) {
        self.sessions.insert(handle.id(), handle);
    }

    pub fn remove(&self, id: u64) -> Option<SessionHandle> {
        self.sessions.remove(&id).map(|(_, h)| h)
    }

    pub fn get(&self, id: u64) -> Option<SessionHandle> {
        self.sessions.get(&id).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Handles of every live session (cloned out so no shard lock is held).
    pub fn snapshot(&self) -> Vec<SessionHandle> {
        self.sessions.iter().map(|r| r.value().clone()).collect()
    }
}
