use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use abacus_core::{Session, SessionId, Slot};

use crate::error::StoreError;

/// Owns all session state. Every access goes through the store's lock, so
/// updates to a single session are serialized and a snapshot always
/// reflects a fully-applied state. The lock is never held across I/O.
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
    capacity: usize,
}

impl SessionStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Create the session if absent. Ids at or above the capacity are
    /// rejected: the persistence scan could never load them back.
    pub fn get_or_create(&self, id: SessionId) -> Result<(), StoreError> {
        self.check_range(id)?;
        self.sessions.lock().entry(id).or_default();
        Ok(())
    }

    /// Allocate a fresh session: the lowest unused id below the capacity.
    /// This is the `-1` handshake path.
    pub fn allocate(&self) -> Result<SessionId, StoreError> {
        let mut sessions = self.sessions.lock();
        for raw in 0..self.capacity as u32 {
            let id = SessionId::new(raw);
            if let std::collections::hash_map::Entry::Vacant(e) = sessions.entry(id) {
                e.insert(Session::new());
                return Ok(id);
            }
        }
        Err(StoreError::CapacityExceeded(self.capacity))
    }

    /// A copy of the session's full (defined, value) state. An unknown id
    /// reads as all-undefined without creating anything.
    pub fn snapshot(&self, id: SessionId) -> Session {
        self.sessions.lock().get(&id).copied().unwrap_or_default()
    }

    /// Set one slot, creating the session on first write. Returns the
    /// post-apply snapshot taken under the same lock acquisition, so the
    /// caller broadcasts exactly the state this update produced.
    pub fn apply(&self, id: SessionId, slot: Slot, value: f64) -> Result<Session, StoreError> {
        self.check_range(id)?;
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(id).or_default();
        session.set(slot, value);
        Ok(*session)
    }

    /// Remove a session entry. The removal is one atomic step under the
    /// store lock; no reader can observe a half-removed entry.
    pub fn evict(&self, id: SessionId) -> bool {
        self.sessions.lock().remove(&id).is_some()
    }

    /// Seed state loaded from disk at startup, before connections exist.
    pub fn insert_loaded(&self, id: SessionId, session: Session) {
        self.sessions.lock().insert(id, session);
    }

    fn check_range(&self, id: SessionId) -> Result<(), StoreError> {
        if (id.as_u32() as usize) < self.capacity {
            Ok(())
        } else {
            Err(StoreError::CapacityExceeded(self.capacity))
        }
    }
}

impl Clone for SessionStore {
    fn clone(&self) -> Self {
        Self {
            sessions: self.sessions.clone(),
            capacity: self.capacity,
        }
    }
}
