//! In-memory session store with TTL expiry.
//!
//! Good for single-process deployments and tests. Expired sessions are
//! dropped lazily on access; there is no background sweeper.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use super::{Session, SessionStore};
use crate::core::{Error, Result};

/// Session backed by an in-process map.
#[derive(Debug)]
pub struct MemorySession {
    id: String,
    data: RwLock<HashMap<String, String>>,
}

impl MemorySession {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            data: RwLock::new(HashMap::new()),
        }
    }
}

impl Session for MemorySession {
    fn get(&self, key: &str) -> Result<String> {
        self.data
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
            .ok_or_else(|| Error::Session(format!("key not found: {}", key)))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.data
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn id(&self) -> String {
        self.id.clone()
    }
}

struct Entry {
    session: Arc<MemorySession>,
    expires_at: Instant,
}

/// Store keeping every session in one process-local map.
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
}

impl MemoryStore {
    /// Create a store whose sessions live for `ttl` after creation or the
    /// last refresh.
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of live (possibly expired, not yet collected) sessions.
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Whether the store holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemoryStore {
    fn generate(&self, id: &str) -> Result<Arc<dyn Session>> {
        let session = Arc::new(MemorySession::new(id));
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                id.to_string(),
                Entry {
                    session: Arc::clone(&session),
                    expires_at: Instant::now() + self.ttl,
                },
            );
        Ok(session)
    }

    fn refresh(&self, id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        match sessions.get_mut(id) {
            Some(entry) => {
                entry.expires_at = Instant::now() + self.ttl;
                Ok(())
            }
            None => Err(Error::Session(format!("session not found: {}", id))),
        }
    }

    fn remove(&self, id: &str) -> Result<()> {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id);
        Ok(())
    }

    fn retrieve(&self, id: &str) -> Result<Arc<dyn Session>> {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        match sessions.get(id) {
            Some(entry) if entry.expires_at > Instant::now() => {
                Ok(Arc::clone(&entry.session) as Arc<dyn Session>)
            }
            Some(_) => {
                sessions.remove(id);
                Err(Error::Session(format!("session expired: {}", id)))
            }
            None => Err(Error::Session(format!("session not found: {}", id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_retrieve() {
        let store = MemoryStore::new(Duration::from_secs(60));
        let session = store.generate("abc").unwrap();
        session.set("user", "alice").unwrap();

        let restored = store.retrieve("abc").unwrap();
        assert_eq!(restored.id(), "abc");
        assert_eq!(restored.get("user").unwrap(), "alice");
        assert!(restored.get("missing").is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let store = MemoryStore::new(Duration::from_secs(60));
        store.generate("abc").unwrap();

        store.remove("abc").unwrap();
        store.remove("abc").unwrap();
        assert!(store.retrieve("abc").is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_expiry_drops_session() {
        let store = MemoryStore::new(Duration::from_millis(1));
        store.generate("abc").unwrap();

        std::thread::sleep(Duration::from_millis(10));

        let err = store.retrieve("abc").unwrap_err();
        assert!(err.to_string().contains("expired"));
        // The expired entry was collected.
        assert!(store.is_empty());
    }

    #[test]
    fn test_refresh_extends_lifetime() {
        let store = MemoryStore::new(Duration::from_millis(40));
        store.generate("abc").unwrap();

        std::thread::sleep(Duration::from_millis(25));
        store.refresh("abc").unwrap();
        std::thread::sleep(Duration::from_millis(25));

        // 50ms after creation but only 25ms after refresh: still alive.
        assert!(store.retrieve("abc").is_ok());
    }

    #[test]
    fn test_refresh_unknown_session_fails() {
        let store = MemoryStore::new(Duration::from_secs(60));
        assert!(store.refresh("missing").is_err());
    }
}
