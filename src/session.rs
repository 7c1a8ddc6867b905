use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MESSAGES_KEY: &str = "_messages";

/// Opaque per-session key-value storage handed to every handler.
pub trait Session {
    fn get(&self, key: &str) -> Option<&Value>;
    fn set(&mut self, key: &str, value: Value);
    fn remove(&mut self, key: &str) -> Option<Value>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySession {
    data: HashMap<String, Value>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Session for MemorySession {
    fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub level: Level,
    pub text: String,
}

/// Queues a flash message shown on the next rendered page.
pub fn flash(session: &mut dyn Session, level: Level, text: impl Into<String>) {
    let mut queued = peek_messages(session);
    queued.push(Message {
        level,
        text: text.into(),
    });
    match serde_json::to_value(&queued) {
        Ok(value) => session.set(MESSAGES_KEY, value),
        Err(e) => log::error!("Fail to store flash message: {}", e),
    }
}

pub fn peek_messages(session: &dyn Session) -> Vec<Message> {
    session
        .get(MESSAGES_KEY)
        .cloned()
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

pub fn take_messages(session: &mut dyn Session) -> Vec<Message> {
    session
        .remove(MESSAGES_KEY)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

/// Sessions idle longer than this are dropped.
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);
/// Upper bound on stored sessions; the least recently used goes first.
pub const SESSION_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    session: MemorySession,
    touched: Instant,
}

/// Server-side sessions keyed by the `sessionid` cookie.
///
/// Only sessions holding data are kept, so clients that never store
/// anything never take up an entry.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<String, Entry>>>,
    idle_ttl: Duration,
    capacity: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_limits(SESSION_IDLE_TTL, SESSION_CAPACITY)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(idle_ttl: Duration, capacity: usize) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            idle_ttl,
            capacity: capacity.max(1),
        }
    }

    /// Returns a copy of the stored session, or a fresh one under a new key.
    pub fn load(&self, key: Option<&str>) -> (String, MemorySession) {
        self.load_at(key, Instant::now())
    }

    fn load_at(&self, key: Option<&str>, now: Instant) -> (String, MemorySession) {
        if let Some(key) = key {
            if let Ok(sessions) = self.sessions.lock() {
                if let Some(entry) = sessions.get(key) {
                    if now.saturating_duration_since(entry.touched) < self.idle_ttl {
                        return (key.to_string(), entry.session.clone());
                    }
                }
            }
        }
        (uuid::Uuid::new_v4().to_string(), MemorySession::new())
    }

    /// Stores the session under `key`. An empty session is dropped instead.
    /// Returns whether the session is kept.
    pub fn save(&self, key: String, session: MemorySession) -> bool {
        self.save_at(key, session, Instant::now())
    }

    fn save_at(&self, key: String, session: MemorySession, now: Instant) -> bool {
        let mut sessions = match self.sessions.lock() {
            Ok(sessions) => sessions,
            Err(e) => {
                log::error!("Session registry poisoned: {}", e);
                return false;
            }
        };
        if session.is_empty() {
            sessions.remove(&key);
            return false;
        }
        let idle_ttl = self.idle_ttl;
        sessions.retain(|_, entry| now.saturating_duration_since(entry.touched) < idle_ttl);
        if !sessions.contains_key(&key) && sessions.len() >= self.capacity {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.touched)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                log::debug!("Session capacity reached, evicting {}", oldest);
                sessions.remove(&oldest);
            }
        }
        sessions.insert(
            key,
            Entry {
                session,
                touched: now,
            },
        );
        true
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_messages_drain_once() {
        let mut session = MemorySession::new();
        flash(&mut session, Level::Success, "saved");
        flash(&mut session, Level::Warning, "careful");
        assert_eq!(peek_messages(&session).len(), 2);
        let taken = take_messages(&mut session);
        assert_eq!(taken[0].level, Level::Success);
        assert_eq!(taken[1].text, "careful");
        assert!(take_messages(&mut session).is_empty());
    }

    #[test]
    fn registry_keeps_sessions_by_key() {
        let registry = SessionRegistry::new();
        let (key, mut session) = registry.load(None);
        session.set("k", Value::from(1));
        registry.save(key.clone(), session);
        let (same, loaded) = registry.load(Some(&key));
        assert_eq!(same, key);
        assert_eq!(loaded.get("k"), Some(&Value::from(1)));

        let (fresh, empty) = registry.load(Some("unknown"));
        assert_ne!(fresh, "unknown");
        assert!(empty.get("k").is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_sessions_are_not_kept() {
        let registry = SessionRegistry::new();
        for _ in 0..50 {
            let (key, session) = registry.load(None);
            assert!(!registry.save(key, session));
        }
        assert!(registry.is_empty());

        let (key, mut session) = registry.load(None);
        session.set("k", Value::from(1));
        assert!(registry.save(key.clone(), session.clone()));
        session.remove("k");
        assert!(!registry.save(key, session));
        assert!(registry.is_empty());
    }

    #[test]
    fn idle_sessions_expire() {
        let registry = SessionRegistry::with_limits(Duration::from_secs(60), 10);
        let start = Instant::now();
        let mut session = MemorySession::new();
        session.set("k", Value::from(1));
        registry.save_at("old".into(), session.clone(), start);

        let (key, _) = registry.load_at(Some("old"), start + Duration::from_secs(30));
        assert_eq!(key, "old");
        let (key, loaded) = registry.load_at(Some("old"), start + Duration::from_secs(61));
        assert_ne!(key, "old");
        assert!(loaded.is_empty());

        registry.save_at("new".into(), session, start + Duration::from_secs(61));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn least_recently_used_is_evicted_at_capacity() {
        let registry = SessionRegistry::with_limits(Duration::from_secs(60), 2);
        let start = Instant::now();
        let mut session = MemorySession::new();
        session.set("k", Value::from(1));
        registry.save_at("a".into(), session.clone(), start);
        registry.save_at("b".into(), session.clone(), start + Duration::from_secs(1));
        registry.save_at("a".into(), session.clone(), start + Duration::from_secs(2));
        registry.save_at("c".into(), session, start + Duration::from_secs(3));

        assert_eq!(registry.len(), 2);
        let now = start + Duration::from_secs(4);
        assert_eq!(registry.load_at(Some("a"), now).0, "a");
        assert_eq!(registry.load_at(Some("c"), now).0, "c");
        assert_ne!(registry.load_at(Some("b"), now).0, "b");
    }
}
