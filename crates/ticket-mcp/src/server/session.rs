//! Session management for MCP transports.
//!
//! Sessions are identified by 32-character cryptographically random IDs drawn
//! from the visible-ASCII range (0x21-0x7E). Each session carries advisory
//! state, a snapshot of the authentication info it was created with, and a
//! bounded message queue used by the legacy SSE transport to bridge POSTed
//! requests onto the stream.
//!
//! The table is guarded by a single `std::sync::Mutex`; every critical
//! section is O(1) (except the cleanup sweep) and never awaits. The only
//! suspending operation, `wait_next`, awaits on the queue receiver outside
//! the table lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rand::Rng;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::config::defaults;

/// Visible ASCII 0x21-0x7E: everything printable except space and DEL.
const ID_ALPHABET: &[u8] =
    b"!\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~";

/// Check that a client-supplied session ID stays within the allowed charset.
#[must_use]
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| (0x21..=0x7E).contains(&b))
}

struct SessionEntry {
    created_at: Instant,
    last_activity: Instant,
    state: HashMap<String, Value>,
    auth_info: HashMap<String, String>,
    is_active: bool,
    queue_tx: mpsc::Sender<Value>,
    queue_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Value>>>,
}

impl SessionEntry {
    fn new(auth_info: HashMap<String, String>) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(defaults::QUEUE_CAPACITY);
        let now = Instant::now();
        Self {
            created_at: now,
            last_activity: now,
            state: HashMap::new(),
            auth_info,
            is_active: true,
            queue_tx,
            queue_rx: Arc::new(tokio::sync::Mutex::new(queue_rx)),
        }
    }
}

/// Session metadata safe to render; auth values are masked.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub age_secs: u64,
    pub idle_secs: u64,
    pub is_active: bool,
    pub state_keys: Vec<String>,
    pub auth_info: HashMap<String, String>,
}

/// Manages MCP sessions for one transport.
pub struct SessionManager {
    sessions: Mutex<HashMap<String, SessionEntry>>,
    max_age: Duration,
    idle_timeout: Duration,
}

impl SessionManager {
    /// Create a manager with the given age and inactivity limits.
    #[must_use]
    pub fn new(max_age: Duration, idle_timeout: Duration) -> Self {
        Self { sessions: Mutex::new(HashMap::new()), max_age, idle_timeout }
    }

    /// Create a new session, returning its ID.
    ///
    /// The ID is 32 characters of visible ASCII; collisions are vanishingly
    /// unlikely but checked anyway.
    pub fn create(&self, auth_info: HashMap<String, String>) -> String {
        let mut sessions = self.sessions.lock().expect("session table lock");

        let mut id = generate_id();
        while sessions.contains_key(&id) {
            id = generate_id();
        }

        sessions.insert(id.clone(), SessionEntry::new(auth_info));
        tracing::info!(session_id = %id, "Created new session");
        id
    }

    /// Check that a session exists, is active, and has not outlived its
    /// maximum age. An over-age session is removed as a side effect.
    pub fn validate(&self, id: &str) -> bool {
        let mut sessions = self.sessions.lock().expect("session table lock");

        let Some(entry) = sessions.get_mut(id) else {
            return false;
        };

        if entry.created_at.elapsed() > self.max_age {
            entry.is_active = false;
            sessions.remove(id);
            return false;
        }

        sessions.get(id).is_some_and(|e| e.is_active)
    }

    /// Refresh a session's last-activity timestamp.
    pub fn touch(&self, id: &str) {
        let mut sessions = self.sessions.lock().expect("session table lock");
        if let Some(entry) = sessions.get_mut(id) {
            entry.last_activity = Instant::now();
        }
    }

    /// The auth-info value stored under `key` at session creation.
    pub fn auth_info_value(&self, id: &str, key: &str) -> Option<String> {
        let mut sessions = self.sessions.lock().expect("session table lock");
        let entry = sessions.get_mut(id)?;
        entry.last_activity = Instant::now();
        entry.auth_info.get(key).cloned()
    }

    /// Store an advisory state value on the session.
    pub fn set_state(&self, id: &str, key: impl Into<String>, value: Value) -> bool {
        let mut sessions = self.sessions.lock().expect("session table lock");
        match sessions.get_mut(id) {
            Some(entry) => {
                entry.state.insert(key.into(), value);
                true
            }
            None => false,
        }
    }

    /// Read an advisory state value, or `default` when absent.
    pub fn get_state(&self, id: &str, key: &str, default: Value) -> Value {
        let sessions = self.sessions.lock().expect("session table lock");
        sessions.get(id).and_then(|e| e.state.get(key).cloned()).unwrap_or(default)
    }

    /// Remove a session.
    pub fn remove(&self, id: &str) -> bool {
        let mut sessions = self.sessions.lock().expect("session table lock");
        match sessions.get_mut(id) {
            Some(entry) => {
                entry.is_active = false;
                sessions.remove(id);
                tracing::info!(session_id = %id, "Removed session");
                true
            }
            None => false,
        }
    }

    /// Remove sessions that are over-age, idle past the inactivity limit, or
    /// flagged inactive. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut sessions = self.sessions.lock().expect("session table lock");

        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, e)| {
                e.created_at.elapsed() > self.max_age
                    || e.last_activity.elapsed() > self.idle_timeout
                    || !e.is_active
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(entry) = sessions.get_mut(id) {
                entry.is_active = false;
            }
            sessions.remove(id);
            tracing::info!(session_id = %id, "Cleaned up expired session");
        }

        expired.len()
    }

    /// Number of live sessions.
    pub fn active_count(&self) -> usize {
        let sessions = self.sessions.lock().expect("session table lock");
        sessions.values().filter(|e| e.is_active).count()
    }

    /// Push a message onto the session's queue for SSE delivery.
    ///
    /// Returns false when the session is gone or the queue is full.
    pub fn enqueue(&self, id: &str, message: Value) -> bool {
        let sessions = self.sessions.lock().expect("session table lock");
        let Some(entry) = sessions.get(id) else {
            tracing::error!(session_id = %id, "Enqueue failed, session not found");
            return false;
        };

        match entry.queue_tx.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(session_id = %id, error = %e, "Enqueue failed, queue unavailable");
                false
            }
        }
    }

    /// Wait up to `timeout` for the next queued message.
    ///
    /// Returns `None` on timeout or when the session is missing. Dropping the
    /// returned future releases the queue waiter.
    pub async fn wait_next(&self, id: &str, timeout: Duration) -> Option<Value> {
        let queue_rx = {
            let sessions = self.sessions.lock().expect("session table lock");
            Arc::clone(&sessions.get(id)?.queue_rx)
        };

        tokio::time::timeout(timeout, async move { queue_rx.lock().await.recv().await })
            .await
            .ok()
            .flatten()
    }

    /// Session metadata for diagnostics; auth values are masked.
    pub fn session_info(&self, id: &str) -> Option<SessionInfo> {
        let sessions = self.sessions.lock().expect("session table lock");
        sessions.get(id).map(|e| SessionInfo {
            session_id: id.to_string(),
            age_secs: e.created_at.elapsed().as_secs(),
            idle_secs: e.last_activity.elapsed().as_secs(),
            is_active: e.is_active,
            state_keys: e.state.keys().cloned().collect(),
            auth_info: e.auth_info.keys().map(|k| (k.clone(), "***".to_string())).collect(),
        })
    }

    /// Start the background cleanup sweep.
    pub fn start_cleanup_task(self: Arc<Self>) {
        let manager = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(defaults::CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                let cleaned = manager.cleanup_expired();
                if cleaned > 0 {
                    tracing::debug!(count = cleaned, "Session cleanup completed");
                }
            }
        });
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(defaults::SESSION_MAX_AGE, defaults::SESSION_MAX_AGE)
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("max_age", &self.max_age)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

fn generate_id() -> String {
    let mut rng = rand::rng();
    (0..defaults::SESSION_ID_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}
