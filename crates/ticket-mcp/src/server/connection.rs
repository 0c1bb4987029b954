//! Stream connection registry for the pre-session SSE path.
//!
//! Tracks live stream connections and evicts those that exceed the stream
//! lifetime (Cloud Run caps requests at 14 minutes) or go inactive. A
//! background sweep runs every 60 seconds.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::config::defaults;

/// One live stream connection.
#[derive(Debug, Clone)]
pub struct StreamConnection {
    pub connection_id: String,
    pub client_ip: String,
    pub connected_at: Instant,
    pub last_ping: Instant,
    pub credentials: HashMap<String, String>,
    pub is_active: bool,
}

impl StreamConnection {
    /// Whether the connection has outlived the stream timeout.
    #[must_use]
    pub fn is_expired(&self, timeout: Duration) -> bool {
        self.connected_at.elapsed() > timeout
    }
}

/// Registry of live stream connections.
pub struct ConnectionManager {
    connections: Mutex<HashMap<String, StreamConnection>>,
    stream_timeout: Duration,
}

impl ConnectionManager {
    #[must_use]
    pub fn new(stream_timeout: Duration) -> Self {
        Self { connections: Mutex::new(HashMap::new()), stream_timeout }
    }

    /// Register a new connection, returning its ID.
    pub fn connect(&self, client_ip: impl Into<String>, credentials: HashMap<String, String>) -> String {
        let connection_id = uuid::Uuid::new_v4().to_string();
        let now = Instant::now();

        let connection = StreamConnection {
            connection_id: connection_id.clone(),
            client_ip: client_ip.into(),
            connected_at: now,
            last_ping: now,
            credentials,
            is_active: true,
        };

        let mut connections = self.connections.lock().expect("connection table lock");
        connections.insert(connection_id.clone(), connection);

        tracing::info!(connection_id = %connection_id, "Registered stream connection");
        connection_id
    }

    /// Remove a connection.
    pub fn disconnect(&self, connection_id: &str) {
        let mut connections = self.connections.lock().expect("connection table lock");
        if let Some(mut connection) = connections.remove(connection_id) {
            connection.is_active = false;
            tracing::info!(connection_id = %connection_id, "Disconnected stream connection");
        }
    }

    /// Refresh a connection's ping timestamp.
    ///
    /// Returns false (and evicts) when the connection is missing, inactive,
    /// or past the stream timeout.
    pub fn ping(&self, connection_id: &str) -> bool {
        let mut connections = self.connections.lock().expect("connection table lock");

        let Some(connection) = connections.get_mut(connection_id) else {
            return false;
        };

        if connection.is_active && !connection.is_expired(self.stream_timeout) {
            connection.last_ping = Instant::now();
            return true;
        }

        connections.remove(connection_id);
        false
    }

    /// Look up a connection snapshot.
    pub fn get(&self, connection_id: &str) -> Option<StreamConnection> {
        let connections = self.connections.lock().expect("connection table lock");
        connections.get(connection_id).cloned()
    }

    /// Number of active connections.
    pub fn active_count(&self) -> usize {
        let connections = self.connections.lock().expect("connection table lock");
        connections.values().filter(|c| c.is_active).count()
    }

    /// Remove expired and inactive connections. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let mut connections = self.connections.lock().expect("connection table lock");

        let expired: Vec<String> = connections
            .iter()
            .filter(|(_, c)| c.is_expired(self.stream_timeout) || !c.is_active)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            connections.remove(id);
            tracing::info!(connection_id = %id, "Evicted expired stream connection");
        }

        expired.len()
    }

    /// Start the background eviction sweep.
    pub fn start_cleanup_task(self: Arc<Self>) {
        let manager = self;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(defaults::CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                let cleaned = manager.cleanup_expired();
                if cleaned > 0 {
                    tracing::debug!(count = cleaned, "Connection cleanup completed");
                }
            }
        });
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(defaults::STREAM_TIMEOUT)
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager").field("stream_timeout", &self.stream_timeout).finish()
    }
}
