use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

use abacus_core::{ConnectionId, SessionId};

use crate::error::RegistryError;

/// A live client connection: its outbound send queue and the session it
/// is bound to. The transport itself lives in the connection's own tasks;
/// the registry only ever touches the queue.
pub struct Connection {
    pub id: ConnectionId,
    pub session_id: Option<SessionId>,
    tx: mpsc::Sender<String>,
}

/// Registry of all live connections, bounded by a fixed capacity.
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, Connection>,
    next_id: AtomicU64,
    // Admission count. Claimed before the map insert so two racing
    // registrations can never both squeeze past a nearly-full bound.
    live: AtomicUsize,
    max_connections: usize,
    send_queue: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize, send_queue: usize) -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(0),
            live: AtomicUsize::new(0),
            max_connections,
            send_queue,
        }
    }

    /// Register a new connection. Returns its id and the receiving end of
    /// its send queue, which the connection's writer task drains to the
    /// socket.
    pub fn register(&self) -> Result<(ConnectionId, mpsc::Receiver<String>), RegistryError> {
        let claimed = self
            .live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                (live < self.max_connections).then_some(live + 1)
            });
        if claimed.is_err() {
            return Err(RegistryError::RegistryFull(self.max_connections));
        }
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.send_queue);
        self.connections.insert(
            id,
            Connection {
                id,
                session_id: None,
                tx,
            },
        );
        Ok((id, rx))
    }

    /// Drop a connection. Closing its send queue lets the writer task
    /// drain and exit.
    pub fn unregister(&self, id: ConnectionId) {
        if self.connections.remove(&id).is_some() {
            self.live.fetch_sub(1, Ordering::AcqRel);
        }
    }

    /// Bind a connection to its session for the rest of its lifetime.
    pub fn bind_session(&self, id: ConnectionId, session_id: SessionId) {
        if let Some(mut conn) = self.connections.get_mut(&id) {
            conn.session_id = Some(session_id);
        }
    }

    pub fn session_of(&self, id: ConnectionId) -> Option<SessionId> {
        self.connections.get(&id).and_then(|c| c.session_id)
    }

    /// Queue a message for one connection. A full or closed queue drops
    /// the message.
    pub fn send_to(&self, id: ConnectionId, message: String) -> bool {
        let Some(conn) = self.connections.get(&id) else {
            return false;
        };
        match conn.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(msg)) => {
                tracing::warn!(
                    conn_id = %id,
                    msg_len = msg.len(),
                    "send queue full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Fan a payload out to every connection bound to the session. A slow
    /// or dead peer is logged and skipped, never fatal to the broadcast.
    pub fn broadcast_to_session(&self, session_id: SessionId, text: &str) {
        for entry in self.connections.iter() {
            let conn = entry.value();
            if conn.session_id != Some(session_id) {
                continue;
            }
            if let Err(e) = conn.tx.try_send(text.to_owned()) {
                tracing::warn!(
                    conn_id = %conn.id,
                    session_id = %session_id,
                    error = %e,
                    "skipping connection during broadcast"
                );
            }
        }
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }
}
