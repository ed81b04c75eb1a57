//! Per-connection lifecycle: handshake, then the active command loop.
//!
//! Reading is the only place a connection blocks; store access,
//! evaluation and persistence all complete without awaiting, and no lock
//! is held across the socket.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use abacus_core::{ConnectionId, SessionId};
use abacus_store::persist;

use crate::handshake;
use crate::server::ServerState;

pub async fn handle_connection(stream: TcpStream, peer: SocketAddr, state: ServerState) {
    let (read_half, mut write_half) = stream.into_split();

    let (conn_id, rx) = match state.registry.register() {
        Ok(pair) => pair,
        Err(e) => {
            warn!(%peer, error = %e, "rejecting connection");
            let _ = write_half
                .write_all(format!("ERROR: {e}\n").as_bytes())
                .await;
            return;
        }
    };

    // Writer task drains the send queue to the socket; it exits once the
    // queue closes (unregister) or the peer goes away.
    let writer = tokio::spawn(write_loop(rx, write_half));

    let mut lines = BufReader::new(read_half).lines();

    let session_id = match negotiate(&state, &mut lines).await {
        Ok(id) => id,
        Err(diagnostic) => {
            if let Some(diagnostic) = diagnostic {
                warn!(conn_id = %conn_id, %peer, error = %diagnostic, "handshake failed");
                state.registry.send_to(conn_id, format!("ERROR: {diagnostic}\n"));
            }
            state.registry.unregister(conn_id);
            let _ = writer.await;
            return;
        }
    };

    state.registry.bind_session(conn_id, session_id);
    state.registry.send_to(conn_id, format!("{session_id}\n"));
    info!(conn_id = %conn_id, session_id = %session_id, %peer, "connection bound");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            // EOF and read errors end the connection exactly like `exit`.
            Ok(None) => break,
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "transport read failed");
                break;
            }
        };

        let command = line.trim();
        if command.eq_ignore_ascii_case("exit") {
            break;
        }

        process_command(&state, conn_id, session_id, command).await;
    }

    state.registry.unregister(conn_id);
    info!(conn_id = %conn_id, session_id = %session_id, "connection closed");
    let _ = writer.await;
}

/// Receive the handshake request line and resolve the session. `Err(None)`
/// means the peer vanished before handshaking; `Err(Some(..))` carries the
/// diagnostic to send before closing.
async fn negotiate<R>(
    state: &ServerState,
    lines: &mut tokio::io::Lines<R>,
) -> Result<SessionId, Option<String>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let line = match lines.next_line().await {
        Ok(Some(line)) => line,
        _ => return Err(None),
    };
    let request = handshake::parse_request(&line).map_err(|e| Some(e.to_string()))?;
    handshake::resolve(&state.store, request).map_err(|e| Some(e.to_string()))
}

/// One Active-state command: evaluate, apply, broadcast, persist. A
/// rejected line produces a diagnostic to the originating connection only
/// and leaves the session untouched.
async fn process_command(
    state: &ServerState,
    conn_id: ConnectionId,
    session_id: SessionId,
    command: &str,
) {
    let snapshot = state.store.snapshot(session_id);
    let (slot, value) = match abacus_engine::evaluate(&snapshot, command) {
        Ok(update) => update,
        Err(e) => {
            debug!(conn_id = %conn_id, command, error = %e, "rejected command");
            state
                .registry
                .send_to(conn_id, format!("ERROR: {command:?}: {e}\n"));
            return;
        }
    };

    let updated = match state.store.apply(session_id, slot, value) {
        Ok(updated) => updated,
        Err(e) => {
            state.registry.send_to(conn_id, format!("ERROR: {e}\n"));
            return;
        }
    };

    state
        .registry
        .broadcast_to_session(session_id, &updated.render());

    // Best-effort durability: a failed save never disturbs the in-memory
    // session or the connection. The file write runs off the runtime
    // thread and is awaited so saves stay ordered per connection.
    let data_dir = state.data_dir.clone();
    match tokio::task::spawn_blocking(move || persist::save(&data_dir, session_id, &updated)).await
    {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!(session_id = %session_id, error = %e, "failed to persist session");
        }
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "persistence task failed");
        }
    }
}

async fn write_loop(mut rx: mpsc::Receiver<String>, mut write_half: OwnedWriteHalf) {
    while let Some(message) = rx.recv().await {
        if write_half.write_all(message.as_bytes()).await.is_err() {
            break;
        }
    }
}
