use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use abacus_store::{persist, SessionStore};

use crate::connection::ConnectionRegistry;
use crate::handler;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding one snapshot file per session.
    pub data_dir: PathBuf,
    pub max_sessions: usize,
    pub max_connections: usize,
    pub send_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 9000,
            data_dir: PathBuf::from("./sessions"),
            max_sessions: 128,
            max_connections: 128,
            send_queue: 256,
        }
    }
}

/// Shared state handed to every connection task.
#[derive(Clone)]
pub struct ServerState {
    pub store: SessionStore,
    pub registry: Arc<ConnectionRegistry>,
    pub data_dir: PathBuf,
}

/// Handle returned by `start()` — keeps the accept loop alive.
pub struct ServerHandle {
    pub port: u16,
    _accept: tokio::task::JoinHandle<()>,
}

/// Load persisted sessions, bind the listener and start accepting. A bind
/// or listen failure is the fatal startup path, surfaced to the caller.
pub async fn start(config: ServerConfig) -> Result<ServerHandle, std::io::Error> {
    let store = SessionStore::new(config.max_sessions);
    for (id, session) in persist::load_all(&config.data_dir, config.max_sessions) {
        store.insert_loaded(id, session);
    }
    info!(sessions = store.count(), "loaded persisted sessions");

    let registry = Arc::new(ConnectionRegistry::new(
        config.max_connections,
        config.send_queue,
    ));

    let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "server listening");

    let state = ServerState {
        store,
        registry,
        data_dir: config.data_dir,
    };

    let accept = tokio::spawn(accept_loop(listener, state));

    Ok(ServerHandle {
        port: local_addr.port(),
        _accept: accept,
    })
}

/// Accept connections forever, one handler task each. The accept loop
/// itself never waits on handler work.
async fn accept_loop(listener: TcpListener, state: ServerState) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tokio::spawn(handler::handle_connection(stream, peer, state.clone()));
            }
            Err(e) => {
                warn!(error = %e, "accept failed");
            }
        }
    }
}
