#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("connection registry full (max {0} connections)")]
    RegistryFull(usize),
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed session id {0:?} in handshake")]
    BadHandshake(String),
}
