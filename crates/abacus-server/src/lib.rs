pub mod connection;
pub mod error;
pub mod handler;
pub mod handshake;
pub mod server;

pub use connection::ConnectionRegistry;
pub use error::{ProtocolError, RegistryError};
pub use server::{start, ServerConfig, ServerHandle};
