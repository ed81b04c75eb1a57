#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session capacity exceeded (max {0} sessions)")]
    CapacityExceeded(usize),

    #[error("IO error: {0}")]
    Io(String),

    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e.to_string())
    }
}
