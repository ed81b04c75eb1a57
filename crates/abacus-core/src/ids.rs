use std::fmt;
use std::str::FromStr;

/// Identifier of a shared calculator session. Stable for the lifetime of
/// the session; small non-negative integers so they survive round-trips
/// through the decimal wire protocol and the cookie file.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct SessionId(u32);

impl SessionId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid session id: {0:?}")]
pub struct InvalidSessionId(String);

impl FromStr for SessionId {
    type Err = InvalidSessionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u32>()
            .map(Self)
            .map_err(|_| InvalidSessionId(s.to_owned()))
    }
}

/// Identifier of one live connection. Unique while the connection is open;
/// never reused within a process run.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_display_and_parse_roundtrip() {
        let id = SessionId::new(42);
        let s = id.to_string();
        assert_eq!(s, "42");
        let parsed: SessionId = s.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn session_id_rejects_negative_and_garbage() {
        assert!("-1".parse::<SessionId>().is_err());
        assert!("abc".parse::<SessionId>().is_err());
        assert!("".parse::<SessionId>().is_err());
    }

    #[test]
    fn connection_id_display() {
        assert_eq!(ConnectionId::new(7).to_string(), "#7");
    }
}
