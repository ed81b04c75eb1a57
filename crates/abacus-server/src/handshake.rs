//! Session negotiation for a freshly accepted connection: one request
//! line carrying a remembered session id (or `-1` for a new one), one
//! response line carrying the authoritative id.

use abacus_core::SessionId;
use abacus_store::{SessionStore, StoreError};

use crate::error::ProtocolError;

/// The client's opening request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SessionRequest {
    /// `-1`: allocate a fresh session.
    New,
    /// A remembered id, used as-is with no existence check.
    Existing(SessionId),
}

pub fn parse_request(line: &str) -> Result<SessionRequest, ProtocolError> {
    let line = line.trim();
    if line == "-1" {
        return Ok(SessionRequest::New);
    }
    line.parse::<SessionId>()
        .map(SessionRequest::Existing)
        .map_err(|_| ProtocolError::BadHandshake(line.to_owned()))
}

/// Turn a request into the session this connection will be bound to.
/// Existing ids are range-checked against the store capacity but never
/// checked for prior existence; the session comes into being right here.
pub fn resolve(store: &SessionStore, request: SessionRequest) -> Result<SessionId, StoreError> {
    match request {
        SessionRequest::New => store.allocate(),
        SessionRequest::Existing(id) => {
            store.get_or_create(id)?;
            Ok(id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minus_one_requests_a_new_session() {
        assert_eq!(parse_request("-1"), Ok(SessionRequest::New));
        assert_eq!(parse_request(" -1 \n"), Ok(SessionRequest::New));
    }

    #[test]
    fn decimal_id_is_used_as_is() {
        assert_eq!(
            parse_request("17"),
            Ok(SessionRequest::Existing(SessionId::new(17)))
        );
    }

    #[test]
    fn garbage_is_a_protocol_error() {
        assert!(parse_request("banana").is_err());
        assert!(parse_request("-2").is_err());
        assert!(parse_request("").is_err());
    }

    #[test]
    fn new_requests_get_distinct_ids() {
        let store = SessionStore::new(8);
        let a = resolve(&store, SessionRequest::New).unwrap();
        let b = resolve(&store, SessionRequest::New).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn existing_id_resolves_without_existence_check() {
        let store = SessionStore::new(8);
        let id = SessionId::new(5);
        assert_eq!(
            resolve(&store, SessionRequest::Existing(id)).unwrap(),
            id
        );
    }

    #[test]
    fn existing_id_past_capacity_is_rejected() {
        let store = SessionStore::new(4);
        assert!(resolve(&store, SessionRequest::Existing(SessionId::new(64))).is_err());
    }

    #[test]
    fn allocation_fails_when_store_is_full() {
        let store = SessionStore::new(1);
        resolve(&store, SessionRequest::New).unwrap();
        assert!(resolve(&store, SessionRequest::New).is_err());
    }
}
