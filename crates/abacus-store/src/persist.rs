//! Whole-snapshot persistence: one file per session id, overwritten in
//! full after every successful mutation. Fixed layout, no schema
//! evolution: 26 records of (defined: u8, value: f64 little-endian).

use std::fs;
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};
use tracing::{debug, warn};

use abacus_core::{Session, SessionId, Slot, SLOT_COUNT};

use crate::error::StoreError;

/// 26 × (1 flag byte + 8 value bytes).
pub const SNAPSHOT_LEN: usize = SLOT_COUNT * 9;

/// Deterministic snapshot path for a session id.
pub fn session_path(dir: &Path, id: SessionId) -> PathBuf {
    dir.join(format!("session{id}.dat"))
}

fn encode(session: &Session) -> BytesMut {
    let mut buf = BytesMut::with_capacity(SNAPSHOT_LEN);
    for slot in Slot::all() {
        match session.get(slot) {
            Some(value) => {
                buf.put_u8(1);
                buf.put_f64_le(value);
            }
            None => {
                buf.put_u8(0);
                buf.put_f64_le(0.0);
            }
        }
    }
    buf
}

fn decode(mut buf: &[u8]) -> Result<Session, StoreError> {
    if buf.len() != SNAPSHOT_LEN {
        return Err(StoreError::CorruptSnapshot(format!(
            "expected {SNAPSHOT_LEN} bytes, got {}",
            buf.len()
        )));
    }

    let mut session = Session::new();
    for slot in Slot::all() {
        let defined = buf.get_u8();
        let value = buf.get_f64_le();
        match defined {
            0 => {}
            1 => session.set(slot, value),
            other => {
                return Err(StoreError::CorruptSnapshot(format!(
                    "bad defined flag {other} for slot '{}'",
                    slot.letter()
                )))
            }
        }
    }
    Ok(session)
}

/// Serialize the snapshot and overwrite the session's file.
pub fn save(dir: &Path, id: SessionId, session: &Session) -> Result<(), StoreError> {
    fs::create_dir_all(dir)?;
    fs::write(session_path(dir, id), encode(session))?;
    Ok(())
}

/// Load one session's snapshot. A missing file is not an error: the
/// session simply has no persisted state yet.
pub fn load(dir: &Path, id: SessionId) -> Result<Option<Session>, StoreError> {
    let path = session_path(dir, id);
    let bytes = match fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    decode(&bytes).map(Some)
}

/// Scan the whole capacity range at startup and return every session
/// found on disk. Corrupt files are logged and skipped so one bad
/// snapshot cannot keep the server from starting.
pub fn load_all(dir: &Path, capacity: usize) -> Vec<(SessionId, Session)> {
    let mut loaded = Vec::new();
    for raw in 0..capacity as u32 {
        let id = SessionId::new(raw);
        match load(dir, id) {
            Ok(Some(session)) => {
                debug!(session_id = %id, defined = session.defined_count(), "loaded session");
                loaded.push((id, session));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(session_id = %id, error = %e, "skipping unreadable session file");
            }
        }
    }
    loaded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("abacus-store-test-{}", uuid::Uuid::now_v7()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn slot(c: char) -> Slot {
        Slot::from_letter(c).unwrap()
    }

    #[test]
    fn session_path_is_deterministic() {
        let dir = Path::new("/data");
        assert_eq!(
            session_path(dir, SessionId::new(3)),
            PathBuf::from("/data/session3.dat")
        );
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = temp_dir();
        let id = SessionId::new(0);

        let mut session = Session::new();
        session.set(slot('a'), 5.0);
        session.set(slot('z'), -0.125);
        // Past the 1000-magnitude render threshold; persistence stores the
        // raw f64 either way.
        session.set(slot('m'), 123456.789);

        save(&dir, id, &session).unwrap();
        let loaded = load(&dir, id).unwrap().unwrap();
        assert_eq!(loaded, session);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn save_overwrites_whole_file() {
        let dir = temp_dir();
        let id = SessionId::new(1);

        let mut session = Session::new();
        session.set(slot('a'), 1.0);
        save(&dir, id, &session).unwrap();

        session.set(slot('b'), 2.0);
        save(&dir, id, &session).unwrap();

        let loaded = load(&dir, id).unwrap().unwrap();
        assert_eq!(loaded.get(slot('a')), Some(1.0));
        assert_eq!(loaded.get(slot('b')), Some(2.0));
        assert_eq!(
            fs::metadata(session_path(&dir, id)).unwrap().len(),
            SNAPSHOT_LEN as u64
        );

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = temp_dir();
        assert!(load(&dir, SessionId::new(9)).unwrap().is_none());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn short_file_is_corrupt() {
        let dir = temp_dir();
        let id = SessionId::new(2);
        fs::write(session_path(&dir, id), [1u8, 2, 3]).unwrap();
        assert!(matches!(
            load(&dir, id),
            Err(StoreError::CorruptSnapshot(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn bad_defined_flag_is_corrupt() {
        let dir = temp_dir();
        let id = SessionId::new(3);
        let mut bytes = vec![0u8; SNAPSHOT_LEN];
        bytes[0] = 7;
        fs::write(session_path(&dir, id), bytes).unwrap();
        assert!(matches!(
            load(&dir, id),
            Err(StoreError::CorruptSnapshot(_))
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_all_scans_capacity_range_and_skips_corrupt() {
        let dir = temp_dir();

        let mut a = Session::new();
        a.set(slot('a'), 1.0);
        save(&dir, SessionId::new(0), &a).unwrap();

        let mut b = Session::new();
        b.set(slot('b'), 2.0);
        save(&dir, SessionId::new(5), &b).unwrap();

        fs::write(session_path(&dir, SessionId::new(2)), [0u8; 10]).unwrap();

        let loaded = load_all(&dir, 8);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].0, SessionId::new(0));
        assert_eq!(loaded[1].0, SessionId::new(5));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_all_ignores_ids_past_capacity() {
        let dir = temp_dir();
        let mut s = Session::new();
        s.set(slot('q'), 9.0);
        save(&dir, SessionId::new(20), &s).unwrap();

        assert!(load_all(&dir, 8).is_empty());
        let _ = fs::remove_dir_all(&dir);
    }
}
