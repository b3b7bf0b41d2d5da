//! Persisted session storage.
//!
//! A single storage slot holds at most one serialized session. The
//! coordinator writes on every phase change and clears on end, so whatever
//! the slot holds at process start is the one unresolved call worth
//! recovering.

use crate::errors::SessionError;
use crate::session::CallSession;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;

/// Durable slot for the active session.
pub trait SessionStorage: Send + Sync {
    /// Persist the session, replacing any previous one.
    fn save(&self, session: &CallSession) -> Result<(), SessionError>;

    /// Load the stored session, if any.
    fn load(&self) -> Result<Option<CallSession>, SessionError>;

    /// Remove the stored session. Clearing an empty slot is a no-op.
    fn clear(&self) -> Result<(), SessionError>;
}

/// File-backed storage, one JSON document per slot.
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    /// Create storage at the given path. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStorage for FileSessionStorage {
    fn save(&self, session: &CallSession) -> Result<(), SessionError> {
        let json = serde_json::to_vec(session).map_err(|e| SessionError::Storage(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| SessionError::Storage(e.to_string()))?;
        debug!(
            target: "session.storage",
            call_id = %session.call_id,
            phase = session.phase.as_str(),
            "Session persisted"
        );
        Ok(())
    }

    fn load(&self) -> Result<Option<CallSession>, SessionError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionError::Storage(e.to_string())),
        };
        // A corrupt slot is treated as empty rather than wedging startup.
        match serde_json::from_slice(&bytes) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                debug!(target: "session.storage", error = %e, "Discarding unparseable stored session");
                Ok(None)
            }
        }
    }

    fn clear(&self) -> Result<(), SessionError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SessionError::Storage(e.to_string())),
        }
    }
}

/// In-memory storage for tests.
#[derive(Default)]
pub struct MemorySessionStorage {
    slot: Mutex<Option<CallSession>>,
}

impl MemorySessionStorage {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot pre-seeded with a session (recovery tests).
    pub fn with_session(session: CallSession) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }
}

impl SessionStorage for MemorySessionStorage {
    fn save(&self, session: &CallSession) -> Result<(), SessionError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| SessionError::Storage("slot mutex poisoned".to_string()))?;
        *slot = Some(session.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<CallSession>, SessionError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| SessionError::Storage("slot mutex poisoned".to_string()))?;
        Ok(slot.clone())
    }

    fn clear(&self) -> Result<(), SessionError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| SessionError::Storage("slot mutex poisoned".to_string()))?;
        *slot = None;
        Ok(())
    }
}
