//! Registry of open sessions on a multi-client server.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::{error, info};

use crate::error::{RegistryError, TerminationReason};
use crate::hooks::SessionHooks;
use crate::session::{SessionHandle, SessionId};

/// Concurrency-safe map of session id → handle.
///
/// Install as the session hooks to have sessions register themselves on
/// establishment and deregister on termination. The lock is never held
/// across an await point.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionHandle>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Returns the number of registered sessions.
    pub fn insert(&self, handle: SessionHandle) -> Result<usize, RegistryError> {
        let mut sessions = self.lock();
        let id = handle.id();
        if sessions.contains_key(&id) {
            return Err(RegistryError::DuplicateSession(id));
        }
        sessions.insert(id, handle);
        Ok(sessions.len())
    }

    /// Deregister a session, returning its handle.
    pub fn remove(&self, id: SessionId) -> Result<SessionHandle, RegistryError> {
        self.lock()
            .remove(&id)
            .ok_or(RegistryError::UnknownSession(id))
    }

    /// Look up a registered session.
    pub fn get(&self, id: SessionId) -> Option<SessionHandle> {
        self.lock().get(&id).cloned()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when no session is registered.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Registered session ids, ascending.
    pub fn ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Handles of all registered sessions.
    pub fn handles(&self) -> Vec<SessionHandle> {
        self.lock().values().cloned().collect()
    }

    /// Ask every registered session to close. Sessions deregister themselves
    /// as they terminate. Returns how many were asked.
    pub fn close_all(&self) -> usize {
        let handles = self.handles();
        for handle in &handles {
            handle.close();
        }
        handles.len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, SessionHandle>> {
        self.sessions.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl SessionHooks for SessionRegistry {
    fn on_session_established(&self, session: &SessionHandle) {
        match self.insert(session.clone()) {
            Ok(active) => info!(
                session = %session.id(),
                peer = %session.peer(),
                active,
                "client connected"
            ),
            Err(err) => error!(error = %err, "session registry invariant violated"),
        }
    }

    fn on_session_terminated(&self, session: &SessionHandle, reason: &TerminationReason) {
        match self.remove(session.id()) {
            Ok(_) => info!(
                session = %session.id(),
                peer = %session.peer(),
                reason = %reason,
                active = self.len(),
                "client disconnected"
            ),
            Err(err) => error!(error = %err, "session registry invariant violated"),
        }
    }
}
