// src/engine/registry.rs

//! Keyed stores of live worker sessions.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::types::{SessionId, SessionKey};
use crate::worker::{WorkerExit, WorkerSession};

/// Live sessions of one orchestrator.
///
/// Invariants:
/// - at most one session per static index and per dynamic id;
/// - a session leaves the registry only through [`remove_exited`], and only
///   when the exit's worker id matches the registered session.
///
/// [`remove_exited`]: SessionRegistry::remove_exited
#[derive(Debug, Default)]
pub struct SessionRegistry {
    statics: BTreeMap<usize, WorkerSession>,
    dynamics: HashMap<SessionId, WorkerSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its own key.
    ///
    /// Returns the session back if the key is already taken.
    pub fn insert(&mut self, session: WorkerSession) -> Result<(), WorkerSession> {
        if self.contains(session.key()) {
            return Err(session);
        }
        debug!(session = %session.key(), worker_id = session.worker_id(), "session registered");
        match session.key().clone() {
            SessionKey::Static(index) => {
                self.statics.insert(index, session);
            }
            SessionKey::Dynamic(id) => {
                self.dynamics.insert(id, session);
            }
        }
        Ok(())
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        match key {
            SessionKey::Static(index) => self.statics.contains_key(index),
            SessionKey::Dynamic(id) => self.dynamics.contains_key(id),
        }
    }

    pub fn get(&self, key: &SessionKey) -> Option<&WorkerSession> {
        match key {
            SessionKey::Static(index) => self.statics.get(index),
            SessionKey::Dynamic(id) => self.dynamics.get(id),
        }
    }

    pub fn get_mut(&mut self, key: &SessionKey) -> Option<&mut WorkerSession> {
        match key {
            SessionKey::Static(index) => self.statics.get_mut(index),
            SessionKey::Dynamic(id) => self.dynamics.get_mut(id),
        }
    }

    /// Remove the session an exit notification belongs to.
    ///
    /// Stale notifications (unknown key, or a different worker under the
    /// same key) leave the registry untouched.
    pub fn remove_exited(&mut self, exit: &WorkerExit) -> Option<WorkerSession> {
        let matches = self
            .get(&exit.key)
            .is_some_and(|s| s.worker_id() == exit.worker_id);
        if !matches {
            debug!(
                session = %exit.key,
                worker_id = exit.worker_id,
                "exit for unknown or replaced session; ignoring"
            );
            return None;
        }
        match &exit.key {
            SessionKey::Static(index) => self.statics.remove(index),
            SessionKey::Dynamic(id) => self.dynamics.remove(id),
        }
    }

    pub fn statics_mut(&mut self) -> impl Iterator<Item = &mut WorkerSession> {
        self.statics.values_mut()
    }

    pub fn dynamics_mut(&mut self) -> impl Iterator<Item = (&SessionId, &mut WorkerSession)> {
        self.dynamics.iter_mut()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &WorkerSession> {
        self.statics.values().chain(self.dynamics.values())
    }

    pub fn sessions_mut(&mut self) -> impl Iterator<Item = &mut WorkerSession> {
        self.statics.values_mut().chain(self.dynamics.values_mut())
    }

    pub fn static_len(&self) -> usize {
        self.statics.len()
    }

    pub fn dynamic_len(&self) -> usize {
        self.dynamics.len()
    }

    pub fn len(&self) -> usize {
        self.statics.len() + self.dynamics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
