// src/engine/pool.rs

//! Launching, stopping and reaping the workers of one orchestrator.

use std::path::PathBuf;

use tracing::warn;

use crate::stream::StreamPath;
use crate::types::{SessionId, SessionKey, WorkerId};
use crate::worker::{WorkerBackend, WorkerExit, WorkerSession, WorkerState};

use super::registry::SessionRegistry;

/// A request to run one worker under `key`.
#[derive(Debug, Clone)]
pub struct Launch {
    pub key: SessionKey,
    pub input: String,
    pub output: String,
    pub args: Vec<String>,
    pub stream_path: StreamPath,
}

/// Worker binary, backend and registry of one orchestrator.
#[derive(Debug)]
pub struct WorkerPool<B: WorkerBackend> {
    program: PathBuf,
    backend: B,
    registry: SessionRegistry,
    next_worker_id: WorkerId,
}

impl<B: WorkerBackend> WorkerPool<B> {
    pub fn new(program: impl Into<PathBuf>, backend: B) -> Self {
        Self {
            program: program.into(),
            backend,
            registry: SessionRegistry::new(),
            next_worker_id: 0,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.registry.contains(key)
    }

    /// Start and register a worker.
    ///
    /// Returns `false` when the key is already live or the launch failed;
    /// in both cases nothing is registered.
    pub fn launch(&mut self, launch: Launch) -> bool {
        if self.registry.contains(&launch.key) {
            warn!(session = %launch.key, "session already live; skipping");
            return false;
        }

        self.next_worker_id += 1;
        let mut session = WorkerSession::new(
            launch.key,
            self.next_worker_id,
            launch.input,
            launch.output,
            launch.args,
        )
        .with_stream_path(launch.stream_path);

        if !session.start(&self.program, &mut self.backend) {
            return false;
        }

        match self.registry.insert(session) {
            Ok(()) => true,
            Err(mut rejected) => {
                rejected.stop();
                false
            }
        }
    }

    /// Request termination of the session under `key`, if any.
    pub fn stop(&mut self, key: &SessionKey) -> bool {
        match self.registry.get_mut(key) {
            Some(session) => session.stop(),
            None => false,
        }
    }

    /// Stop every static session fed by `path`. Returns how many were
    /// signalled.
    pub fn stop_statics_for(&mut self, path: &StreamPath) -> usize {
        self.registry
            .statics_mut()
            .filter(|s| s.stream_path() == Some(path))
            .map(|s| s.stop())
            .filter(|stopped| *stopped)
            .count()
    }

    /// Stop the dynamic sessions fed by or feeding `path` whose id passes
    /// `select`. Returns how many were signalled.
    pub fn stop_dynamics_for(
        &mut self,
        path: &StreamPath,
        select: impl Fn(&SessionId) -> bool,
    ) -> usize {
        self.registry
            .dynamics_mut()
            .filter(|(id, s)| s.stream_path() == Some(path) && select(id))
            .map(|(_, s)| s.stop())
            .filter(|stopped| *stopped)
            .count()
    }

    pub fn stop_all(&mut self) -> usize {
        self.registry
            .sessions_mut()
            .map(|s| s.stop())
            .filter(|stopped| *stopped)
            .count()
    }

    /// Reap an exited worker. Returns the closed session, or `None` for a
    /// stale notification.
    pub fn reap(&mut self, exit: &WorkerExit) -> Option<WorkerSession> {
        let mut session = self.registry.remove_exited(exit)?;
        let expected = session.state() == WorkerState::Closing;
        if !expected && exit.code != Some(0) {
            warn!(
                session = %exit.key,
                worker_id = exit.worker_id,
                exit_code = ?exit.code,
                "worker exited abnormally"
            );
        }
        session.close(exit.code);
        Some(session)
    }
}
