// src/worker/session.rs

//! Lifecycle of one worker session.
//!
//! ```text
//! Spawning ──launch ok──▶ Running ──stop()──▶ Closing
//!     │                      │                   │
//!     └──launch failed──▶ Closed ◀──exit─────────┘
//! ```
//!
//! A session is closed exactly once. After that every operation is a
//! no-op.

use std::path::Path;

use tracing::{error, info, warn};

use crate::stream::StreamPath;
use crate::types::{SessionKey, WorkerId};

use super::backend::{StopHandle, WorkerBackend, WorkerSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Spawning,
    Running,
    Closing,
    Closed,
}

#[derive(Debug)]
pub struct WorkerSession {
    key: SessionKey,
    worker_id: WorkerId,
    input: String,
    output: String,
    args: Vec<String>,
    /// Local stream this session feeds or reads, if any.
    stream_path: Option<StreamPath>,
    state: WorkerState,
    stop: Option<StopHandle>,
    exit_code: Option<i32>,
}

impl WorkerSession {
    pub fn new(
        key: SessionKey,
        worker_id: WorkerId,
        input: impl Into<String>,
        output: impl Into<String>,
        args: Vec<String>,
    ) -> Self {
        Self {
            key,
            worker_id,
            input: input.into(),
            output: output.into(),
            args,
            stream_path: None,
            state: WorkerState::Spawning,
            stop: None,
            exit_code: None,
        }
    }

    pub fn with_stream_path(mut self, path: StreamPath) -> Self {
        self.stream_path = Some(path);
        self
    }

    /// Issue the process launch.
    ///
    /// On success the session is `Running`. A launch error closes the
    /// session immediately, so it never lingers without a completion.
    pub fn start(&mut self, program: &Path, backend: &mut dyn WorkerBackend) -> bool {
        if self.state != WorkerState::Spawning {
            warn!(session = %self.key, state = ?self.state, "start called twice; ignoring");
            return false;
        }

        info!(
            session = %self.key,
            worker_id = self.worker_id,
            input = %self.input,
            cmd = %format!("{} {}", program.display(), self.args.join(" ")),
            "starting worker"
        );

        let spec = WorkerSpec {
            key: self.key.clone(),
            worker_id: self.worker_id,
            program: program.to_path_buf(),
            args: self.args.clone(),
        };

        match backend.launch(spec) {
            Ok(handle) => {
                self.stop = Some(handle);
                self.state = WorkerState::Running;
                true
            }
            Err(err) => {
                error!(
                    session = %self.key,
                    worker_id = self.worker_id,
                    error = %err,
                    "worker launch failed"
                );
                self.close(None);
                false
            }
        }
    }

    /// Request termination. Fire-and-forget: the session stays registered
    /// until its exit arrives.
    ///
    /// Only a `Running` session can be stopped; anything else returns
    /// `false`.
    pub fn stop(&mut self) -> bool {
        if self.state != WorkerState::Running {
            return false;
        }
        self.state = WorkerState::Closing;
        info!(session = %self.key, worker_id = self.worker_id, "stopping worker");
        match self.stop.as_mut() {
            Some(handle) => handle.signal(),
            None => false,
        }
    }

    /// Record the worker's exit. Returns `true` only on the first call.
    pub fn close(&mut self, code: Option<i32>) -> bool {
        if self.state == WorkerState::Closed {
            return false;
        }
        self.state = WorkerState::Closed;
        self.exit_code = code;
        self.stop = None;
        info!(
            session = %self.key,
            worker_id = self.worker_id,
            exit_code = ?code,
            "worker session completed"
        );
        true
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn worker_id(&self) -> WorkerId {
        self.worker_id
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn stream_path(&self) -> Option<&StreamPath> {
        self.stream_path.as_ref()
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn is_closed(&self) -> bool {
        self.state == WorkerState::Closed
    }
}
