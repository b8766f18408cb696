// src/worker/backend.rs

//! Pluggable worker backend abstraction.
//!
//! Orchestrators launch workers through a `WorkerBackend` instead of calling
//! `tokio::process` directly. This makes it easy to swap in a fake backend
//! in tests while keeping the production implementation in [`runner`].
//!
//! - `RealWorkerBackend` spawns an OS process per session and hands it to a
//!   runner task that reports exactly one [`WorkerExit`].
//! - Tests can provide their own backend that records launches and emits
//!   exits on demand.
//!
//! [`runner`]: super::runner

use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use crate::types::{SessionKey, WorkerId};

use super::runner::supervise;

/// Everything needed to launch one worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    pub key: SessionKey,
    pub worker_id: WorkerId,
    pub program: PathBuf,
    pub args: Vec<String>,
}

/// Completion notification of one worker, delivered exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
    pub key: SessionKey,
    pub worker_id: WorkerId,
    /// Process exit code; `None` when killed by a signal or never observed.
    pub code: Option<i32>,
}

/// Fire-and-forget stop signal for a running worker.
#[derive(Debug)]
pub struct StopHandle {
    tx: Option<oneshot::Sender<()>>,
}

impl StopHandle {
    pub fn new(tx: oneshot::Sender<()>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Signal the worker. Returns `false` if already signalled or if the
    /// worker side has gone away.
    pub fn signal(&mut self) -> bool {
        match self.tx.take() {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }
}

/// Trait abstracting how worker processes are launched.
///
/// `launch` must not block: it either starts the worker and returns its stop
/// handle, or fails immediately. A launched worker must eventually produce
/// one `WorkerExit` for `spec.worker_id`.
pub trait WorkerBackend: Send {
    fn launch(&mut self, spec: WorkerSpec) -> Result<StopHandle>;
}

/// Real backend used in production.
pub struct RealWorkerBackend {
    exit_tx: mpsc::UnboundedSender<WorkerExit>,
}

impl RealWorkerBackend {
    /// Exits of every launched worker are sent to `exit_tx`.
    pub fn new(exit_tx: mpsc::UnboundedSender<WorkerExit>) -> Self {
        Self { exit_tx }
    }
}

impl WorkerBackend for RealWorkerBackend {
    fn launch(&mut self, spec: WorkerSpec) -> Result<StopHandle> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .with_context(|| format!("spawning worker {:?} for {}", spec.program, spec.key))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        tokio::spawn(supervise(
            child,
            spec.key,
            spec.worker_id,
            self.exit_tx.clone(),
            stop_rx,
        ));

        Ok(StopHandle::new(stop_tx))
    }
}
