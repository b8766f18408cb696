use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use tokio::sync::{mpsc, oneshot};

use mediarelay::types::WorkerId;
use mediarelay::worker::{StopHandle, WorkerBackend, WorkerExit, WorkerSpec};

#[derive(Default)]
struct State {
    launched: Vec<WorkerSpec>,
    pending_stops: HashMap<WorkerId, oneshot::Receiver<()>>,
    stopped: Vec<WorkerId>,
    fail_next: usize,
}

/// A fake worker backend that:
/// - records every launched `WorkerSpec`
/// - can be told to fail the next N launches
/// - when built `with_exits`, answers every stop signal with an exit
///   notification (code `None`), like a worker killed on request.
///
/// Clones share state, so a test can keep one handle while the
/// orchestrator owns another.
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
    exit_tx: Option<mpsc::UnboundedSender<WorkerExit>>,
}

impl FakeBackend {
    /// Records launches and stops; never reports exits on its own.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops produce exits on `exit_tx`. Requires a tokio runtime.
    pub fn with_exits(exit_tx: mpsc::UnboundedSender<WorkerExit>) -> Self {
        Self {
            state: Arc::default(),
            exit_tx: Some(exit_tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn fail_next(&self, n: usize) {
        self.lock().fail_next = n;
    }

    pub fn launched(&self) -> Vec<WorkerSpec> {
        self.lock().launched.clone()
    }

    pub fn launched_count(&self) -> usize {
        self.lock().launched.len()
    }

    /// Worker ids that received a stop signal, sorted.
    pub fn stopped(&self) -> Vec<WorkerId> {
        let mut state = self.lock();
        let signalled: Vec<WorkerId> = state
            .pending_stops
            .iter_mut()
            .filter_map(|(id, rx)| rx.try_recv().ok().map(|()| *id))
            .collect();
        for id in &signalled {
            state.pending_stops.remove(id);
        }
        state.stopped.extend(signalled);
        state.stopped.sort_unstable();
        state.stopped.clone()
    }

    /// Exit notification for the `n`-th launched worker.
    pub fn exit_of(&self, n: usize, code: Option<i32>) -> WorkerExit {
        let spec = self.launched()[n].clone();
        WorkerExit {
            key: spec.key,
            worker_id: spec.worker_id,
            code,
        }
    }

    /// Make the `n`-th launched worker exit on its own with `code`.
    pub fn finish(&self, n: usize, code: Option<i32>) {
        let exit = self.exit_of(n, code);
        if let Some(tx) = &self.exit_tx {
            let _ = tx.send(exit);
        }
    }
}

impl WorkerBackend for FakeBackend {
    fn launch(&mut self, spec: WorkerSpec) -> Result<StopHandle> {
        let mut state = self.lock();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(anyhow!("spawning {:?}: no such file or directory", spec.program));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        match &self.exit_tx {
            Some(exit_tx) => {
                let exit_tx = exit_tx.clone();
                let shared = Arc::clone(&self.state);
                let exit = WorkerExit {
                    key: spec.key.clone(),
                    worker_id: spec.worker_id,
                    code: None,
                };
                tokio::spawn(async move {
                    if stop_rx.await.is_ok() {
                        shared.lock().unwrap().stopped.push(exit.worker_id);
                        let _ = exit_tx.send(exit);
                    }
                });
            }
            None => {
                state.pending_stops.insert(spec.worker_id, stop_rx);
            }
        }

        state.launched.push(spec);
        Ok(StopHandle::new(stop_tx))
    }
}
