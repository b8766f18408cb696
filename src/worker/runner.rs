// src/worker/runner.rs

//! Supervision of a single worker process.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::types::{SessionKey, WorkerId};

use super::backend::WorkerExit;

/// Watch a spawned worker until it exits, then report a single
/// [`WorkerExit`].
///
/// - stdout/stderr are drained line by line into `debug!` logs; they are
///   never interpreted.
/// - A stop request kills the process once and keeps waiting for the exit.
///   There is no timeout and no second attempt.
/// - A dropped stop handle without a request leaves the process running.
pub async fn supervise(
    mut child: Child,
    key: SessionKey,
    worker_id: WorkerId,
    exit_tx: mpsc::UnboundedSender<WorkerExit>,
    mut stop_rx: oneshot::Receiver<()>,
) {
    if let Some(stdout) = child.stdout.take() {
        spawn_drain(stdout, key.clone(), worker_id, "stdout");
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_drain(stderr, key.clone(), worker_id, "stderr");
    }

    let status = tokio::select! {
        status = child.wait() => status,

        stop = &mut stop_rx => {
            match stop {
                Ok(()) => {
                    info!(session = %key, worker_id, "stop requested; signalling worker");
                    if let Err(e) = child.start_kill() {
                        warn!(
                            session = %key,
                            worker_id,
                            error = %e,
                            "failed to signal worker process"
                        );
                    }
                }
                Err(_) => {
                    debug!(session = %key, worker_id, "stop handle dropped without request");
                }
            }
            child.wait().await
        }
    };

    let code = match status {
        Ok(status) => {
            let code = status.code();
            info!(
                session = %key,
                worker_id,
                exit_code = ?code,
                success = status.success(),
                "worker process exited"
            );
            code
        }
        Err(e) => {
            warn!(session = %key, worker_id, error = %e, "waiting for worker process failed");
            None
        }
    };

    if exit_tx
        .send(WorkerExit {
            key: key.clone(),
            worker_id,
            code,
        })
        .is_err()
    {
        debug!(session = %key, worker_id, "orchestrator gone; dropping exit notification");
    }
}

/// Always consume worker output so pipe buffers don't fill; log at debug.
fn spawn_drain<R>(reader: R, key: SessionKey, worker_id: WorkerId, stream: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(session = %key, worker_id, "{}: {}", stream, line);
        }
    });
}
