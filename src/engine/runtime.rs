// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, timeout};
use tracing::{debug, info, warn};

use crate::bus::{Envelope, EventBus, SubscriptionId};
use crate::errors::Result;
use crate::worker::WorkerExit;

use super::Orchestrator;

/// How long shutdown waits for stopped workers to report their exit.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Async shell around one orchestrator core.
///
/// The core is owned by the task running [`Runtime::run`]; bus envelopes,
/// worker exits and ticks reach it strictly one at a time.
pub struct Runtime<O: Orchestrator> {
    core: O,
    bus: EventBus,
    mailbox: mpsc::UnboundedReceiver<Envelope>,
    exits: mpsc::UnboundedReceiver<WorkerExit>,
    subscriptions: Vec<SubscriptionId>,
    shutdown_grace: Duration,
}

impl<O: Orchestrator> fmt::Debug for Runtime<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("orchestrator", &self.core.name())
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}

impl<O: Orchestrator> Runtime<O> {
    /// Subscribe `core` to its event kinds right away, so nothing published
    /// after construction is missed.
    ///
    /// `exits` must receive the exits of every worker the core's backend
    /// launches.
    pub fn new(core: O, bus: EventBus, exits: mpsc::UnboundedReceiver<WorkerExit>) -> Self {
        let (tx, mailbox) = mpsc::unbounded_channel();
        let subscriptions = core
            .subscriptions()
            .iter()
            .map(|kind| bus.subscribe(*kind, tx.clone()))
            .collect();

        Self {
            core,
            bus,
            mailbox,
            exits,
            subscriptions,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Main loop. Returns once `shutdown` flips to `true` (or its sender is
    /// dropped) and the shutdown sequence has completed.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let name = self.core.name();
        info!(orchestrator = name, "orchestrator started");

        let mut ticker = self.core.tick_interval().map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker
        });

        let already_stopped = *shutdown.borrow();
        if !already_stopped {
            loop {
                tokio::select! {
                    changed = shutdown.changed() => {
                        let stop = changed.is_err() || *shutdown.borrow();
                        if stop {
                            debug!(orchestrator = name, "shutdown requested");
                            break;
                        }
                    }
                    Some(envelope) = self.mailbox.recv() => self.dispatch(envelope),
                    Some(exit) = self.exits.recv() => self.core.handle_exit(exit),
                    _ = next_tick(&mut ticker) => self.core.tick(),
                    else => break,
                }
            }
        }

        self.stop().await;
        info!(orchestrator = name, "orchestrator stopped");
        Ok(())
    }

    fn dispatch(&mut self, envelope: Envelope) {
        debug!(orchestrator = self.core.name(), event = ?envelope.event, "event received");
        let created = self.core.handle_event(envelope.event);
        if let (Some(reply), Some(id)) = (envelope.reply, created) {
            // The requester may have given up waiting.
            let _ = reply.send(id);
        }
    }

    /// Unsubscribe in subscription order, stop every session, then wait
    /// (bounded) for their exits.
    async fn stop(&mut self) {
        for id in self.subscriptions.drain(..) {
            self.bus.unsubscribe(id);
        }
        self.mailbox.close();
        self.core.shutdown();

        let grace = self.shutdown_grace;
        let drained = timeout(grace, async {
            while !self.core.is_drained() {
                match self.exits.recv().await {
                    Some(exit) => self.core.handle_exit(exit),
                    None => break,
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                orchestrator = self.core.name(),
                grace_secs = grace.as_secs_f64(),
                "workers still running after shutdown grace period"
            );
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
