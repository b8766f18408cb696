// src/engine/mod.rs

//! Orchestration engine.
//!
//! Each orchestrator is split the same way:
//! - a synchronous core ([`relay::RelayOrchestrator`],
//!   [`trans::TransOrchestrator`]) that owns its session registry and
//!   reacts to one input at a time;
//! - the async shell in [`runtime`] that owns the core, feeds it bus
//!   events, worker exits and timer ticks, and runs the shutdown sequence.
//!
//! Cores never touch channels or timers, so they are tested directly with
//! a recording backend.

use std::time::Duration;

use crate::bus::{EventKind, ServerEvent};
use crate::types::SessionId;
use crate::worker::WorkerExit;

pub mod pool;
pub mod registry;
pub mod relay;
pub mod runtime;
pub mod trans;

pub use pool::{Launch, WorkerPool};
pub use registry::SessionRegistry;
pub use relay::{RELAY_TICK, RelayOrchestrator};
pub use runtime::Runtime;
pub use trans::TransOrchestrator;

/// The interface the runtime shell drives.
pub trait Orchestrator: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Event kinds to subscribe to, in subscription order.
    fn subscriptions(&self) -> &'static [EventKind];

    /// Handle one bus event. Request-style events answer with the id of the
    /// session they created.
    fn handle_event(&mut self, event: ServerEvent) -> Option<SessionId>;

    fn handle_exit(&mut self, exit: WorkerExit);

    /// Period of [`tick`](Orchestrator::tick), if the orchestrator needs one.
    fn tick_interval(&self) -> Option<Duration> {
        None
    }

    fn tick(&mut self) {}

    /// Stop every live session. No new sessions are started afterwards.
    fn shutdown(&mut self);

    /// No session left in the registry.
    fn is_drained(&self) -> bool;
}
