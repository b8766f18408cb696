// src/worker/mod.rs

//! Worker process layer.
//!
//! This module is responsible for actually running ffmpeg, using
//! `tokio::process::Command`, and reporting back to the owning orchestrator
//! via [`WorkerExit`] notifications.
//!
//! - [`args`] builds relay and trans argument vectors.
//! - [`session`] is the per-session state machine.
//! - [`backend`] provides the `WorkerBackend` trait and the production
//!   `RealWorkerBackend`; tests replace it with a fake.
//! - [`runner`] supervises one spawned process.
//! - [`probe`] validates the worker binary at startup.

pub mod args;
pub mod backend;
pub mod probe;
pub mod runner;
pub mod session;

pub use args::{RelayJob, TransJob, build_relay_args, build_trans_args};
pub use backend::{RealWorkerBackend, StopHandle, WorkerBackend, WorkerExit, WorkerSpec};
pub use session::{WorkerSession, WorkerState};
