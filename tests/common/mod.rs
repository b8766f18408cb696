#![allow(dead_code)]

use std::sync::Arc;

use mediarelay::config::ConfigFile;
use mediarelay::directory::InMemoryDirectory;
use mediarelay::engine::RelayOrchestrator;
use mediarelay::stream::{LocalEndpoint, StreamPath};
use mediarelay::types::SessionKey;
use mediarelay::worker::WorkerSpec;
use mediarelay_test_utils::fake_backend::FakeBackend;

pub use mediarelay_test_utils::{init_tracing, with_timeout};

/// Relay core over a fake backend and a fresh directory.
pub fn relay_orchestrator(
    cfg: &ConfigFile,
    backend: FakeBackend,
) -> (RelayOrchestrator<FakeBackend>, InMemoryDirectory) {
    let directory = InMemoryDirectory::new();
    let section = cfg.relay.clone().expect("config has a [relay] section");
    let orch = RelayOrchestrator::new(
        section,
        LocalEndpoint::new(cfg.rtmp.port),
        backend,
        Arc::new(directory.clone()),
    );
    (orch, directory)
}

pub fn path(raw: &str) -> StreamPath {
    StreamPath::parse(raw).expect("valid stream path")
}

/// The input URL of a launched relay worker (the argument after the last `-i`).
pub fn input_of(spec: &WorkerSpec) -> &str {
    let pos = spec
        .args
        .iter()
        .rposition(|a| a == "-i")
        .expect("worker has an input");
    &spec.args[pos + 1]
}

/// The output URL of a launched relay worker.
pub fn output_of(spec: &WorkerSpec) -> &str {
    spec.args.last().expect("worker has an output")
}

pub fn dynamic(id: &str) -> SessionKey {
    SessionKey::Dynamic(id.to_string())
}
