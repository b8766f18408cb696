// tests/relay_lifecycle.rs

mod common;
use crate::common::{dynamic, init_tracing, input_of, output_of, path, relay_orchestrator};

use mediarelay::bus::StreamEvent;
use mediarelay::config::ConfigFile;
use mediarelay::directory::InMemoryDirectory;
use mediarelay::engine::RelayOrchestrator;
use mediarelay::types::{RelayMode, RtspTransport, SessionKey, StreamArgs};
use mediarelay::worker::WorkerState;
use mediarelay_test_utils::builders::{ConfigFileBuilder, RelayTaskBuilder};
use mediarelay_test_utils::fake_backend::FakeBackend;

#[test]
fn pull_on_play_for_unpublished_stream() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_relay_task(RelayTaskBuilder::new(RelayMode::Pull, "live", "rtmp://r/x").build())
        .build();
    let backend = FakeBackend::new();
    let (mut orch, _dir) = relay_orchestrator(&cfg, backend.clone());

    orch.before_play(&StreamEvent::new("V1", "/live/cam1"));

    let launched = backend.launched();
    assert_eq!(launched.len(), 1);
    assert_eq!(launched[0].key, dynamic("V1"));
    assert_eq!(input_of(&launched[0]), "rtmp://r/x/cam1");
    assert_eq!(output_of(&launched[0]), "rtmp://127.0.0.1:1935/live/cam1");
    assert_eq!(orch.registry().dynamic_len(), 1);
}

/// V1 triggers a pull of `/live/s`; V2 joins once the pulled stream is
/// published locally, without starting another pull.
fn shared_pull(
    orch: &mut RelayOrchestrator<FakeBackend>,
    dir: &InMemoryDirectory,
    backend: &FakeBackend,
) {
    let stream = path("/live/s");
    orch.before_play(&StreamEvent::new("V1", "/live/s"));
    dir.publish(&stream, "PULL");
    dir.add_viewer(&stream, "V1");
    dir.add_viewer(&stream, "V2");
    orch.before_play(&StreamEvent::new("V2", "/live/s"));
    assert_eq!(backend.launched_count(), 1);
}

fn pull_config() -> ConfigFile {
    ConfigFileBuilder::new()
        .with_relay_task(RelayTaskBuilder::new(RelayMode::Pull, "live", "rtmp://origin").build())
        .build()
}

#[test]
fn pull_survives_owner_leaving_and_stops_with_last_viewer() {
    init_tracing();
    let backend = FakeBackend::new();
    let (mut orch, dir) = relay_orchestrator(&pull_config(), backend.clone());
    shared_pull(&mut orch, &dir, &backend);
    let stream = path("/live/s");

    // The viewer that triggered the pull leaves; V2 is still watching.
    dir.remove_viewer(&stream, "V1");
    orch.done_play(&StreamEvent::new("V1", "/live/s"));
    assert!(backend.stopped().is_empty());

    // V2 never owned the pull, but it is the last viewer.
    dir.remove_viewer(&stream, "V2");
    orch.done_play(&StreamEvent::new("V2", "/live/s"));
    assert_eq!(backend.stopped(), vec![1]);

    orch.handle_exit(&backend.exit_of(0, Some(0)));
    assert!(orch.registry().is_empty());
}

#[test]
fn pull_stops_when_owner_leaves_last() {
    init_tracing();
    let backend = FakeBackend::new();
    let (mut orch, dir) = relay_orchestrator(&pull_config(), backend.clone());
    shared_pull(&mut orch, &dir, &backend);
    let stream = path("/live/s");

    dir.remove_viewer(&stream, "V2");
    orch.done_play(&StreamEvent::new("V2", "/live/s"));
    assert!(backend.stopped().is_empty());

    dir.remove_viewer(&stream, "V1");
    orch.done_play(&StreamEvent::new("V1", "/live/s"));
    assert_eq!(backend.stopped(), vec![1]);

    orch.handle_exit(&backend.exit_of(0, Some(0)));
    assert!(orch.registry().is_empty());
}

#[test]
fn push_on_publish_with_query_and_muted_audio() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_port(1936)
        .with_relay_task(
            RelayTaskBuilder::new(RelayMode::Push, "live", "rtmp://cdn/app")
                .muted_audio(true)
                .build(),
        )
        .build();
    let backend = FakeBackend::new();
    let (mut orch, _dir) = relay_orchestrator(&cfg, backend.clone());

    let mut args = StreamArgs::new();
    args.insert("sign".into(), "123-abc".into());
    orch.after_publish(&StreamEvent::new("P1", "/live/a").with_args(args));

    let launched = backend.launched();
    let spec = &launched[0];
    assert_eq!(
        spec.args,
        vec![
            "-re",
            "-f",
            "lavfi",
            "-i",
            "anullsrc=channel_layout=stereo:sample_rate=44100",
            "-i",
            "rtmp://127.0.0.1:1936/live/a",
            "-c:v",
            "copy",
            "-c:a",
            "aac",
            "-f",
            "flv",
            "rtmp://cdn/app/a?sign=123-abc",
        ]
    );
}

#[test]
fn static_rtsp_task_uses_transport_and_restarts() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_relay_task(
            RelayTaskBuilder::new(RelayMode::Static, "live", "rtsp://cam/stream")
                .name("cam1")
                .rtsp_transport(RtspTransport::Tcp)
                .build(),
        )
        .build();
    let backend = FakeBackend::new();
    let (mut orch, _dir) = relay_orchestrator(&cfg, backend.clone());

    orch.tick();
    let launched = backend.launched();
    let first = &launched[0];
    assert_eq!(first.key, SessionKey::Static(0));
    assert_eq!(
        first.args,
        vec![
            "-re",
            "-rtsp_transport",
            "tcp",
            "-i",
            "rtsp://cam/stream",
            "-c",
            "copy",
            "-f",
            "flv",
            "rtmp://127.0.0.1:1935/live/cam1",
        ]
    );

    // Abnormal exit: the next tick brings it back.
    orch.handle_exit(&backend.exit_of(0, Some(1)));
    assert_eq!(orch.registry().static_len(), 0);
    orch.tick();
    assert_eq!(backend.launched_count(), 2);
    assert_eq!(orch.registry().static_len(), 1);
}

#[test]
fn done_publish_stops_static_feeding_the_stream() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_relay_task(
            RelayTaskBuilder::new(RelayMode::Static, "live", "/srv/loop.mp4")
                .name("loop")
                .build(),
        )
        .build();
    let backend = FakeBackend::new();
    let (mut orch, _dir) = relay_orchestrator(&cfg, backend.clone());

    orch.tick();
    assert!(backend.launched()[0].args.starts_with(&[
        "-re".to_string(),
        "-stream_loop".to_string(),
        "-1".to_string()
    ]));

    orch.done_publish(&StreamEvent::new("whoever", "/live/loop"));
    assert_eq!(backend.stopped(), vec![1]);
    assert_eq!(
        orch.registry()
            .get(&SessionKey::Static(0))
            .map(|s| s.state()),
        Some(WorkerState::Closing)
    );

    // Still registered while closing: ticks do not double-spawn.
    orch.tick();
    assert_eq!(backend.launched_count(), 1);
}

#[test]
fn spawn_failure_leaves_no_session_and_tick_retries() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_relay_task(RelayTaskBuilder::new(RelayMode::Static, "live", "rtsp://cam").build())
        .build();
    let backend = FakeBackend::new();
    backend.fail_next(1);
    let (mut orch, _dir) = relay_orchestrator(&cfg, backend.clone());

    orch.tick();
    assert!(orch.registry().is_empty());
    assert_eq!(backend.launched_count(), 0);

    orch.tick();
    assert_eq!(orch.registry().static_len(), 1);
}
