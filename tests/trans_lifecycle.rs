// tests/trans_lifecycle.rs

mod common;
use crate::common::{dynamic, init_tracing};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use mediarelay::bus::StreamEvent;
use mediarelay::config::ConfigFile;
use mediarelay::engine::TransOrchestrator;
use mediarelay::fs::FileSystem;
use mediarelay::fs::mock::MockFileSystem;
use mediarelay::stream::LocalEndpoint;
use mediarelay_test_utils::builders::{ConfigFileBuilder, TransTaskBuilder};
use mediarelay_test_utils::fake_backend::FakeBackend;

fn trans_orchestrator(
    cfg: &ConfigFile,
    backend: FakeBackend,
    fs: &MockFileSystem,
) -> TransOrchestrator<FakeBackend> {
    TransOrchestrator::new(
        cfg.trans.clone().expect("config has a [trans] section"),
        cfg.http.mediaroot.clone(),
        LocalEndpoint::new(cfg.rtmp.port),
        backend,
        Arc::new(fs.clone()),
    )
}

#[test]
fn all_outputs_go_through_one_tee() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_mediaroot("/srv/media")
        .with_trans_task(
            TransTaskBuilder::new("live")
                .rtmp("hls")
                .mp4("[movflags=+faststart]")
                .hls("[hls_time=2:hls_list_size=3:hls_flags=delete_segments]")
                .dash("[f=dash:window_size=3:extra_window_size=5]")
                .video("libx264", &["-preset", "veryfast"])
                .audio("aac", &["-ab", "64k"])
                .build(),
        )
        .build();
    let backend = FakeBackend::new();
    let fs = MockFileSystem::new();
    let mut orch = trans_orchestrator(&cfg, backend.clone(), &fs);

    orch.after_publish(&StreamEvent::new("P1", "/live/cam"));

    assert!(fs.is_dir(Path::new("/srv/media/live/cam")));
    let launched = backend.launched();
    assert_eq!(launched.len(), 1);
    let spec = &launched[0];
    assert_eq!(spec.key, dynamic("P1"));
    assert_eq!(
        &spec.args[..14],
        [
            "-y",
            "-i",
            "rtmp://127.0.0.1:1935/live/cam",
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-c:a",
            "aac",
            "-ab",
            "64k",
            "-f",
            "tee",
            "-map",
        ]
    );

    let tee = spec.args.last().expect("tee spec");
    let outputs: Vec<&str> = tee.split('|').collect();
    assert_eq!(outputs.len(), 4);
    assert_eq!(outputs[0], "[f=flv]rtmp://127.0.0.1:1935/hls/cam");
    assert!(outputs[1].starts_with("[movflags=+faststart]/srv/media/live/cam/"));
    assert!(outputs[1].ends_with(".mp4"));
    assert_eq!(
        outputs[2],
        "[hls_time=2:hls_list_size=3:hls_flags=delete_segments]/srv/media/live/cam/index.m3u8"
    );
    assert_eq!(
        outputs[3],
        "[f=dash:window_size=3:extra_window_size=5]/srv/media/live/cam/index.mpd"
    );
}

#[test]
fn recordings_survive_cleanup() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_mediaroot("/m")
        .with_trans_task(TransTaskBuilder::new("live").hls("").mp4("").build())
        .build();
    let backend = FakeBackend::new();
    let fs = MockFileSystem::new();
    let mut orch = trans_orchestrator(&cfg, backend.clone(), &fs);

    orch.after_publish(&StreamEvent::new("P1", "/live/a"));
    for file in ["index.m3u8", "index0.ts", "index1.ts", "init.m4s", "x.tmp", "rec.mp4"] {
        fs.add_file(format!("/m/live/a/{file}"));
    }

    // Worker died on its own: cleanup still happens.
    orch.handle_exit(&backend.exit_of(0, Some(1)));
    assert!(orch.is_drained());
    assert_eq!(fs.file_paths(), vec![PathBuf::from("/m/live/a/rec.mp4")]);
}

#[test]
fn same_publisher_is_not_transcoded_twice() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_trans_task(TransTaskBuilder::new("live").hls("").build())
        .with_trans_task(TransTaskBuilder::new("live").dash("").build())
        .build();
    let backend = FakeBackend::new();
    let fs = MockFileSystem::new();
    let mut orch = trans_orchestrator(&cfg, backend.clone(), &fs);

    orch.after_publish(&StreamEvent::new("P1", "/live/a"));

    // The later-declared task wins.
    let launched = backend.launched();
    assert_eq!(launched.len(), 1);
    assert!(launched[0].args.last().is_some_and(|tee| tee.ends_with("index.mpd")));
}

#[test]
fn shutdown_stops_running_sessions() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_trans_task(TransTaskBuilder::new("live").hls("").build())
        .build();
    let backend = FakeBackend::new();
    let fs = MockFileSystem::new();
    let mut orch = trans_orchestrator(&cfg, backend.clone(), &fs);

    orch.after_publish(&StreamEvent::new("P1", "/live/a"));
    orch.after_publish(&StreamEvent::new("P2", "/live/b"));
    orch.shutdown();
    assert_eq!(backend.stopped(), vec![1, 2]);

    orch.after_publish(&StreamEvent::new("P3", "/live/c"));
    assert_eq!(backend.launched_count(), 2);
}
