// tests/config_loading.rs

use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use mediarelay::config::load_and_validate;
use mediarelay::errors::RelayError;
use mediarelay::types::{RelayMode, RtspTransport};

#[test]
fn full_config_round_trip_from_disk() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[rtmp]
port = 1940

[http]
mediaroot = "/var/media"

[relay]
ffmpeg = "/usr/local/bin/ffmpeg"

[[relay.tasks]]
mode = "static"
app = "live"
edge = "rtsp://cam/stream"
name = "cam1"
rtsp_transport = "tcp"

[[relay.tasks]]
mode = "push"
app = "live"
edge = "rtmp://cdn/ingest/KEY"
appendName = false
addMutedAudio = true

[trans]
ffmpeg = "/usr/local/bin/ffmpeg"

[[trans.tasks]]
app = "live"
hls = true
hlsFlags = "[hls_time=2:hls_list_size=3:hls_flags=delete_segments]"
vcParam = ["-preset", "veryfast"]
"#
    )
    .unwrap();

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.rtmp.port, 1940);
    assert_eq!(cfg.http.mediaroot, PathBuf::from("/var/media"));

    let relay = cfg.relay.unwrap();
    assert_eq!(relay.tasks.len(), 2);
    assert_eq!(relay.tasks[0].mode, RelayMode::Static);
    assert_eq!(relay.tasks[0].rtsp_transport, Some(RtspTransport::Tcp));
    assert!(!relay.tasks[1].effective_append_name());
    assert!(relay.tasks[1].add_muted_audio);

    let trans = cfg.trans.unwrap();
    assert!(trans.tasks[0].hls);
    assert_eq!(trans.tasks[0].vc_param, vec!["-preset", "veryfast"]);
}

#[test]
fn defaults_apply_to_minimal_config() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "").unwrap();

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.rtmp.port, 1935);
    assert_eq!(cfg.http.mediaroot, PathBuf::from("./media"));
    assert!(cfg.relay.is_none());
    assert!(cfg.trans.is_none());
}

#[test]
fn invalid_task_returns_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[relay]
ffmpeg = "/usr/bin/ffmpeg"

[[relay.tasks]]
mode = "pull"
app = "live"
edge = ""
"#
    )
    .unwrap();

    match load_and_validate(file.path()) {
        Err(RelayError::ConfigError(msg)) => assert!(msg.contains("edge")),
        Err(e) => panic!("Expected ConfigError, got: {e:?}"),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = load_and_validate(dir.path().join("MediaRelay.toml"));
    assert!(matches!(result, Err(RelayError::IoError(_))));
}

#[test]
fn unknown_mode_is_toml_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[relay]
ffmpeg = "/usr/bin/ffmpeg"

[[relay.tasks]]
mode = "trans"
app = "live"
edge = "rtmp://x"
"#
    )
    .unwrap();

    assert!(matches!(
        load_and_validate(file.path()),
        Err(RelayError::TomlError(_))
    ));
}
