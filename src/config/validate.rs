// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile, RelaySection, TransSection};
use crate::errors::{RelayError, Result};
use crate::types::RelayMode;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = RelayError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.rtmp, raw.http, raw.relay, raw.trans,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.rtmp.port == 0 {
        return Err(RelayError::ConfigError(
            "[rtmp].port must be >= 1 (got 0)".to_string(),
        ));
    }
    if let Some(relay) = &cfg.relay {
        validate_relay(relay)?;
    }
    if let Some(trans) = &cfg.trans {
        validate_trans(trans)?;
    }
    Ok(())
}

fn validate_relay(relay: &RelaySection) -> Result<()> {
    if relay.ffmpeg.as_os_str().is_empty() {
        return Err(RelayError::ConfigError(
            "[relay].ffmpeg must not be empty".to_string(),
        ));
    }

    for (index, task) in relay.tasks.iter().enumerate() {
        ensure_segment(&task.app, || format!("relay task #{index}: `app`"))?;

        if task.edge.trim().is_empty() {
            return Err(RelayError::ConfigError(format!(
                "relay task #{index} ({} {}) has an empty `edge`",
                task.mode, task.app
            )));
        }

        if let Some(name) = &task.name {
            ensure_segment(name, || format!("relay task #{index}: `name`"))?;
        }

        if task.mode != RelayMode::Push && task.append_name.is_some() {
            tracing::warn!(
                index,
                mode = %task.mode,
                "`appendName` only applies to push tasks; ignoring"
            );
        }
    }
    Ok(())
}

fn validate_trans(trans: &TransSection) -> Result<()> {
    if trans.ffmpeg.as_os_str().is_empty() {
        return Err(RelayError::ConfigError(
            "[trans].ffmpeg must not be empty".to_string(),
        ));
    }

    for (index, task) in trans.tasks.iter().enumerate() {
        ensure_segment(&task.app, || format!("trans task #{index}: `app`"))?;

        if !(task.hls || task.dash || task.mp4 || task.rtmp) {
            return Err(RelayError::ConfigError(format!(
                "trans task #{index} ({}) enables no output (set hls, dash, mp4 or rtmp)",
                task.app
            )));
        }

        if task.rtmp {
            match &task.rtmp_app {
                Some(app) => ensure_segment(app, || format!("trans task #{index}: `rtmpApp`"))?,
                None => {
                    return Err(RelayError::ConfigError(format!(
                        "trans task #{index} ({}) sets rtmp = true without `rtmpApp`",
                        task.app
                    )));
                }
            }
        }
    }
    Ok(())
}

/// A stream path segment: non-empty and free of `/`.
fn ensure_segment(value: &str, what: impl FnOnce() -> String) -> Result<()> {
    if value.is_empty() || value.contains('/') {
        return Err(RelayError::ConfigError(format!(
            "{} must be a single non-empty path segment (got {value:?})",
            what()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::config::load_from_str;
    use crate::errors::RelayError;
    use crate::types::{RelayMode, RtspTransport};

    #[test]
    fn parses_relay_tasks_with_camel_and_snake_case_keys() {
        let cfg = load_from_str(
            r#"
[relay]
ffmpeg = "/usr/bin/ffmpeg"

[[relay.tasks]]
mode = "static"
app = "live"
edge = "rtsp://cam.local/stream"
name = "cam1"
rtsp_transport = "tcp"
addMutedAudio = true

[[relay.tasks]]
mode = "push"
app = "live"
edge = "rtmp://cdn.example.com/live/fixed"
append_name = false
"#,
        )
        .unwrap();

        assert_eq!(cfg.rtmp.port, 1935);
        let relay = cfg.relay.unwrap();
        assert_eq!(relay.tasks.len(), 2);
        assert_eq!(relay.tasks[0].mode, RelayMode::Static);
        assert_eq!(relay.tasks[0].rtsp_transport, Some(RtspTransport::Tcp));
        assert!(relay.tasks[0].add_muted_audio);
        assert!(relay.tasks[0].effective_append_name());
        assert!(!relay.tasks[1].effective_append_name());
        assert!(cfg.trans.is_none());
    }

    #[test]
    fn rejects_unknown_rtsp_transport() {
        let result = load_from_str(
            r#"
[relay]
ffmpeg = "ffmpeg"

[[relay.tasks]]
mode = "pull"
app = "live"
edge = "rtsp://x"
rtsp_transport = "quic"
"#,
        );
        assert!(matches!(result, Err(RelayError::TomlError(_))));
    }

    #[test]
    fn rejects_zero_port() {
        let result = load_from_str("[rtmp]\nport = 0\n");
        match result {
            Err(RelayError::ConfigError(msg)) => assert!(msg.contains("port")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn rejects_app_with_slash() {
        let result = load_from_str(
            r#"
[relay]
ffmpeg = "ffmpeg"

[[relay.tasks]]
mode = "pull"
app = "live/x"
edge = "rtmp://origin"
"#,
        );
        assert!(matches!(result, Err(RelayError::ConfigError(_))));
    }

    #[test]
    fn trans_task_needs_an_output() {
        let result = load_from_str(
            r#"
[trans]
ffmpeg = "ffmpeg"

[[trans.tasks]]
app = "live"
"#,
        );
        match result {
            Err(RelayError::ConfigError(msg)) => assert!(msg.contains("enables no output")),
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn trans_rtmp_requires_rtmp_app() {
        let result = load_from_str(
            r#"
[trans]
ffmpeg = "ffmpeg"

[[trans.tasks]]
app = "live"
rtmp = true
"#,
        );
        assert!(matches!(result, Err(RelayError::ConfigError(_))));
    }
}
