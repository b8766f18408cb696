// src/worker/args.rs

//! Worker (ffmpeg) command-line construction.
//!
//! Both builders are pure: the same job always yields the same vector.

use crate::config::TransTask;
use crate::stream::{LocalEndpoint, StreamPath};
use crate::types::RtspTransport;

/// Secondary input used when a relay task asks for a silent audio track.
pub const SILENT_AUDIO_SOURCE: &str = "anullsrc=channel_layout=stereo:sample_rate=44100";

/// A resolved relay: where to read, where to write, and per-task flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayJob {
    pub input: String,
    pub output: String,
    pub rtsp_transport: Option<RtspTransport>,
    pub add_muted_audio: bool,
}

impl RelayJob {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            rtsp_transport: None,
            add_muted_audio: false,
        }
    }

    pub fn with_rtsp_transport(mut self, transport: Option<RtspTransport>) -> Self {
        self.rtsp_transport = transport;
        self
    }

    pub fn with_muted_audio(mut self, enabled: bool) -> Self {
        self.add_muted_audio = enabled;
        self
    }
}

/// Build the argument vector of a relay worker.
///
/// Layout:
/// `-re [-f lavfi -i anullsrc…] [-rtsp_transport T] [-stream_loop -1] -i IN
///  (-c copy | -c:v copy -c:a aac) -f (flv|rtsp) OUT`
pub fn build_relay_args(job: &RelayJob) -> Vec<String> {
    let mut argv: Vec<String> = vec!["-re".into()];

    if job.add_muted_audio {
        argv.extend(["-f", "lavfi", "-i", SILENT_AUDIO_SOURCE].map(String::from));
    }

    if is_rtsp(&job.input) {
        if let Some(transport) = job.rtsp_transport {
            argv.push("-rtsp_transport".into());
            argv.push(transport.as_str().into());
        }
    }

    if is_local_file(&job.input) {
        argv.extend(["-stream_loop", "-1"].map(String::from));
    }

    argv.push("-i".into());
    argv.push(job.input.clone());

    if job.add_muted_audio {
        // Video passes through; the generated audio must be encoded.
        argv.extend(["-c:v", "copy", "-c:a", "aac"].map(String::from));
    } else {
        argv.extend(["-c", "copy"].map(String::from));
    }

    argv.push("-f".into());
    argv.push(output_format(&job.output).into());
    argv.push(job.output.clone());

    argv
}

/// Container selected for a relay destination.
pub fn output_format(output: &str) -> &'static str {
    if is_rtsp(output) { "rtsp" } else { "flv" }
}

fn is_rtsp(url: &str) -> bool {
    url.starts_with("rtsp://")
}

/// Absolute unix path, or a Windows drive path like `C:\…`.
pub fn is_local_file(input: &str) -> bool {
    input.starts_with('/') || input.as_bytes().get(1) == Some(&b':')
}

/// Everything a trans worker needs besides its task.
#[derive(Debug, Clone)]
pub struct TransJob<'a> {
    pub stream: &'a StreamPath,
    pub endpoint: LocalEndpoint,
    /// `<mediaroot>/<app>/<name>`
    pub output_dir: &'a str,
    /// File stem for mp4 recordings, e.g. `2024-01-31-12-00-00`.
    pub recording_stamp: &'a str,
}

/// Build the argument vector of a trans worker.
///
/// All outputs go through one `tee` muxer:
/// `-y -i IN -c:v VC [vcParam…] -c:a AC [acParam…] -f tee -map 0:a? -map 0:v? SPEC`
pub fn build_trans_args(task: &TransTask, job: &TransJob<'_>) -> Vec<String> {
    let mut argv: Vec<String> = vec!["-y".into(), "-i".into(), job.endpoint.url(job.stream)];

    argv.push("-c:v".into());
    argv.push(task.vc.clone().unwrap_or_else(|| "copy".into()));
    argv.extend(task.vc_param.iter().cloned());

    argv.push("-c:a".into());
    argv.push(task.ac.clone().unwrap_or_else(|| "copy".into()));
    argv.extend(task.ac_param.iter().cloned());

    argv.extend(["-f", "tee", "-map", "0:a?", "-map", "0:v?"].map(String::from));
    argv.push(tee_spec(task, job));

    argv.retain(|arg| !arg.is_empty());
    argv
}

fn tee_spec(task: &TransTask, job: &TransJob<'_>) -> String {
    let mut outputs: Vec<String> = Vec::new();
    let dir = job.output_dir;

    if task.rtmp {
        match task.rtmp_app.as_deref() {
            Some(rtmp_app) if rtmp_app != job.stream.app() => {
                // Validated segments, so this cannot fail.
                if let Ok(target) = StreamPath::new(rtmp_app, job.stream.name()) {
                    outputs.push(format!("[f=flv]{}", job.endpoint.url(&target)));
                }
            }
            Some(_) => {
                tracing::error!(
                    stream = %job.stream,
                    "trans rtmp output cannot target the same app; skipping"
                );
            }
            None => {}
        }
    }

    if task.mp4 {
        let flags = task.mp4_flags.as_deref().unwrap_or("");
        outputs.push(format!("{flags}{dir}/{}.mp4", job.recording_stamp));
    }

    if task.hls {
        let flags = task.hls_flags.as_deref().unwrap_or("");
        outputs.push(format!("{flags}{dir}/index.m3u8"));
    }

    if task.dash {
        let flags = task.dash_flags.as_deref().unwrap_or("");
        outputs.push(format!("{flags}{dir}/index.mpd"));
    }

    outputs.join("|")
}
