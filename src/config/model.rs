// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{RelayMode, RtspTransport};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [rtmp]
/// port = 1935
///
/// [http]
/// mediaroot = "./media"
///
/// [relay]
/// ffmpeg = "/usr/bin/ffmpeg"
///
/// [[relay.tasks]]
/// mode = "pull"
/// app = "live"
/// edge = "rtmp://origin.example.com"
///
/// [trans]
/// ffmpeg = "/usr/bin/ffmpeg"
///
/// [[trans.tasks]]
/// app = "live"
/// hls = true
/// ```
///
/// `relay` and `trans` are optional; an absent section means that
/// orchestrator is not started.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub rtmp: RtmpSection,

    #[serde(default)]
    pub http: HttpSection,

    #[serde(default)]
    pub relay: Option<RelaySection>,

    #[serde(default)]
    pub trans: Option<TransSection>,
}

/// Validated configuration. Only constructed through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub rtmp: RtmpSection,
    pub http: HttpSection,
    pub relay: Option<RelaySection>,
    pub trans: Option<TransSection>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        rtmp: RtmpSection,
        http: HttpSection,
        relay: Option<RelaySection>,
        trans: Option<TransSection>,
    ) -> Self {
        Self {
            rtmp,
            http,
            relay,
            trans,
        }
    }
}

/// `[rtmp]` section: where the hosting server listens.
#[derive(Debug, Clone, Deserialize)]
pub struct RtmpSection {
    #[serde(default = "default_rtmp_port")]
    pub port: u16,
}

fn default_rtmp_port() -> u16 {
    1935
}

impl Default for RtmpSection {
    fn default() -> Self {
        Self {
            port: default_rtmp_port(),
        }
    }
}

/// `[http]` section. Only `mediaroot` is consumed, as the output root for
/// transcoded segments.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpSection {
    #[serde(default = "default_mediaroot")]
    pub mediaroot: PathBuf,
}

fn default_mediaroot() -> PathBuf {
    PathBuf::from("./media")
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            mediaroot: default_mediaroot(),
        }
    }
}

/// `[relay]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RelaySection {
    /// Path to the worker binary.
    pub ffmpeg: PathBuf,

    /// Relay tasks in declaration order. Later tasks take precedence when
    /// several match the same stream.
    #[serde(default)]
    pub tasks: Vec<RelayTask>,
}

/// One `[[relay.tasks]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayTask {
    pub mode: RelayMode,

    /// App this task applies to.
    pub app: String,

    /// Remote endpoint template (`rtmp://host[/app]`, `rtsp://...`, or a
    /// local file for static tasks).
    pub edge: String,

    /// Fixed stream name. Static tasks without one get a random name.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub rtsp_transport: Option<RtspTransport>,

    /// Mux a generated silent audio track next to the relayed video.
    #[serde(default, rename = "addMutedAudio", alias = "add_muted_audio")]
    pub add_muted_audio: bool,

    /// Push tasks only: when `false`, push to `edge` verbatim.
    #[serde(default, rename = "appendName", alias = "append_name")]
    pub append_name: Option<bool>,
}

impl RelayTask {
    /// Effective `appendName`, defaulting to `true`.
    pub fn effective_append_name(&self) -> bool {
        self.append_name.unwrap_or(true)
    }
}

/// `[trans]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TransSection {
    pub ffmpeg: PathBuf,

    #[serde(default)]
    pub tasks: Vec<TransTask>,
}

/// One `[[trans.tasks]]` entry.
///
/// Every enabled output is written through a single `tee` muxer into
/// `<mediaroot>/<app>/<name>/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TransTask {
    pub app: String,

    #[serde(default)]
    pub hls: bool,
    #[serde(default, rename = "hlsFlags", alias = "hls_flags")]
    pub hls_flags: Option<String>,

    #[serde(default)]
    pub dash: bool,
    #[serde(default, rename = "dashFlags", alias = "dash_flags")]
    pub dash_flags: Option<String>,

    #[serde(default)]
    pub mp4: bool,
    #[serde(default, rename = "mp4Flags", alias = "mp4_flags")]
    pub mp4_flags: Option<String>,

    /// Re-publish into another local app.
    #[serde(default)]
    pub rtmp: bool,
    #[serde(default, rename = "rtmpApp", alias = "rtmp_app")]
    pub rtmp_app: Option<String>,

    /// Video codec, `copy` when unset.
    #[serde(default)]
    pub vc: Option<String>,
    #[serde(default, rename = "vcParam", alias = "vc_param")]
    pub vc_param: Vec<String>,

    /// Audio codec, `copy` when unset.
    #[serde(default)]
    pub ac: Option<String>,
    #[serde(default, rename = "acParam", alias = "ac_param")]
    pub ac_param: Vec<String>,
}
