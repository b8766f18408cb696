#![allow(dead_code)]

use std::path::PathBuf;

use mediarelay::config::{
    ConfigFile, HttpSection, RawConfigFile, RelaySection, RelayTask, RtmpSection, TransSection,
    TransTask,
};
use mediarelay::types::{RelayMode, RtspTransport};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                rtmp: RtmpSection::default(),
                http: HttpSection::default(),
                relay: None,
                trans: None,
            },
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.rtmp.port = port;
        self
    }

    pub fn with_mediaroot(mut self, mediaroot: &str) -> Self {
        self.config.http.mediaroot = PathBuf::from(mediaroot);
        self
    }

    pub fn with_relay_task(mut self, task: RelayTask) -> Self {
        self.config
            .relay
            .get_or_insert_with(|| RelaySection {
                ffmpeg: PathBuf::from("/usr/bin/ffmpeg"),
                tasks: Vec::new(),
            })
            .tasks
            .push(task);
        self
    }

    pub fn with_trans_task(mut self, task: TransTask) -> Self {
        self.config
            .trans
            .get_or_insert_with(|| TransSection {
                ffmpeg: PathBuf::from("/usr/bin/ffmpeg"),
                tasks: Vec::new(),
            })
            .tasks
            .push(task);
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `RelayTask`.
pub struct RelayTaskBuilder {
    task: RelayTask,
}

impl RelayTaskBuilder {
    pub fn new(mode: RelayMode, app: &str, edge: &str) -> Self {
        Self {
            task: RelayTask {
                mode,
                app: app.to_string(),
                edge: edge.to_string(),
                name: None,
                rtsp_transport: None,
                add_muted_audio: false,
                append_name: None,
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.task.name = Some(name.to_string());
        self
    }

    pub fn rtsp_transport(mut self, transport: RtspTransport) -> Self {
        self.task.rtsp_transport = Some(transport);
        self
    }

    pub fn muted_audio(mut self, val: bool) -> Self {
        self.task.add_muted_audio = val;
        self
    }

    pub fn append_name(mut self, val: bool) -> Self {
        self.task.append_name = Some(val);
        self
    }

    pub fn build(self) -> RelayTask {
        self.task
    }
}

/// Builder for `TransTask`.
pub struct TransTaskBuilder {
    task: TransTask,
}

impl TransTaskBuilder {
    pub fn new(app: &str) -> Self {
        Self {
            task: TransTask {
                app: app.to_string(),
                ..TransTask::default()
            },
        }
    }

    pub fn hls(mut self, flags: &str) -> Self {
        self.task.hls = true;
        self.task.hls_flags = Some(flags.to_string());
        self
    }

    pub fn dash(mut self, flags: &str) -> Self {
        self.task.dash = true;
        self.task.dash_flags = Some(flags.to_string());
        self
    }

    pub fn mp4(mut self, flags: &str) -> Self {
        self.task.mp4 = true;
        self.task.mp4_flags = Some(flags.to_string());
        self
    }

    pub fn rtmp(mut self, rtmp_app: &str) -> Self {
        self.task.rtmp = true;
        self.task.rtmp_app = Some(rtmp_app.to_string());
        self
    }

    pub fn video(mut self, codec: &str, params: &[&str]) -> Self {
        self.task.vc = Some(codec.to_string());
        self.task.vc_param = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn audio(mut self, codec: &str, params: &[&str]) -> Self {
        self.task.ac = Some(codec.to_string());
        self.task.ac_param = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn build(self) -> TransTask {
        self.task
    }
}
