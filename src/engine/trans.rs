// src/engine/trans.rs

//! Transcoding/packaging of locally published streams into the media root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use tracing::{debug, error, info, warn};

use crate::bus::{EventKind, ServerEvent, StreamEvent};
use crate::config::{TransSection, TransTask};
use crate::fs::FileSystem;
use crate::stream::{LocalEndpoint, StreamPath};
use crate::task::tasks_for_app;
use crate::types::{SessionId, SessionKey};
use crate::worker::{TransJob, WorkerBackend, WorkerExit, build_trans_args};

use super::Orchestrator;
use super::pool::{Launch, WorkerPool};
use super::registry::SessionRegistry;

/// Segment and playlist files left behind by a finished trans worker.
/// Recordings (`.mp4`) are kept.
pub const TRANSIENT_EXTENSIONS: &[&str] = &["ts", "m3u8", "mpd", "m4s", "tmp"];

const RECORDING_STAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

const SUBSCRIPTIONS: &[EventKind] = &[EventKind::AfterPublish, EventKind::DonePublish];

pub struct TransOrchestrator<B: WorkerBackend> {
    tasks: Vec<TransTask>,
    mediaroot: PathBuf,
    endpoint: LocalEndpoint,
    fs: Arc<dyn FileSystem>,
    pool: WorkerPool<B>,
    shutting_down: bool,
}

impl<B: WorkerBackend> TransOrchestrator<B> {
    pub fn new(
        section: TransSection,
        mediaroot: impl Into<PathBuf>,
        endpoint: LocalEndpoint,
        backend: B,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            tasks: section.tasks,
            mediaroot: mediaroot.into(),
            endpoint,
            fs,
            pool: WorkerPool::new(section.ffmpeg, backend),
            shutting_down: false,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        self.pool.registry()
    }

    pub fn backend(&self) -> &B {
        self.pool.backend()
    }

    /// `<mediaroot>/<app>/<name>`
    pub fn output_dir(&self, path: &StreamPath) -> PathBuf {
        self.mediaroot.join(path.app()).join(path.name())
    }

    pub fn after_publish(&mut self, event: &StreamEvent) {
        if self.shutting_down {
            return;
        }
        let path = match StreamPath::parse(&event.stream_path) {
            Ok(path) => path,
            Err(e) => {
                debug!(session_id = %event.id, error = %e, "malformed stream path; skipping");
                return;
            }
        };

        let output_dir = self.output_dir(&path);
        let stamp = Local::now().format(RECORDING_STAMP_FORMAT).to_string();

        let launches: Vec<Launch> = tasks_for_app(&path, &self.tasks)
            .into_iter()
            .map(|(_, task)| {
                let dir = output_dir.to_string_lossy();
                let job = TransJob {
                    stream: &path,
                    endpoint: self.endpoint,
                    output_dir: &dir,
                    recording_stamp: &stamp,
                };
                Launch {
                    key: SessionKey::Dynamic(event.id.clone()),
                    input: self.endpoint.url(&path),
                    output: dir.to_string(),
                    args: build_trans_args(task, &job),
                    stream_path: path.clone(),
                }
            })
            .collect();

        if launches.is_empty() {
            return;
        }
        if let Err(e) = self.fs.create_dir_all(&output_dir) {
            error!(dir = %output_dir.display(), error = %e, "cannot create trans output directory");
            return;
        }

        for launch in launches {
            info!(session_id = %event.id, input = %launch.input, output = %launch.output, "trans start");
            self.pool.launch(launch);
        }
    }

    pub fn done_publish(&mut self, event: &StreamEvent) {
        self.pool.stop(&SessionKey::Dynamic(event.id.clone()));
    }

    /// Reap the worker and clear its transient output.
    pub fn handle_exit(&mut self, exit: &WorkerExit) {
        if let Some(session) = self.pool.reap(exit) {
            self.clean_output(Path::new(session.output()));
        }
    }

    pub fn shutdown(&mut self) {
        self.shutting_down = true;
        let stopped = self.pool.stop_all();
        info!(stopped, "trans orchestrator shutting down");
    }

    pub fn is_drained(&self) -> bool {
        self.pool.registry().is_empty()
    }

    fn clean_output(&self, dir: &Path) {
        let entries = match self.fs.read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "no trans output to clean");
                return;
            }
        };

        for file in entries.into_iter().filter(|p| is_transient(p)) {
            match self.fs.remove_file(&file) {
                Ok(()) => debug!(file = %file.display(), "removed transient output"),
                Err(e) => warn!(file = %file.display(), error = %e, "failed to remove transient output"),
            }
        }
    }
}

fn is_transient(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| TRANSIENT_EXTENSIONS.contains(&ext))
}

impl<B: WorkerBackend> Orchestrator for TransOrchestrator<B> {
    fn name(&self) -> &'static str {
        "trans"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        SUBSCRIPTIONS
    }

    fn handle_event(&mut self, event: ServerEvent) -> Option<SessionId> {
        match event {
            ServerEvent::AfterPublish(e) => self.after_publish(&e),
            ServerEvent::DonePublish(e) => self.done_publish(&e),
            other => debug!(kind = ?other.kind(), "trans orchestrator ignores event"),
        }
        None
    }

    fn handle_exit(&mut self, exit: WorkerExit) {
        TransOrchestrator::handle_exit(self, &exit);
    }

    fn shutdown(&mut self) {
        TransOrchestrator::shutdown(self);
    }

    fn is_drained(&self) -> bool {
        TransOrchestrator::is_drained(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::worker::backend::testing::RecordingBackend;

    fn hls_task(app: &str) -> TransTask {
        TransTask {
            app: app.into(),
            hls: true,
            hls_flags: Some("[hls_time=2:hls_list_size=3]".into()),
            ..TransTask::default()
        }
    }

    fn orchestrator(
        tasks: Vec<TransTask>,
    ) -> (TransOrchestrator<RecordingBackend>, RecordingBackend, MockFileSystem) {
        let backend = RecordingBackend::default();
        let fs = MockFileSystem::new();
        let section = TransSection {
            ffmpeg: PathBuf::from("/usr/bin/ffmpeg"),
            tasks,
        };
        let orch = TransOrchestrator::new(
            section,
            "/media",
            LocalEndpoint::new(1935),
            backend.clone(),
            Arc::new(fs.clone()),
        );
        (orch, backend, fs)
    }

    #[test]
    fn after_publish_creates_output_dir_and_starts_worker() {
        let (mut orch, backend, fs) = orchestrator(vec![hls_task("live")]);

        orch.after_publish(&StreamEvent::new("P1", "/live/a"));

        assert!(fs.is_dir(Path::new("/media/live/a")));
        let launched = backend.launched();
        assert_eq!(launched.len(), 1);
        assert_eq!(launched[0].key, SessionKey::Dynamic("P1".into()));
        assert_eq!(
            launched[0].args.last().map(String::as_str),
            Some("[hls_time=2:hls_list_size=3]/media/live/a/index.m3u8")
        );
    }

    #[test]
    fn other_apps_are_ignored() {
        let (mut orch, backend, fs) = orchestrator(vec![hls_task("live")]);
        orch.after_publish(&StreamEvent::new("P1", "/vod/a"));
        assert!(backend.launched().is_empty());
        assert!(!fs.exists(Path::new("/media/vod/a")));
    }

    #[test]
    fn done_publish_stops_and_exit_cleans_segments() {
        let (mut orch, backend, fs) = orchestrator(vec![hls_task("live")]);
        orch.after_publish(&StreamEvent::new("P1", "/live/a"));
        fs.add_file("/media/live/a/index.m3u8");
        fs.add_file("/media/live/a/index0.ts");
        fs.add_file("/media/live/a/2024-01-31-12-00-00.mp4");

        orch.done_publish(&StreamEvent::new("P1", "/live/a"));
        assert_eq!(backend.stopped(), vec![1]);

        orch.handle_exit(&backend.exit_of(0, Some(255)));
        assert!(orch.is_drained());
        assert_eq!(
            fs.file_paths(),
            vec![PathBuf::from("/media/live/a/2024-01-31-12-00-00.mp4")]
        );
    }

    #[test]
    fn unwritable_output_dir_starts_nothing() {
        let (mut orch, backend, fs) = orchestrator(vec![hls_task("live")]);
        fs.add_readonly_dir("/media");

        orch.after_publish(&StreamEvent::new("P1", "/live/a"));
        assert!(backend.launched().is_empty());
    }

    #[test]
    fn transient_extensions() {
        assert!(is_transient(Path::new("/m/a/index.m3u8")));
        assert!(is_transient(Path::new("/m/a/seg-1.m4s")));
        assert!(!is_transient(Path::new("/m/a/rec.mp4")));
        assert!(!is_transient(Path::new("/m/a/noext")));
    }
}
