// src/engine/relay.rs

//! Relay orchestration: static (always-on) pulls, on-demand pulls for
//! players, and pushes of locally published streams.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bus::{EventKind, ServerEvent, StreamEvent};
use crate::config::{RelaySection, RelayTask};
use crate::directory::PublisherDirectory;
use crate::stream::{LocalEndpoint, StreamPath};
use crate::task::{append_query, match_tasks, resolve_edge};
use crate::types::{RelayMode, SessionId, SessionKey, generate_session_id, generate_stream_name};
use crate::worker::{RelayJob, WorkerBackend, WorkerExit, build_relay_args};

use super::Orchestrator;
use super::pool::{Launch, WorkerPool};
use super::registry::SessionRegistry;

/// Reconciliation period for static tasks.
pub const RELAY_TICK: Duration = Duration::from_secs(1);

const SUBSCRIPTIONS: &[EventKind] = &[
    EventKind::RelayPull,
    EventKind::RelayPush,
    EventKind::BeforePlay,
    EventKind::DonePlay,
    EventKind::AfterPublish,
    EventKind::DonePublish,
];

pub struct RelayOrchestrator<B: WorkerBackend> {
    tasks: Vec<RelayTask>,
    /// Local stream fed by each static task; `None` for other modes.
    static_paths: Vec<Option<StreamPath>>,
    endpoint: LocalEndpoint,
    directory: Arc<dyn PublisherDirectory>,
    pool: WorkerPool<B>,
    /// Live pulls started for players, by the id of the viewer that
    /// triggered them.
    player_pulls: HashSet<SessionId>,
    shutting_down: bool,
}

impl<B: WorkerBackend> RelayOrchestrator<B> {
    /// Static tasks without a configured name get a random one here, once,
    /// so restarts keep feeding the same local stream.
    pub fn new(
        section: RelaySection,
        endpoint: LocalEndpoint,
        backend: B,
        directory: Arc<dyn PublisherDirectory>,
    ) -> Self {
        let static_paths = section
            .tasks
            .iter()
            .map(|task| {
                if task.mode != RelayMode::Static {
                    return None;
                }
                let name = task.name.clone().unwrap_or_else(generate_stream_name);
                match StreamPath::new(task.app.clone(), name) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!(app = %task.app, error = %e, "static task has no valid stream path; ignoring");
                        None
                    }
                }
            })
            .collect();

        Self {
            tasks: section.tasks,
            static_paths,
            endpoint,
            directory,
            pool: WorkerPool::new(section.ffmpeg, backend),
            player_pulls: HashSet::new(),
            shutting_down: false,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        self.pool.registry()
    }

    pub fn backend(&self) -> &B {
        self.pool.backend()
    }

    /// Local stream of the static task at `index`.
    pub fn static_path(&self, index: usize) -> Option<&StreamPath> {
        self.static_paths.get(index).and_then(Option::as_ref)
    }

    /// Start every static task that has no live session, later-declared
    /// tasks first.
    pub fn tick(&mut self) {
        if self.shutting_down {
            return;
        }
        for index in (0..self.tasks.len()).rev() {
            let key = SessionKey::Static(index);
            if self.pool.contains(&key) {
                continue;
            }
            let Some(path) = self.static_paths[index].clone() else {
                continue;
            };
            let task = &self.tasks[index];
            let job = RelayJob::new(task.edge.clone(), self.endpoint.url(&path))
                .with_rtsp_transport(task.rtsp_transport)
                .with_muted_audio(task.add_muted_audio);
            info!(task = index, input = %job.input, output = %job.output, "relay static pull");
            self.launch(key, job, path);
        }
    }

    /// Pull `url` into the local `app/name`. Returns the new session id.
    pub fn relay_pull(&mut self, url: &str, app: &str, name: &str) -> Option<SessionId> {
        let path = self.request_path(app, name)?;
        let id = generate_session_id();
        let job = RelayJob::new(url, self.endpoint.url(&path));
        info!(session_id = %id, input = %job.input, output = %job.output, "relay dynamic pull");
        self.launch(SessionKey::Dynamic(id.clone()), job, path)
            .then_some(id)
    }

    /// Push the local `app/name` to `url`. Returns the new session id.
    pub fn relay_push(&mut self, url: &str, app: &str, name: &str) -> Option<SessionId> {
        let path = self.request_path(app, name)?;
        let id = generate_session_id();
        let job = RelayJob::new(self.endpoint.url(&path), url);
        info!(session_id = %id, input = %job.input, output = %job.output, "relay dynamic push");
        self.launch(SessionKey::Dynamic(id.clone()), job, path)
            .then_some(id)
    }

    /// A player asked for a stream: pull it from the matching edges unless
    /// it is already published locally.
    pub fn before_play(&mut self, event: &StreamEvent) {
        let Some(path) = parse_event_path(event) else {
            return;
        };

        let jobs: Vec<RelayJob> = match_tasks(&path, &self.tasks, RelayMode::Pull)
            .into_iter()
            .map(|(_, task)| {
                let input = append_query(&resolve_edge(&task.edge, &path), &event.args);
                RelayJob::new(input, self.endpoint.url(&path))
                    .with_rtsp_transport(task.rtsp_transport)
                    .with_muted_audio(task.add_muted_audio)
            })
            .collect();

        if jobs.is_empty() {
            return;
        }
        if self.directory.has_publisher(&path) {
            debug!(stream = %path, "stream already published locally; not pulling");
            return;
        }

        for job in jobs {
            info!(session_id = %event.id, input = %job.input, output = %job.output, "relay dynamic pull");
            if self.launch(SessionKey::Dynamic(event.id.clone()), job, path.clone()) {
                self.player_pulls.insert(event.id.clone());
            }
        }
    }

    /// A player left: once the stream has no viewers, stop the pulls started
    /// for it, whichever viewer triggered them.
    pub fn done_play(&mut self, event: &StreamEvent) {
        let path = StreamPath::parse(&event.stream_path).ok();
        let viewers = path
            .as_ref()
            .and_then(|path| self.directory.publisher(path))
            .map_or(0, |publisher| publisher.viewers);

        if viewers > 0 {
            debug!(session_id = %event.id, viewers, "stream still watched; keeping pull");
            return;
        }

        let mut stopped = usize::from(self.pool.stop(&SessionKey::Dynamic(event.id.clone())));
        if let Some(path) = &path {
            let player_pulls = &self.player_pulls;
            stopped += self
                .pool
                .stop_dynamics_for(path, |id| player_pulls.contains(id));
        }
        if stopped > 0 {
            debug!(session_id = %event.id, stopped, "last viewer left; stopped pulls");
        }
    }

    /// A stream started locally: push it to every matching edge.
    pub fn after_publish(&mut self, event: &StreamEvent) {
        let Some(path) = parse_event_path(event) else {
            return;
        };

        let jobs: Vec<RelayJob> = match_tasks(&path, &self.tasks, RelayMode::Push)
            .into_iter()
            .map(|(_, task)| {
                let output = if task.effective_append_name() {
                    append_query(&resolve_edge(&task.edge, &path), &event.args)
                } else {
                    task.edge.clone()
                };
                RelayJob::new(self.endpoint.url(&path), output)
                    .with_muted_audio(task.add_muted_audio)
            })
            .collect();

        for job in jobs {
            info!(session_id = %event.id, input = %job.input, output = %job.output, "relay dynamic push");
            self.launch(SessionKey::Dynamic(event.id.clone()), job, path.clone());
        }
    }

    /// A local publisher stopped: stop its pushes and any static session
    /// feeding the same stream.
    pub fn done_publish(&mut self, event: &StreamEvent) {
        self.pool.stop(&SessionKey::Dynamic(event.id.clone()));

        if let Ok(path) = StreamPath::parse(&event.stream_path) {
            let stopped = self.pool.stop_statics_for(&path);
            if stopped > 0 {
                debug!(stream = %path, stopped, "stopped static sessions of unpublished stream");
            }
        }
    }

    pub fn handle_exit(&mut self, exit: &WorkerExit) {
        if let Some(session) = self.pool.reap(exit) {
            if let SessionKey::Dynamic(id) = session.key() {
                self.player_pulls.remove(id);
            }
        }
    }

    /// Stop every session and suppress further static restarts.
    pub fn shutdown(&mut self) {
        self.shutting_down = true;
        let stopped = self.pool.stop_all();
        info!(stopped, "relay orchestrator shutting down");
    }

    pub fn is_drained(&self) -> bool {
        self.pool.registry().is_empty()
    }

    fn request_path(&self, app: &str, name: &str) -> Option<StreamPath> {
        match StreamPath::new(app, name) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(app, name, error = %e, "relay request ignored");
                None
            }
        }
    }

    fn launch(&mut self, key: SessionKey, job: RelayJob, stream_path: StreamPath) -> bool {
        if self.shutting_down {
            return false;
        }
        let args = build_relay_args(&job);
        self.pool.launch(Launch {
            key,
            input: job.input,
            output: job.output,
            args,
            stream_path,
        })
    }
}

impl<B: WorkerBackend> Orchestrator for RelayOrchestrator<B> {
    fn name(&self) -> &'static str {
        "relay"
    }

    fn subscriptions(&self) -> &'static [EventKind] {
        SUBSCRIPTIONS
    }

    fn handle_event(&mut self, event: ServerEvent) -> Option<SessionId> {
        match event {
            ServerEvent::RelayPull { url, app, name } => self.relay_pull(&url, &app, &name),
            ServerEvent::RelayPush { url, app, name } => self.relay_push(&url, &app, &name),
            ServerEvent::BeforePlay(e) => {
                self.before_play(&e);
                None
            }
            ServerEvent::DonePlay(e) => {
                self.done_play(&e);
                None
            }
            ServerEvent::AfterPublish(e) => {
                self.after_publish(&e);
                None
            }
            ServerEvent::DonePublish(e) => {
                self.done_publish(&e);
                None
            }
        }
    }

    fn handle_exit(&mut self, exit: WorkerExit) {
        RelayOrchestrator::handle_exit(self, &exit);
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(RELAY_TICK)
    }

    fn tick(&mut self) {
        RelayOrchestrator::tick(self);
    }

    fn shutdown(&mut self) {
        RelayOrchestrator::shutdown(self);
    }

    fn is_drained(&self) -> bool {
        RelayOrchestrator::is_drained(self)
    }
}

fn parse_event_path(event: &StreamEvent) -> Option<StreamPath> {
    match StreamPath::parse(&event.stream_path) {
        Ok(path) => Some(path),
        Err(e) => {
            debug!(session_id = %event.id, error = %e, "malformed stream path; skipping");
            None
        }
    }
}
