// src/directory.rs

//! Read access to the hosting server's publisher/viewer state.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::stream::StreamPath;
use crate::types::SessionId;

/// Snapshot of the publisher currently serving a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublisherInfo {
    pub session_id: SessionId,
    pub viewers: usize,
}

/// Lookup interface injected into orchestrators.
pub trait PublisherDirectory: Send + Sync {
    fn publisher(&self, path: &StreamPath) -> Option<PublisherInfo>;

    fn has_publisher(&self, path: &StreamPath) -> bool {
        self.publisher(path).is_some()
    }
}

#[derive(Debug, Default)]
struct PublisherEntry {
    session_id: SessionId,
    viewers: HashSet<SessionId>,
}

#[derive(Debug, Default)]
struct Streams {
    publishers: HashMap<StreamPath, PublisherEntry>,
    /// Viewers waiting for a stream that nobody publishes yet.
    idle: HashMap<StreamPath, HashSet<SessionId>>,
}

/// Shared in-memory directory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    streams: Arc<RwLock<Streams>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `session_id` as the publisher of `path`, replacing any
    /// previous publisher. Idle viewers of `path` are attached to it.
    pub fn publish(&self, path: &StreamPath, session_id: &str) {
        let mut streams = self.streams.write().unwrap_or_else(|e| e.into_inner());
        let viewers = streams.idle.remove(path).unwrap_or_default();
        let attached = viewers.len();
        streams.publishers.insert(
            path.clone(),
            PublisherEntry {
                session_id: session_id.to_string(),
                viewers,
            },
        );
        debug!(stream = %path, session_id, attached, "publisher registered");
    }

    /// Remove the publisher of `path` if it is `session_id`. Its viewers go
    /// back to idle.
    pub fn unpublish(&self, path: &StreamPath, session_id: &str) -> bool {
        let mut streams = self.streams.write().unwrap_or_else(|e| e.into_inner());
        let is_owner = streams
            .publishers
            .get(path)
            .is_some_and(|entry| entry.session_id == session_id);
        if !is_owner {
            return false;
        }
        if let Some(entry) = streams.publishers.remove(path) {
            if !entry.viewers.is_empty() {
                streams.idle.entry(path.clone()).or_default().extend(entry.viewers);
            }
        }
        debug!(stream = %path, session_id, "publisher removed");
        true
    }

    /// Attach a viewer. Returns `false` when nobody publishes `path` yet; the
    /// viewer then waits idle until a publisher shows up.
    pub fn add_viewer(&self, path: &StreamPath, viewer_id: &str) -> bool {
        let mut streams = self.streams.write().unwrap_or_else(|e| e.into_inner());
        match streams.publishers.get_mut(path) {
            Some(entry) => {
                entry.viewers.insert(viewer_id.to_string());
                true
            }
            None => {
                streams
                    .idle
                    .entry(path.clone())
                    .or_default()
                    .insert(viewer_id.to_string());
                debug!(stream = %path, viewer_id, "viewer idle until stream is published");
                false
            }
        }
    }

    /// Detach a viewer, live or idle. Returns whether it was known.
    pub fn remove_viewer(&self, path: &StreamPath, viewer_id: &str) -> bool {
        let mut streams = self.streams.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = streams.publishers.get_mut(path) {
            if entry.viewers.remove(viewer_id) {
                return true;
            }
        }
        let Some(idle) = streams.idle.get_mut(path) else {
            return false;
        };
        let removed = idle.remove(viewer_id);
        if idle.is_empty() {
            streams.idle.remove(path);
        }
        removed
    }
}

impl PublisherDirectory for InMemoryDirectory {
    fn publisher(&self, path: &StreamPath) -> Option<PublisherInfo> {
        let streams = self.streams.read().unwrap_or_else(|e| e.into_inner());
        streams.publishers.get(path).map(|entry| PublisherInfo {
            session_id: entry.session_id.clone(),
            viewers: entry.viewers.len(),
        })
    }
}
