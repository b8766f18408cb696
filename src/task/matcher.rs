// src/task/matcher.rs

//! Mapping stream paths to configured tasks, and task edges to concrete
//! endpoints.

use crate::config::{RelayTask, TransTask};
use crate::stream::StreamPath;
use crate::types::{RelayMode, StreamArgs};

/// Anything scoped to a single app on the hosting server.
pub trait AppScoped {
    fn app(&self) -> &str;
}

impl AppScoped for RelayTask {
    fn app(&self) -> &str {
        &self.app
    }
}

impl AppScoped for TransTask {
    fn app(&self) -> &str {
        &self.app
    }
}

/// All tasks whose `app` equals the path's app, as `(index, task)`.
///
/// Iterates in reverse declaration order, so later-declared tasks come
/// first.
pub fn tasks_for_app<'a, T: AppScoped>(path: &StreamPath, tasks: &'a [T]) -> Vec<(usize, &'a T)> {
    tasks
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, task)| task.app() == path.app())
        .collect()
}

/// Relay tasks of the given mode applicable to `path`, later-declared first.
pub fn match_tasks<'a>(
    path: &StreamPath,
    tasks: &'a [RelayTask],
    mode: RelayMode,
) -> Vec<(usize, &'a RelayTask)> {
    tasks_for_app(path, tasks)
        .into_iter()
        .filter(|(_, task)| task.mode == mode)
        .collect()
}

/// Whether `edge` already names an app: `scheme://host/segment[/...]`.
pub fn edge_has_app(edge: &str) -> bool {
    let Some((scheme, rest)) = edge.split_once("://") else {
        return false;
    };
    if scheme.is_empty() {
        return false;
    }
    match rest.split_once('/') {
        Some((host, tail)) => {
            !host.is_empty() && tail.split('/').next().is_some_and(|seg| !seg.is_empty())
        }
        None => false,
    }
}

/// Resolve an edge template for a concrete stream.
///
/// - Edge already names an app: append only the stream name.
/// - Otherwise: append the full `/app/name` path.
pub fn resolve_edge(edge: &str, path: &StreamPath) -> String {
    let edge = edge.trim_end_matches('/');
    if edge_has_app(edge) {
        format!("{edge}/{}", path.name())
    } else {
        format!("{edge}{path}")
    }
}

/// Append event arguments as a URL query string.
///
/// Empty args leave the URL untouched. Keys come out sorted and both sides
/// are percent-encoded (space as `%20`). The separator is `?`, or `&` when
/// the URL already carries a query.
pub fn append_query(url: &str, args: &StreamArgs) -> String {
    if args.is_empty() {
        return url.to_string();
    }

    let query = args
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}
