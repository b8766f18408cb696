// src/stream/path.rs

use std::fmt;

use crate::errors::{RelayError, Result};

/// A validated `/app/name` stream path.
///
/// Both segments are non-empty and contain no `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamPath {
    app: String,
    name: String,
}

impl StreamPath {
    /// Build a path from its two segments.
    pub fn new(app: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let app = app.into();
        let name = name.into();
        if !is_valid_segment(&app) || !is_valid_segment(&name) {
            return Err(RelayError::InvalidStreamPath(format!("/{app}/{name}")));
        }
        Ok(Self { app, name })
    }

    /// Parse `/app/name`. The leading `/` is optional.
    ///
    /// Missing, empty or extra segments are rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.strip_prefix('/').unwrap_or(raw);
        let (app, name) = trimmed
            .split_once('/')
            .ok_or_else(|| RelayError::InvalidStreamPath(raw.to_string()))?;

        if !is_valid_segment(app) || !is_valid_segment(name) {
            return Err(RelayError::InvalidStreamPath(raw.to_string()));
        }

        Ok(Self {
            app: app.to_string(),
            name: name.to_string(),
        })
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains('/')
}

impl fmt::Display for StreamPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.app, self.name)
    }
}
