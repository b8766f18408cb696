// src/task/mod.rs

//! Task selection.
//!
//! Relay and trans tasks are declared once in config; [`matcher`] decides
//! which of them apply to a given stream and how their endpoint templates
//! resolve.

pub mod matcher;

pub use matcher::{append_query, match_tasks, resolve_edge, tasks_for_app};
