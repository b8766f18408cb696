// src/config/mod.rs

//! Configuration loading and validation for mediarelay.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate task and section invariants (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_from_str};
pub use model::{
    ConfigFile, HttpSection, RawConfigFile, RelaySection, RelayTask, RtmpSection, TransSection,
    TransTask,
};
