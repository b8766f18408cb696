// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `mediarelay`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "mediarelay",
    version,
    about = "Relay and transcode live streams by supervising ffmpeg workers.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `MediaRelay.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "MediaRelay.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `MEDIARELAY_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print tasks and static worker commands, but don't
    /// start anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Don't read lifecycle events from stdin; run until Ctrl-C.
    #[arg(long)]
    pub no_stdin: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
