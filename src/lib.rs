// src/lib.rs

pub mod bridge;
pub mod bus;
pub mod cli;
pub mod config;
pub mod directory;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod logging;
pub mod stream;
pub mod task;
pub mod types;
pub mod worker;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::bus::EventBus;
use crate::cli::CliArgs;
use crate::config::{ConfigFile, RelaySection, TransSection, load_and_validate};
use crate::directory::{InMemoryDirectory, PublisherDirectory};
use crate::engine::{RelayOrchestrator, Runtime, TransOrchestrator};
use crate::fs::{FileSystem, RealFileSystem};
use crate::stream::{LocalEndpoint, StreamPath};
use crate::types::{RelayMode, generate_stream_name};
use crate::worker::probe::validate_worker;
use crate::worker::{RelayJob, RealWorkerBackend, build_relay_args};

type OrchestratorHandle = JoinHandle<errors::Result<()>>;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - worker validation and the relay/trans orchestrators
/// - the stdin event bridge
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let bus = EventBus::new();
    let directory = InMemoryDirectory::new();
    let fs = RealFileSystem;
    let endpoint = LocalEndpoint::new(cfg.rtmp.port);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Orchestrators subscribe before the bridge publishes anything.
    let mut handles: Vec<OrchestratorHandle> = Vec::new();
    if let Some(relay) = cfg.relay.clone() {
        let directory: Arc<dyn PublisherDirectory> = Arc::new(directory.clone());
        handles.extend(spawn_relay(relay, endpoint, &bus, directory, &fs, shutdown_rx.clone()).await);
    }
    if let Some(trans) = cfg.trans.clone() {
        handles.extend(
            spawn_trans(trans, &cfg.http.mediaroot, endpoint, &bus, Arc::new(fs.clone()), shutdown_rx.clone())
                .await,
        );
    }

    if handles.is_empty() {
        warn!("no orchestrator started; nothing to do");
        return Ok(());
    }

    // Ctrl-C → graceful shutdown.
    {
        let tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; shutting down");
            let _ = tx.send(true);
        });
    }

    let mut stop_rx = shutdown_rx.clone();
    if args.no_stdin {
        let _ = stop_rx.wait_for(|stop| *stop).await;
    } else {
        tokio::select! {
            res = bridge::run_stdin_bridge(bus.clone(), directory.clone()) => {
                res?;
                info!("stdin closed; shutting down");
            }
            _ = stop_rx.wait_for(|stop| *stop) => {}
        }
    }

    let _ = shutdown_tx.send(true);
    for handle in handles {
        handle.await.context("orchestrator task panicked")??;
    }
    Ok(())
}

/// Validate the relay worker and start the relay orchestrator.
///
/// A failed validation is logged and leaves the relay disabled.
async fn spawn_relay(
    section: RelaySection,
    endpoint: LocalEndpoint,
    bus: &EventBus,
    directory: Arc<dyn PublisherDirectory>,
    fs: &dyn FileSystem,
    shutdown: watch::Receiver<bool>,
) -> Option<OrchestratorHandle> {
    let version = match validate_worker(fs, &section.ffmpeg).await {
        Ok(version) => version,
        Err(e) => {
            error!(ffmpeg = %section.ffmpeg.display(), error = %e, "relay startup failed");
            return None;
        }
    };

    let tasks = section.tasks.len();
    let (exit_tx, exit_rx) = mpsc::unbounded_channel();
    let core = RelayOrchestrator::new(section, endpoint, RealWorkerBackend::new(exit_tx), directory);
    let runtime = Runtime::new(core, bus.clone(), exit_rx);

    info!(tasks, ffmpeg_version = %version, "relay started");
    Some(tokio::spawn(runtime.run(shutdown)))
}

/// Validate the media root and the trans worker, then start the trans
/// orchestrator.
async fn spawn_trans(
    section: TransSection,
    mediaroot: &Path,
    endpoint: LocalEndpoint,
    bus: &EventBus,
    fs: Arc<dyn FileSystem>,
    shutdown: watch::Receiver<bool>,
) -> Option<OrchestratorHandle> {
    if let Err(e) = fs.create_dir_all(mediaroot) {
        error!(mediaroot = %mediaroot.display(), error = %e, "trans startup failed");
        return None;
    }
    if !fs.is_writable_dir(mediaroot) {
        error!(mediaroot = %mediaroot.display(), "trans startup failed: media root cannot be written");
        return None;
    }

    let version = match validate_worker(fs.as_ref(), &section.ffmpeg).await {
        Ok(version) => version,
        Err(e) => {
            error!(ffmpeg = %section.ffmpeg.display(), error = %e, "trans startup failed");
            return None;
        }
    };

    let apps: Vec<String> = section.tasks.iter().rev().map(|t| t.app.clone()).collect();
    let (exit_tx, exit_rx) = mpsc::unbounded_channel();
    let core = TransOrchestrator::new(
        section,
        mediaroot,
        endpoint,
        RealWorkerBackend::new(exit_tx),
        fs,
    );
    let runtime = Runtime::new(core, bus.clone(), exit_rx);

    info!(?apps, mediaroot = %mediaroot.display(), ffmpeg_version = %version, "trans started");
    Some(tokio::spawn(runtime.run(shutdown)))
}

/// Simple dry-run output: print tasks and the commands static tasks would
/// run.
fn print_dry_run(cfg: &ConfigFile) {
    let endpoint = LocalEndpoint::new(cfg.rtmp.port);

    println!("mediarelay dry-run");
    println!("  rtmp.port = {}", cfg.rtmp.port);
    println!("  http.mediaroot = {}", cfg.http.mediaroot.display());
    println!();

    match &cfg.relay {
        Some(relay) => {
            println!("relay tasks ({}), ffmpeg: {}", relay.tasks.len(), relay.ffmpeg.display());
            for (index, task) in relay.tasks.iter().enumerate() {
                println!("  - #{index} {} app={} edge={}", task.mode, task.app, task.edge);
                if let Some(ref name) = task.name {
                    println!("      name: {name}");
                }
                if let Some(transport) = task.rtsp_transport {
                    println!("      rtsp_transport: {}", transport.as_str());
                }
                if task.add_muted_audio {
                    println!("      addMutedAudio: true");
                }
                if task.mode == RelayMode::Push && !task.effective_append_name() {
                    println!("      appendName: false");
                }
                if task.mode == RelayMode::Static {
                    let name = task.name.clone().unwrap_or_else(generate_stream_name);
                    if let Ok(path) = StreamPath::new(task.app.clone(), name) {
                        let job = RelayJob::new(task.edge.clone(), endpoint.url(&path))
                            .with_rtsp_transport(task.rtsp_transport)
                            .with_muted_audio(task.add_muted_audio);
                        println!(
                            "      cmd: {} {}",
                            relay.ffmpeg.display(),
                            build_relay_args(&job).join(" ")
                        );
                    }
                }
            }
        }
        None => println!("relay: disabled"),
    }
    println!();

    match &cfg.trans {
        Some(trans) => {
            println!("trans tasks ({}), ffmpeg: {}", trans.tasks.len(), trans.ffmpeg.display());
            for task in &trans.tasks {
                let outputs: Vec<&str> = [
                    (task.rtmp, "rtmp"),
                    (task.mp4, "mp4"),
                    (task.hls, "hls"),
                    (task.dash, "dash"),
                ]
                .into_iter()
                .filter_map(|(enabled, name)| enabled.then_some(name))
                .collect();
                println!("  - app={} outputs={:?}", task.app, outputs);
            }
        }
        None => println!("trans: disabled"),
    }
}
