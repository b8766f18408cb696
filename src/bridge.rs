// src/bridge.rs

//! JSON-lines bridge from a hosting server process to the event bus.
//!
//! Each input line is one lifecycle event:
//!
//! ```text
//! {"event":"afterPublish","id":"P1","streamPath":"/live/a","args":{}}
//! {"event":"relayPull","url":"rtsp://cam/1","app":"live","name":"cam1"}
//! ```
//!
//! Publish and play events keep an [`InMemoryDirectory`] in sync before they
//! are published. Relay requests are answered on the output with
//! `{"event":"relayPull","id":"..."}` (`id` is `null` when nothing started).

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::bus::{EventBus, ServerEvent, StreamEvent};
use crate::directory::InMemoryDirectory;
use crate::errors::Result;
use crate::stream::StreamPath;
use crate::types::{SessionId, StreamArgs};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamMessage {
    pub id: SessionId,
    pub stream_path: String,
    #[serde(default)]
    pub args: StreamArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayMessage {
    pub url: String,
    pub app: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum BridgeMessage {
    RelayPull(RelayMessage),
    RelayPush(RelayMessage),
    BeforePlay(StreamMessage),
    DonePlay(StreamMessage),
    AfterPublish(StreamMessage),
    DonePublish(StreamMessage),
}

#[derive(Debug, Serialize)]
struct RelayReply<'a> {
    event: &'a str,
    id: Option<SessionId>,
}

impl From<StreamMessage> for StreamEvent {
    fn from(msg: StreamMessage) -> Self {
        StreamEvent::new(msg.id, msg.stream_path).with_args(msg.args)
    }
}

/// Update `directory` for `msg` and turn it into a bus event.
pub fn apply_message(msg: BridgeMessage, directory: &InMemoryDirectory) -> ServerEvent {
    match msg {
        BridgeMessage::RelayPull(r) => ServerEvent::RelayPull {
            url: r.url,
            app: r.app,
            name: r.name,
        },
        BridgeMessage::RelayPush(r) => ServerEvent::RelayPush {
            url: r.url,
            app: r.app,
            name: r.name,
        },
        BridgeMessage::AfterPublish(m) => {
            if let Ok(path) = StreamPath::parse(&m.stream_path) {
                directory.publish(&path, &m.id);
            }
            ServerEvent::AfterPublish(m.into())
        }
        BridgeMessage::DonePublish(m) => {
            if let Ok(path) = StreamPath::parse(&m.stream_path) {
                directory.unpublish(&path, &m.id);
            }
            ServerEvent::DonePublish(m.into())
        }
        BridgeMessage::BeforePlay(m) => {
            if let Ok(path) = StreamPath::parse(&m.stream_path) {
                directory.add_viewer(&path, &m.id);
            }
            ServerEvent::BeforePlay(m.into())
        }
        BridgeMessage::DonePlay(m) => {
            if let Ok(path) = StreamPath::parse(&m.stream_path) {
                directory.remove_viewer(&path, &m.id);
            }
            ServerEvent::DonePlay(m.into())
        }
    }
}

/// Pump events from `reader` onto `bus` until EOF. Returns how many lines
/// were accepted.
pub async fn run_bridge<R, W>(
    reader: R,
    mut writer: W,
    bus: &EventBus,
    directory: &InMemoryDirectory,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut accepted = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let msg: BridgeMessage = match serde_json::from_str(line) {
            Ok(msg) => msg,
            Err(e) => {
                warn!(error = %e, line, "ignoring malformed bridge message");
                continue;
            }
        };
        accepted += 1;

        let event = apply_message(msg, directory);
        let reply_to = match &event {
            ServerEvent::RelayPull { .. } => Some("relayPull"),
            ServerEvent::RelayPush { .. } => Some("relayPush"),
            _ => None,
        };

        match reply_to {
            Some(name) => {
                let id = bus.request(event).await;
                let reply = serde_json::to_string(&RelayReply { event: name, id })
                    .map_err(anyhow::Error::from)?;
                writer.write_all(reply.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
            None => {
                let delivered = bus.publish(event);
                debug!(delivered, "bridge event published");
            }
        }
    }

    info!(accepted, "bridge input closed");
    Ok(accepted)
}

/// [`run_bridge`] over the process's stdin/stdout.
pub async fn run_stdin_bridge(bus: EventBus, directory: InMemoryDirectory) -> Result<usize> {
    let stdin = BufReader::new(tokio::io::stdin());
    run_bridge(stdin, tokio::io::stdout(), &bus, &directory).await
}
