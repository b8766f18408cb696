use std::collections::BTreeMap;
use std::fmt;

use rand::Rng;
use serde::Deserialize;

/// Opaque session identifier handed out by the hosting server (or generated
/// here for request-style relays).
pub type SessionId = String;

/// Unique, monotonically increasing id of one spawned worker instance.
///
/// Registry keys can be reused once a session has closed; worker ids never
/// are, so exit notifications are matched against them.
pub type WorkerId = u64;

/// Supplementary key/value arguments carried by lifecycle events.
///
/// Ordered so the serialized query string is deterministic.
pub type StreamArgs = BTreeMap<String, String>;

/// How a relay task is activated.
///
/// - `Static`: kept alive by the reconciliation tick.
/// - `Pull`: started when a viewer asks for a stream nobody publishes locally.
/// - `Push`: started when a stream is published locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    Static,
    Pull,
    Push,
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelayMode::Static => "static",
            RelayMode::Pull => "pull",
            RelayMode::Push => "push",
        };
        f.write_str(s)
    }
}

/// RTSP lower transport accepted by the worker's `-rtsp_transport` option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RtspTransport {
    Udp,
    Tcp,
    UdpMulticast,
    Http,
}

impl RtspTransport {
    pub fn as_str(&self) -> &'static str {
        match self {
            RtspTransport::Udp => "udp",
            RtspTransport::Tcp => "tcp",
            RtspTransport::UdpMulticast => "udp_multicast",
            RtspTransport::Http => "http",
        }
    }
}

/// Registry partition plus key a session lives under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SessionKey {
    /// Static task, keyed by its index in the relay task list.
    Static(usize),
    /// Event-driven session, keyed by the triggering session id.
    Dynamic(SessionId),
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKey::Static(index) => write!(f, "static#{index}"),
            SessionKey::Dynamic(id) => write!(f, "{id}"),
        }
    }
}

const SESSION_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const STREAM_NAME_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a fresh session id for request-style relays.
pub fn generate_session_id() -> SessionId {
    random_string(SESSION_ID_ALPHABET, 8)
}

/// Generate a stream name for static tasks that do not configure one.
pub fn generate_stream_name() -> String {
    random_string(STREAM_NAME_ALPHABET, 8)
}

fn random_string(alphabet: &[u8], len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}
