// src/stream/mod.rs

//! Stream addressing on the hosting server.
//!
//! - [`path`] parses and validates `/app/name` stream paths.
//! - [`LocalEndpoint`] builds the loopback URL where relayed and transcoded
//!   media is published back into the hosting server.

pub mod path;

pub use path::StreamPath;

/// Loopback distribution endpoint of the hosting RTMP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalEndpoint {
    port: u16,
}

impl LocalEndpoint {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `rtmp://127.0.0.1:<port>/<app>/<name>`
    pub fn url(&self, path: &StreamPath) -> String {
        format!("rtmp://127.0.0.1:{}{}", self.port, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_endpoint_url() {
        let endpoint = LocalEndpoint::new(1935);
        let path = StreamPath::parse("/live/cam1").unwrap();
        assert_eq!(endpoint.url(&path), "rtmp://127.0.0.1:1935/live/cam1");
    }
}
