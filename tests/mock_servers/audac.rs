#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Mock AUDAC MTX for testing
//!
//! Simulates the pipe-delimited control protocol. Replies swap source and
//! destination ids like the real unit, answers `GZI` with the zone payload and
//! records every frame it receives.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Zone as stored by the mock device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockZone {
    pub volume: u8,
    pub source: u8,
    pub mute: bool,
    pub bass: u8,
    pub treble: u8,
}

impl Default for MockZone {
    fn default() -> Self {
        Self {
            volume: 35,
            source: 3,
            mute: false,
            bass: 7,
            treble: 7,
        }
    }
}

#[derive(Debug, Default)]
pub struct MockMatrixState {
    pub zones: HashMap<u8, MockZone>,
    /// Every frame received, CR LF included
    pub received: Vec<String>,
    /// Read frames but never answer
    pub silent: bool,
    /// Drop the connection instead of answering
    pub hang_up: bool,
    /// Answer every frame with this line instead
    pub reply_override: Option<String>,
    pub response_delay: Duration,
    /// Frames that arrived while a reply was still outstanding
    pub pipelined: usize,
    pub connections: usize,
}

/// Mock MTX server
pub struct MockMatrixServer {
    addr: SocketAddr,
    state: Arc<RwLock<MockMatrixState>>,
    handle: JoinHandle<()>,
    connections: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl MockMatrixServer {
    /// Start a mock MTX on a random port
    pub async fn start() -> Self {
        Self::start_on("127.0.0.1:0".parse().unwrap()).await
    }

    pub async fn start_on(addr: SocketAddr) -> Self {
        let state = Arc::new(RwLock::new(MockMatrixState::default()));
        let connections = Arc::new(Mutex::new(Vec::new()));
        let listener = TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let state_clone = state.clone();
        let connections_clone = connections.clone();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                state_clone.write().await.connections += 1;
                let state = state_clone.clone();
                let conn = tokio::spawn(async move {
                    handle_connection(stream, state).await;
                });
                connections_clone.lock().await.push(conn);
            }
        });

        Self {
            addr,
            state,
            handle,
            connections,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn set_zone(&self, zone: u8, value: MockZone) {
        self.state.write().await.zones.insert(zone, value);
    }

    pub async fn zone(&self, zone: u8) -> MockZone {
        self.state
            .read()
            .await
            .zones
            .get(&zone)
            .copied()
            .unwrap_or_default()
    }

    pub async fn received(&self) -> Vec<String> {
        self.state.read().await.received.clone()
    }

    pub async fn set_silent(&self, silent: bool) {
        self.state.write().await.silent = silent;
    }

    pub async fn set_hang_up(&self, hang_up: bool) {
        self.state.write().await.hang_up = hang_up;
    }

    pub async fn set_reply_override(&self, reply: Option<&str>) {
        self.state.write().await.reply_override = reply.map(str::to_string);
    }

    pub async fn set_response_delay(&self, delay: Duration) {
        self.state.write().await.response_delay = delay;
    }

    pub async fn pipelined_frames(&self) -> usize {
        self.state.read().await.pipelined
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections
    }

    /// Stop the mock server and drop every open connection
    pub async fn stop(self) {
        self.handle.abort();
        for conn in self.connections.lock().await.drain(..) {
            conn.abort();
        }
    }
}

/// Handle a single TCP connection
async fn handle_connection(stream: TcpStream, state: Arc<RwLock<MockMatrixState>>) {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut raw = Vec::new();

    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break, // Connection closed
            Ok(_) => {
                let frame = String::from_utf8_lossy(&raw).to_string();
                let (silent, hang_up, delay) = {
                    let mut state = state.write().await;
                    state.received.push(frame.clone());
                    (state.silent, state.hang_up, state.response_delay)
                };
                if hang_up {
                    break;
                }
                if silent {
                    continue;
                }

                tokio::time::sleep(delay).await;
                let pipelined = matches!(
                    timeout(Duration::from_millis(2), reader.fill_buf()).await,
                    Ok(Ok(buf)) if !buf.is_empty()
                );
                if pipelined {
                    state.write().await.pipelined += 1;
                }

                let response = process_command(&frame, &state).await;
                if writer.write_all(response.as_bytes()).await.is_err() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
}

fn zone_of(command: &str, prefix: &str) -> Option<u8> {
    command.strip_prefix(prefix)?.parse().ok()
}

/// Apply a command and build the reply line
async fn process_command(frame: &str, state: &Arc<RwLock<MockMatrixState>>) -> String {
    let mut state = state.write().await;
    if let Some(reply) = &state.reply_override {
        return format!("{}\r\n", reply);
    }

    let fields: Vec<&str> = frame.trim_end().split('|').collect();
    let (dest, src, command, arg) = match fields.as_slice() {
        ["#", dest, src, command, arg, "U", ""] => (*dest, *src, *command, *arg),
        _ => return "#|??|X001|ERR|U|\r\n".to_string(),
    };

    if let Some(zone) = zone_of(command, "GZI") {
        let z = state.zones.get(&zone).copied().unwrap_or_default();
        return format!(
            "#|{}|{}|ZI{:02}|{}^{}^{}^{:02}^{:02}|U|\r\n",
            src, dest, zone, z.volume, z.source, z.mute as u8, z.bass, z.treble
        );
    }

    let value: u8 = arg.parse().unwrap_or(0);
    if let Some(zone) = zone_of(command, "SV") {
        state.zones.entry(zone).or_default().volume = value;
    } else if let Some(zone) = zone_of(command, "SM") {
        state.zones.entry(zone).or_default().mute = value == 1;
    } else if let Some(zone) = zone_of(command, "SR") {
        state.zones.entry(zone).or_default().source = value;
    } else {
        return format!("#|{}|{}|ERR|U|\r\n", src, dest);
    }

    format!("#|{}|{}|{}|{}|U|\r\n", src, dest, command, arg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_matrix_starts_and_stops() {
        let server = MockMatrixServer::start().await;
        assert!(server.addr().port() > 0);
        server.stop().await;
    }

    #[tokio::test]
    async fn mock_matrix_answers_zone_info() {
        let server = MockMatrixServer::start().await;
        server
            .set_zone(
                2,
                MockZone {
                    volume: 20,
                    source: 1,
                    mute: true,
                    bass: 3,
                    treble: 11,
                },
            )
            .await;

        let stream = TcpStream::connect(server.addr()).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        writer.write_all(b"#|X001|HA|GZI02|0|U|\r\n").await.unwrap();

        let mut line = String::new();
        BufReader::new(reader).read_line(&mut line).await.unwrap();
        assert_eq!(line, "#|HA|X001|ZI02|20^1^1^03^11|U|\r\n");

        server.stop().await;
    }
}
