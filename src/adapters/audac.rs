//! AUDAC MTX matrix client
//!
//! Speaks the pipe-delimited TCP control protocol (default port 5001). The
//! protocol carries no request ids, so exactly one command may be on the wire
//! at a time: the connection lives behind a mutex that is held for the whole
//! write-then-read-one-line exchange.

use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::MatrixSettings;
use crate::error::{ConnectionError, MatrixError, Result};
use crate::protocol::{self, Command, ZoneState};

/// Open socket to the device
struct MatrixConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    /// Set while a frame is written but its reply not yet read. A connection
    /// found in this state was abandoned mid-exchange and must not be reused.
    in_flight: bool,
}

impl MatrixConnection {
    async fn open(addr: &str, after: Duration) -> std::result::Result<Self, ConnectionError> {
        let stream = timeout(after, TcpStream::connect(addr))
            .await
            .map_err(|_| ConnectionError::Timeout {
                addr: addr.to_string(),
                after,
            })?
            .map_err(|source| ConnectionError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            in_flight: false,
        })
    }

    /// Write one frame and read exactly one CR LF terminated reply
    async fn round_trip(&mut self, frame: &str) -> std::result::Result<String, ConnectionError> {
        self.in_flight = true;

        debug!("TX: {}", frame.trim_end());
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.flush().await?;

        let mut raw = Vec::new();
        (&mut self.reader)
            .take(protocol::MAX_REPLY_LEN as u64)
            .read_until(b'\n', &mut raw)
            .await?;
        if !raw.ends_with(b"\n") {
            if raw.len() >= protocol::MAX_REPLY_LEN {
                return Err(ConnectionError::ReplyTooLong {
                    limit: protocol::MAX_REPLY_LEN,
                });
            }
            // EOF, possibly after a partial line
            return Err(ConnectionError::Closed);
        }

        let line = protocol::decode_line(&raw);
        debug!("RX: {}", line);

        self.in_flight = false;
        Ok(line)
    }

    async fn shutdown(mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("Close error: {}", e);
        }
    }
}

/// Client for one AUDAC MTX unit.
///
/// Share it behind an `Arc`; concurrent callers are serialized per exchange.
pub struct AudacClient {
    settings: MatrixSettings,
    connection: Mutex<Option<MatrixConnection>>,
}

impl AudacClient {
    pub fn new(settings: MatrixSettings) -> Self {
        Self {
            settings,
            connection: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &MatrixSettings {
        &self.settings
    }

    pub fn zones(&self) -> u8 {
        self.settings.zones
    }

    pub async fn is_connected(&self) -> bool {
        self.connection
            .lock()
            .await
            .as_ref()
            .is_some_and(|conn| !conn.in_flight)
    }

    /// Open the connection, replacing any existing one.
    pub async fn connect(&self) -> Result<()> {
        let mut guard = self.connection.lock().await;
        if let Some(old) = guard.take() {
            debug!("Replacing existing connection to {}", self.settings.addr());
            old.shutdown().await;
        }
        *guard = Some(self.open().await?);
        Ok(())
    }

    /// Shut the connection down. Errors are logged, never returned.
    pub async fn close(&self) {
        let conn = self.connection.lock().await.take();
        if let Some(conn) = conn {
            info!("Closing connection to AUDAC MTX at {}", self.settings.addr());
            conn.shutdown().await;
        }
    }

    /// Set zone volume from a 0..100 percentage (clamped). Returns the raw reply.
    pub async fn set_volume(&self, zone: u8, percent: i32) -> Result<String> {
        self.exchange(Command::set_volume(zone, percent)).await
    }

    pub async fn set_mute(&self, zone: u8, muted: bool) -> Result<String> {
        self.exchange(Command::set_mute(zone, muted)).await
    }

    /// Route an input to the zone. 0 selects no source; values above 8 clamp to 8.
    pub async fn set_source(&self, zone: u8, source: i32) -> Result<String> {
        self.exchange(Command::set_source(zone, source)).await
    }

    /// Route an input by its front-panel label. Unknown labels send nothing.
    pub async fn set_source_by_label(&self, zone: u8, label: &str) -> Result<Option<String>> {
        let Some(index) = protocol::source_index(label) else {
            warn!("Unknown source {}", label);
            return Ok(None);
        };
        self.set_source(zone, index as i32).await.map(Some)
    }

    /// Query zone state. A malformed reply yields `Ok(None)`, not an error.
    pub async fn get_zone_info(&self, zone: u8) -> Result<Option<ZoneState>> {
        let reply = self.exchange(Command::get_zone_info(zone)).await?;
        let state = protocol::parse_zone_info(&reply);
        if state.is_none() {
            debug!("Ignoring unparseable zone {} info: {}", zone, reply);
        }
        Ok(state)
    }

    async fn open(&self) -> std::result::Result<MatrixConnection, ConnectionError> {
        let addr = self.settings.addr();
        info!("Connecting to AUDAC MTX at {}", addr);
        MatrixConnection::open(&addr, self.settings.timeout()).await
    }

    fn check_zone(&self, zone: u8) -> Result<()> {
        if zone == 0 || zone > self.settings.zones {
            return Err(MatrixError::InvalidZone {
                zone,
                zones: self.settings.zones,
            });
        }
        Ok(())
    }

    /// Send one command and wait for its reply, holding the session lock
    /// across connect, write and read.
    async fn exchange(&self, command: Command) -> Result<String> {
        self.check_zone(command.zone())?;
        let frame = command.encode(&self.settings.device_id, &self.settings.source_id);

        let mut guard = self.connection.lock().await;

        if guard.as_ref().is_some_and(|conn| conn.in_flight) {
            warn!("Discarding connection abandoned mid-exchange");
            *guard = None;
        }
        if guard.is_none() {
            *guard = Some(self.open().await?);
        }
        let conn = guard.as_mut().ok_or(ConnectionError::Closed)?;

        let after = self.settings.timeout();
        match timeout(after, conn.round_trip(&frame)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => {
                warn!("Exchange with {} failed: {}", self.settings.addr(), e);
                *guard = None;
                Err(e.into())
            }
            Err(_) => {
                // Reply may still arrive later; the stream position is unknown
                *guard = None;
                Err(ConnectionError::Timeout {
                    addr: self.settings.addr(),
                    after,
                }
                .into())
            }
        }
    }
}
