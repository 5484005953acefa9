//! AUDAC MTX Bridge
//!
//! Control client for AUDAC MTX audio matrix mixers over their TCP control
//! protocol.
//!
//! This library provides:
//! - Frame encoding and zone-info decoding (`protocol`)
//! - A single-connection client that serializes every exchange (`adapters::audac`)
//! - A zone poller that publishes state changes on an event bus
//! - Layered configuration (file + environment)

pub mod adapters;
pub mod bus;
pub mod config;
pub mod error;
pub mod protocol;

pub use adapters::{AudacClient, ZonePoller};
pub use error::{ConnectionError, MatrixError};
pub use protocol::ZoneState;
