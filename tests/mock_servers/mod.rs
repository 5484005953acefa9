//! Mock servers for integration testing
//!
//! Simulates an AUDAC MTX unit so the client can be exercised end to end
//! without real hardware.

pub mod audac;

pub use audac::{MockMatrixServer, MockZone};
