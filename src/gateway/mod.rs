//! Gateway link for the companion client
//!
//! Connects to the head unit's gateway, authenticates with the shared
//! secret, and pushes signed telemetry on a fixed cadence.

mod push;
mod session;

pub use push::{push_status, sample_report, Clock, NoTelemetry, SystemClock, TelemetrySource};
pub use session::GatewaySession;
