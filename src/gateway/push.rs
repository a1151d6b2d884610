//! Periodic telemetry sampling
//!
//! Telemetry values come from [`Clock`] and [`TelemetrySource`]
//! collaborators so the push path can be driven deterministically in tests
//! and adapted to whatever instrumentation the host platform has.

use crate::error::CompanionError;
use crate::gateway::session::GatewaySession;
use crate::protocol::{BatteryState, GpsFix, RelayStatus, StatusReport};
use std::fmt;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Time source for status messages
pub trait Clock: fmt::Debug + Send + Sync {
    /// Wall-clock time in milliseconds since the Unix epoch.
    fn wall_clock_ms(&self) -> i64;

    /// Monotonic time in milliseconds; only differences are meaningful.
    fn monotonic_ms(&self) -> u64;

    /// IANA timezone identifier.
    fn timezone(&self) -> String;
}

/// Clock backed by the operating system
///
/// Monotonic time counts from clock creation. The timezone comes from the
/// `TZ` environment variable, falling back to `UTC`.
#[derive(Debug, Clone)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    /// Create a system clock; monotonic time starts at zero.
    pub fn new() -> Self {
        SystemClock {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock::new()
    }
}

impl Clock for SystemClock {
    fn wall_clock_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn monotonic_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    fn timezone(&self) -> String {
        std::env::var("TZ").unwrap_or_else(|_| "UTC".to_string())
    }
}

/// Source of GPS and battery readings
///
/// The defaults report the no-fix and unknown-battery markers, matching
/// hosts without that instrumentation.
pub trait TelemetrySource: fmt::Debug + Send + Sync {
    /// Latest GPS fix.
    fn gps(&self) -> GpsFix {
        GpsFix::default()
    }

    /// Battery state.
    fn battery(&self) -> BatteryState {
        BatteryState::default()
    }
}

/// Source for hosts without GPS or battery instrumentation
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTelemetry;

impl TelemetrySource for NoTelemetry {}

/// Sample one status report from the collaborators.
pub fn sample_report(
    clock: &dyn Clock,
    telemetry: &dyn TelemetrySource,
    relay: RelayStatus,
) -> StatusReport {
    StatusReport {
        time_ms: clock.wall_clock_ms(),
        timezone: clock.timezone(),
        gps: telemetry.gps(),
        battery: telemetry.battery(),
        relay,
    }
}

/// Sample and send one status message; returns the sequence number used.
pub async fn push_status(
    session: &mut GatewaySession,
    clock: &dyn Clock,
    telemetry: &dyn TelemetrySource,
    relay: RelayStatus,
) -> Result<u64, CompanionError> {
    let report = sample_report(clock, telemetry, relay);
    session.send_status(clock.monotonic_ms(), &report).await
}
