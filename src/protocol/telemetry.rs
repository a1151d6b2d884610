//! Telemetry status messages
//!
//! After the handshake the client pushes `status` messages, each signed with
//! HMAC-SHA256 under the session key. The MAC is computed over the exact
//! serialized bytes of the message without its `mac` field, so field order
//! is part of the contract: insertion order is preserved end to end and
//! `mac` is always appended last.

use crate::protocol::mac::hmac_sha256_hex;
use serde_json::{json, Value};

/// GPS fields of a status report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsFix {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Horizontal accuracy in meters
    pub accuracy: f64,
    /// Speed in meters per second
    pub speed: f64,
    /// Bearing in degrees
    pub bearing: f64,
    /// Age of the fix in milliseconds, -1 when there is no fix
    pub age_ms: i64,
}

impl Default for GpsFix {
    fn default() -> Self {
        GpsFix {
            lat: 0.0,
            lon: 0.0,
            accuracy: 0.0,
            speed: 0.0,
            bearing: 0.0,
            age_ms: -1,
        }
    }
}

/// Battery fields of a status report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryState {
    /// Charge level in percent, -1 when unknown
    pub level: i32,
    /// Whether the device is charging
    pub charging: bool,
}

impl Default for BatteryState {
    fn default() -> Self {
        BatteryState {
            level: -1,
            charging: false,
        }
    }
}

/// Relay fields of a status report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayStatus {
    /// Port the SOCKS5 relay listens on
    pub port: u16,
    /// Whether the relay is accepting connections
    pub active: bool,
}

/// One sampled telemetry snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    /// Wall-clock time in milliseconds since the Unix epoch
    pub time_ms: i64,
    /// IANA timezone identifier
    pub timezone: String,
    /// GPS fix
    pub gps: GpsFix,
    /// Battery state
    pub battery: BatteryState,
    /// Relay state
    pub relay: RelayStatus,
}

/// Build a signed status message.
///
/// Serializes the fields in wire order, computes the MAC over that exact
/// serialization under `session_key`, and appends it as the final `mac`
/// field.
pub fn build_status(
    seq: u64,
    sent_mono_ms: u64,
    session_key: &[u8],
    report: &StatusReport,
) -> Value {
    let mut message = json!({
        "type": "status",
        "seq": seq,
        "sent_mono_ms": sent_mono_ms,
        "time_ms": report.time_ms,
        "timezone": report.timezone,
        "gps": {
            "lat": report.gps.lat,
            "lon": report.gps.lon,
            "accuracy": report.gps.accuracy,
            "speed": report.gps.speed,
            "bearing": report.gps.bearing,
            "age_ms": report.gps.age_ms,
        },
        "battery": {
            "level": report.battery.level,
            "charging": report.battery.charging,
        },
        "socks5": {
            "port": report.relay.port,
            "active": report.relay.active,
        },
    });

    let mac = hmac_sha256_hex(session_key, message.to_string().as_bytes());
    if let Some(fields) = message.as_object_mut() {
        fields.insert("mac".to_string(), Value::String(mac));
    }
    message
}

/// Verify the MAC on a received message.
///
/// Strips the `mac` field without disturbing the order of the remaining
/// fields, re-serializes, and compares the recomputed MAC against the
/// received one. Any message without a string `mac` field fails.
pub fn verify_mac(message: &Value, session_key: &[u8]) -> bool {
    let Some(fields) = message.as_object() else {
        return false;
    };
    let Some(mac) = fields.get("mac").and_then(Value::as_str) else {
        return false;
    };

    let mut unsigned = fields.clone();
    unsigned.shift_remove("mac");
    let expected = hmac_sha256_hex(session_key, Value::Object(unsigned).to_string().as_bytes());

    mac == expected
}
