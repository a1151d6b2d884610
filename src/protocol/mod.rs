//! Wire protocol for the companion gateway link
//!
//! This module implements the newline-delimited JSON protocol spoken with
//! the head unit's gateway: the challenge/response handshake and the signed
//! telemetry status messages. It must stay byte-compatible with the gateway
//! implementation, including field order of signed messages.

mod handshake;
mod mac;
mod telemetry;

pub use handshake::{
    read_message, write_message, Challenge, Hello, HelloAck, CAPABILITIES, PROTOCOL_VERSION,
};
pub use mac::{decode_hex_key, hmac_sha256, hmac_sha256_hex};
pub use telemetry::{build_status, verify_mac, BatteryState, GpsFix, RelayStatus, StatusReport};
