//! # OpenAuto Companion - Head Unit Companion Client
//!
//! OpenAuto Companion is the phone-side client for an OpenAuto head unit.
//! It decodes pairing payloads scanned from the head unit, authenticates
//! against the head unit's gateway with a challenge/response handshake,
//! pushes HMAC-signed telemetry, and exposes an authenticated SOCKS5 relay
//! that gives the head unit an internet path through the phone.
//!
//! ## Features
//!
//! - **Pairing Decoder**: Parses `openauto://pair?...` payloads and derives
//!   the shared secret from the 6-digit PIN
//! - **Gateway Handshake**: Challenge/response over newline-delimited JSON,
//!   yielding a per-session signing key
//! - **Signed Telemetry**: Status messages carry an HMAC-SHA256 MAC over
//!   their exact serialized bytes
//! - **SOCKS5 Relay**: RFC 1928/1929 server with fixed credentials, failure
//!   lockout, and a public-destinations-only filter
//!
//! ## Usage
//!
//! ```rust,ignore
//! use openauto_companion::config::load_config;
//! use openauto_companion::companion::run_companion;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("companion.toml")?;
//!     let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     run_companion(config, shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! The companion holds one long-lived session to the gateway for handshake
//! and telemetry, reconnecting with backoff when it drops. Independently,
//! the relay accepts SOCKS5 clients from the vehicle network and tunnels
//! them to public destinations.
//!
//! ```text
//! Head Unit Gateway <- handshake/telemetry - Companion - SOCKS5 relay <- Head Unit
//!                                                |
//!                                                +-> public internet
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod companion;
pub mod config;
pub mod error;
pub mod gateway;
pub mod helper;
pub mod net;
pub mod pairing;
pub mod protocol;
pub mod relay;

// Re-export commonly used items
pub use companion::{run_companion, Companion, CompanionStatus};
pub use config::{load_config, Config};
pub use error::{CompanionError, HandshakeError};
pub use pairing::{derive_secret, PairingPayload, SharedSecret};

/// Version of the companion library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "openauto-companion");
    }
}
