//! Shared-secret derivation
//!
//! The pairing PIN never crosses the wire. Both sides derive the same shared
//! secret from it, and everything downstream (handshake tokens, telemetry
//! MACs, relay credentials) is keyed off that secret.

use sha2::{Digest as Sha2Digest, Sha256};
use std::fmt;

/// Protocol version tag mixed into the secret derivation
const SECRET_VERSION_TAG: &str = ":openauto-companion-v1";

/// Fixed username for the SOCKS5 relay
pub const RELAY_USERNAME: &str = "oap";

/// Number of leading secret characters used as the relay password
const RELAY_PASSWORD_LEN: usize = 8;

/// Derive the shared secret from a pairing PIN.
///
/// Computes `SHA-256(pin + version tag)` and returns it as lowercase hex.
/// Deterministic: the same PIN always yields the same secret.
pub fn derive_secret(pin: &str) -> String {
    let digest = Sha256::new()
        .chain_update(pin.as_bytes())
        .chain_update(SECRET_VERSION_TAG.as_bytes())
        .finalize();
    hex::encode(digest)
}

/// Shared secret established during pairing.
///
/// Wraps the derived hex string so call sites take key material explicitly
/// instead of passing bare strings around. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SharedSecret(String);

impl SharedSecret {
    /// Wrap an already-derived secret (e.g., loaded from configuration).
    pub fn new(secret: impl Into<String>) -> Self {
        SharedSecret(secret.into())
    }

    /// Derive a secret from a pairing PIN.
    pub fn from_pin(pin: &str) -> Self {
        SharedSecret(derive_secret(pin))
    }

    /// The secret as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// HMAC key material.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Relay password: the first eight characters of the secret, or the
    /// whole secret when it is shorter than that.
    pub fn relay_password(&self) -> &str {
        match self.0.char_indices().nth(RELAY_PASSWORD_LEN) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(****)")
    }
}
