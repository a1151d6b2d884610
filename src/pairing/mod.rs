//! Pairing module for the companion client
//!
//! Covers everything that happens before the first gateway connection:
//! decoding the pairing descriptor shown by the head unit, deriving the
//! shared secret from its PIN, and keeping records of paired vehicles.

mod secret;
mod uri;
mod vehicle;

pub use secret::{derive_secret, SharedSecret, RELAY_USERNAME};
pub use uri::{
    management_url, PairingPayload, FALLBACK_MANAGEMENT_URL, PAIRING_HOST, PAIRING_SCHEME,
};
pub use vehicle::{random_vehicle_id, resolve_identity, Vehicle, VehicleRegistry, MAX_VEHICLES};
