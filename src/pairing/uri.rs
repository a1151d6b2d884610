//! Pairing descriptor decoding
//!
//! Head units present a QR code containing a pairing URI of the form
//! `openauto://pair?ssid=CarAP&pin=123456&host=10.0.0.1&port=8080`. The
//! decoder turns that string into a [`PairingPayload`], or `None` for
//! anything that is not a well-formed pairing descriptor; foreign QR codes
//! are ignored, never treated as errors.

use std::collections::HashMap;
use url::Url;

/// URI scheme a pairing descriptor must carry
pub const PAIRING_SCHEME: &str = "openauto";

/// Host token a pairing descriptor must carry
pub const PAIRING_HOST: &str = "pair";

/// Management URL used when the descriptor names no usable endpoint
pub const FALLBACK_MANAGEMENT_URL: &str = "http://10.0.0.1:8080";

/// Decoded pairing descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingPayload {
    /// Network name of the vehicle's access point
    pub ssid: String,
    /// One-time pairing PIN, exactly six ASCII digits
    pub pin: String,
    /// Optional device identifier announced by the head unit
    pub device_id: Option<String>,
    /// Optional management endpoint host
    pub host: Option<String>,
    /// Optional management endpoint port
    pub port: Option<u16>,
}

impl PairingPayload {
    /// Decode a pairing descriptor.
    ///
    /// Returns `None` when the string is not a pairing URI (wrong scheme or
    /// host token, no query), when `pin` is not exactly six decimal digits,
    /// when `ssid` is missing or blank, or when a present `port` does not
    /// parse into 1..=65535. A bad port rejects the whole payload rather
    /// than silently dropping the field.
    pub fn parse(raw: &str) -> Option<Self> {
        let url = Url::parse(raw).ok()?;

        if url.scheme() != PAIRING_SCHEME || url.host_str() != Some(PAIRING_HOST) {
            return None;
        }

        url.query()?;

        // Percent- and plus-decoded; duplicate keys keep the last occurrence.
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

        let pin = params.get("pin")?.trim();
        if !is_six_digits(pin) {
            return None;
        }

        let ssid = params.get("ssid")?.trim();
        if ssid.is_empty() {
            return None;
        }

        let host = params
            .get("host")
            .map(|h| h.trim())
            .filter(|h| !h.is_empty())
            .map(str::to_string);

        let device_id = params
            .get("id")
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let port = match params.get("port").map(|p| p.trim()) {
            None | Some("") => None,
            Some(raw_port) => {
                let port = raw_port
                    .parse::<u32>()
                    .ok()
                    .filter(|p| (1..=65535).contains(p))?;
                Some(port as u16)
            }
        };

        Some(PairingPayload {
            ssid: ssid.to_string(),
            pin: pin.to_string(),
            device_id,
            host,
            port,
        })
    }

    /// Management URL for the head unit this payload was scanned from.
    pub fn management_url(&self) -> String {
        management_url(self.host.as_deref(), self.port)
    }
}

/// Build the head unit's management URL from an optional host and port.
///
/// Falls back to [`FALLBACK_MANAGEMENT_URL`] when the host is blank or the
/// port is missing.
pub fn management_url(host: Option<&str>, port: Option<u16>) -> String {
    let host = host.map(str::trim).unwrap_or("");
    match (host.is_empty(), port) {
        (false, Some(port)) => format!("http://{}:{}", host, port),
        _ => FALLBACK_MANAGEMENT_URL.to_string(),
    }
}

fn is_six_digits(pin: &str) -> bool {
    pin.len() == 6 && pin.bytes().all(|b| b.is_ascii_digit())
}
