//! Message authentication primitives
//!
//! Handshake tokens and telemetry MACs are both HMAC-SHA256 over the exact
//! bytes of the signed material, transported as lowercase hex.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 of `data` under `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Compute HMAC-SHA256 of `data` under `key`, as lowercase hex.
pub fn hmac_sha256_hex(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Decode a hex-encoded key into raw bytes.
///
/// Returns `None` for a blank string, an odd-length string, or any
/// non-hex character. Upper- and lowercase digits are both accepted.
pub fn decode_hex_key(hex: &str) -> Option<Vec<u8>> {
    if hex.trim().is_empty() {
        return None;
    }
    hex::decode(hex).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_sha256_known_vector() {
        // RFC 4231 test case 2
        let mac = hmac_sha256_hex(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            mac,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_hmac_sha256_is_deterministic() {
        let m1 = hmac_sha256(b"key", b"same input");
        let m2 = hmac_sha256(b"key", b"same input");
        assert_eq!(m1, m2);
    }

    #[test]
    fn test_hmac_sha256_key_matters() {
        let m1 = hmac_sha256(b"key1", b"input");
        let m2 = hmac_sha256(b"key2", b"input");
        assert_ne!(m1, m2);
    }

    #[test]
    fn test_hmac_sha256_hex_shape() {
        let mac = hmac_sha256_hex(b"key", b"data");
        assert_eq!(mac.len(), 64);
        assert!(mac.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn test_decode_hex_key() {
        assert_eq!(decode_hex_key("00ff7f"), Some(vec![0x00, 0xFF, 0x7F]));
        assert_eq!(decode_hex_key("00FF7F"), Some(vec![0x00, 0xFF, 0x7F]));
        assert_eq!(decode_hex_key("deadbeef"), Some(vec![0xDE, 0xAD, 0xBE, 0xEF]));
    }

    #[test]
    fn test_decode_hex_key_rejects_blank() {
        assert_eq!(decode_hex_key(""), None);
        assert_eq!(decode_hex_key("   "), None);
    }

    #[test]
    fn test_decode_hex_key_rejects_odd_length() {
        assert_eq!(decode_hex_key("abc"), None);
        assert_eq!(decode_hex_key("0"), None);
    }

    #[test]
    fn test_decode_hex_key_rejects_non_hex() {
        assert_eq!(decode_hex_key("zz"), None);
        assert_eq!(decode_hex_key("00gg"), None);
    }
}
