//! Handshake messages and line codec
//!
//! The gateway speaks newline-delimited JSON. The handshake is exactly three
//! messages:
//!
//! ```text
//! gateway -> client   {"type":"challenge","nonce":"..."}
//! client  -> gateway  {"type":"hello","version":1,"token":"...","capabilities":[...]}
//! gateway -> client   {"type":"hello_ack","accepted":true,"session_key":"..."}
//! ```
//!
//! The token is HMAC-SHA256 of the nonce under the shared secret's UTF-8
//! bytes. The PIN and the secret never cross the wire.

use crate::error::HandshakeError;
use crate::pairing::SharedSecret;
use crate::protocol::mac::{decode_hex_key, hmac_sha256_hex};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Protocol version announced in the hello message
pub const PROTOCOL_VERSION: u32 = 1;

/// Capabilities announced in the hello message
pub const CAPABILITIES: [&str; 4] = ["time", "gps", "battery", "socks5"];

/// Challenge sent by the gateway as the first message on the wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    /// Message type tag, expected to be `"challenge"`
    #[serde(rename = "type", default)]
    pub message_type: String,
    /// Nonce the client must sign
    #[serde(default)]
    pub nonce: String,
}

impl Challenge {
    /// Build a challenge carrying `nonce`.
    pub fn new(nonce: impl Into<String>) -> Self {
        Challenge {
            message_type: "challenge".to_string(),
            nonce: nonce.into(),
        }
    }

    /// Check type tag and nonce presence.
    pub fn validate(&self) -> Result<(), HandshakeError> {
        if self.message_type != "challenge" {
            return Err(HandshakeError::Protocol(format!(
                "unexpected first message type '{}'",
                self.message_type
            )));
        }
        if self.nonce.trim().is_empty() {
            return Err(HandshakeError::Protocol("challenge nonce missing".to_string()));
        }
        Ok(())
    }
}

/// Hello sent by the client in response to a challenge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    /// Message type tag, `"hello"`
    #[serde(rename = "type")]
    pub message_type: String,
    /// Protocol version
    pub version: u32,
    /// HMAC-SHA256 of the challenge nonce under the shared secret, hex
    pub token: String,
    /// Telemetry capabilities this client can provide
    pub capabilities: Vec<String>,
}

impl Hello {
    /// Build the hello answering `nonce`, signing it with `secret`.
    pub fn new(secret: &SharedSecret, nonce: &str) -> Self {
        Hello {
            message_type: "hello".to_string(),
            version: PROTOCOL_VERSION,
            token: hmac_sha256_hex(secret.as_bytes(), nonce.as_bytes()),
            capabilities: CAPABILITIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Gateway verdict on the hello
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloAck {
    /// Message type tag; an absent tag is tolerated
    #[serde(rename = "type", default)]
    pub message_type: String,
    /// Whether the token was accepted
    #[serde(default)]
    pub accepted: bool,
    /// Hex-encoded session key for telemetry MACs
    #[serde(default)]
    pub session_key: String,
}

impl HelloAck {
    /// Validate the ack and decode the session key.
    ///
    /// A missing type tag passes; a present tag must be `"hello_ack"`.
    /// `accepted: false` is the non-retriable rejection class.
    pub fn validate(&self) -> Result<Vec<u8>, HandshakeError> {
        if !self.message_type.is_empty() && self.message_type != "hello_ack" {
            return Err(HandshakeError::Protocol(format!(
                "unexpected ack type '{}'",
                self.message_type
            )));
        }
        if !self.accepted {
            return Err(HandshakeError::Rejected);
        }
        decode_hex_key(&self.session_key).ok_or_else(|| {
            HandshakeError::Protocol("ack carried no usable session key".to_string())
        })
    }
}

/// Read one newline-delimited JSON message.
///
/// `label` names the expected message in failure reasons. A closed socket
/// and read errors are transport failures; bytes that do not decode as the
/// expected JSON shape are protocol violations.
pub async fn read_message<R, T>(reader: &mut R, label: &str) -> Result<T, HandshakeError>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut raw = Vec::new();
    let n = reader
        .read_until(b'\n', &mut raw)
        .await
        .map_err(|e| HandshakeError::Transport(format!("reading {}: {}", label, e)))?;

    if n == 0 {
        return Err(HandshakeError::Transport(format!(
            "no {} received (socket closed by peer)",
            label
        )));
    }

    while matches!(raw.last(), Some(b'\n') | Some(b'\r')) {
        raw.pop();
    }

    serde_json::from_slice(&raw).map_err(|e| {
        HandshakeError::Protocol(format!("{} payload was not valid JSON: {}", label, e))
    })
}

/// Write one message as a JSON line and flush it.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), HandshakeError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)
        .map_err(|e| HandshakeError::Protocol(format!("encoding message: {}", e)))?;
    line.push(b'\n');

    writer
        .write_all(&line)
        .await
        .map_err(|e| HandshakeError::Transport(format!("writing message: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| HandshakeError::Transport(format!("flushing message: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mac::hmac_sha256_hex;
    use std::io::Cursor;

    fn test_secret() -> SharedSecret {
        SharedSecret::new("2f51a1c8deadbeef2f51a1c8deadbeef")
    }

    #[test]
    fn test_hello_token_is_hmac_of_nonce() {
        let secret = test_secret();
        let hello = Hello::new(&secret, "abc123");

        assert_eq!(
            hello.token,
            hmac_sha256_hex(secret.as_bytes(), b"abc123")
        );
        assert_eq!(hello.version, PROTOCOL_VERSION);
        assert_eq!(hello.capabilities, ["time", "gps", "battery", "socks5"]);
    }

    #[test]
    fn test_hello_wire_order() {
        let hello = Hello::new(&test_secret(), "abc123");
        let json = serde_json::to_string(&hello).unwrap();

        assert!(json.starts_with(r#"{"type":"hello","version":1,"token":""#));
        assert!(json.ends_with(r#""capabilities":["time","gps","battery","socks5"]}"#));
    }

    #[test]
    fn test_challenge_validate() {
        assert!(Challenge::new("abc123").validate().is_ok());

        let wrong_type = Challenge {
            message_type: "status".to_string(),
            nonce: "abc123".to_string(),
        };
        assert!(matches!(
            wrong_type.validate(),
            Err(HandshakeError::Protocol(_))
        ));

        let blank_nonce = Challenge::new("   ");
        assert!(matches!(
            blank_nonce.validate(),
            Err(HandshakeError::Protocol(_))
        ));
    }

    #[test]
    fn test_hello_ack_validate_accepted() {
        let ack = HelloAck {
            message_type: "hello_ack".to_string(),
            accepted: true,
            session_key: "00ff7f".to_string(),
        };
        assert_eq!(ack.validate().unwrap(), vec![0x00, 0xFF, 0x7F]);
    }

    #[test]
    fn test_hello_ack_validate_tolerates_missing_type() {
        let ack = HelloAck {
            message_type: String::new(),
            accepted: true,
            session_key: "deadbeef".to_string(),
        };
        assert!(ack.validate().is_ok());
    }

    #[test]
    fn test_hello_ack_validate_wrong_type() {
        let ack = HelloAck {
            message_type: "status".to_string(),
            accepted: true,
            session_key: "deadbeef".to_string(),
        };
        assert!(matches!(ack.validate(), Err(HandshakeError::Protocol(_))));
    }

    #[test]
    fn test_hello_ack_validate_rejected() {
        let ack = HelloAck {
            message_type: "hello_ack".to_string(),
            accepted: false,
            session_key: "deadbeef".to_string(),
        };
        let err = ack.validate().unwrap_err();
        assert!(err.is_rejection());
    }

    #[test]
    fn test_hello_ack_validate_bad_session_key() {
        for key in ["", "   ", "xyz", "abc"] {
            let ack = HelloAck {
                message_type: "hello_ack".to_string(),
                accepted: true,
                session_key: key.to_string(),
            };
            assert!(matches!(ack.validate(), Err(HandshakeError::Protocol(_))));
        }
    }

    #[tokio::test]
    async fn test_read_message_challenge() {
        let mut cursor = Cursor::new(&b"{\"type\":\"challenge\",\"nonce\":\"abc123\"}\n"[..]);
        let challenge: Challenge = read_message(&mut cursor, "challenge").await.unwrap();

        assert_eq!(challenge.message_type, "challenge");
        assert_eq!(challenge.nonce, "abc123");
    }

    #[tokio::test]
    async fn test_read_message_tolerates_crlf() {
        let mut cursor = Cursor::new(&b"{\"type\":\"challenge\",\"nonce\":\"abc123\"}\r\n"[..]);
        let challenge: Challenge = read_message(&mut cursor, "challenge").await.unwrap();
        assert_eq!(challenge.nonce, "abc123");
    }

    #[tokio::test]
    async fn test_read_message_invalid_json() {
        let mut cursor = Cursor::new(&b"this is not json\n"[..]);
        let result: Result<Challenge, _> = read_message(&mut cursor, "challenge").await;
        assert!(matches!(result, Err(HandshakeError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_read_message_eof() {
        let mut cursor = Cursor::new(&b""[..]);
        let result: Result<Challenge, _> = read_message(&mut cursor, "challenge").await;

        let err = result.unwrap_err();
        assert!(matches!(err, HandshakeError::Transport(_)));
        assert!(err.to_string().contains("socket closed"));
    }

    #[tokio::test]
    async fn test_write_then_read_round_trip() {
        let (mut client, server) = tokio::io::duplex(1024);
        let mut server = tokio::io::BufReader::new(server);

        let hello = Hello::new(&test_secret(), "abc123");
        write_message(&mut client, &hello).await.unwrap();

        let received: Hello = read_message(&mut server, "hello").await.unwrap();
        assert_eq!(received.token, hello.token);
        assert_eq!(received.capabilities, hello.capabilities);
    }
}
