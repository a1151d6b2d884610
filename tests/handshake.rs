//! End-to-end handshake and telemetry tests against a scripted gateway

mod common;

use common::{create_test_listener, stub_gateway};
use openauto_companion::config::CompanionConfig;
use openauto_companion::error::HandshakeError;
use openauto_companion::gateway::GatewaySession;
use openauto_companion::pairing::SharedSecret;
use openauto_companion::protocol::{
    hmac_sha256_hex, verify_mac, BatteryState, GpsFix, RelayStatus, StatusReport,
};
use serde_json::json;
use std::net::SocketAddr;

const SECRET: &str = "2f51a1c8deadbeef";

fn session_for(addr: SocketAddr) -> GatewaySession {
    let config = CompanionConfig {
        gateway_host: addr.ip().to_string(),
        gateway_port: addr.port(),
        connect_timeout: 2,
        read_timeout: 2,
        ..CompanionConfig::default()
    };
    GatewaySession::new(&config, SharedSecret::new(SECRET))
}

fn test_report() -> StatusReport {
    StatusReport {
        time_ms: 1_700_000_000_000,
        timezone: "Europe/Berlin".to_string(),
        gps: GpsFix {
            lat: 52.52,
            lon: 13.405,
            accuracy: 4.5,
            speed: 13.9,
            bearing: 271.0,
            age_ms: 120,
        },
        battery: BatteryState {
            level: 83,
            charging: true,
        },
        relay: RelayStatus {
            port: 1080,
            active: true,
        },
    }
}

#[tokio::test]
async fn test_handshake_success() {
    let (listener, addr) = create_test_listener().await;
    let gateway = stub_gateway::spawn(
        listener,
        json!({"type": "challenge", "nonce": "abc123"}),
        json!({"type": "hello_ack", "accepted": true, "session_key": "00ff7f"}),
        0,
    );

    let mut session = session_for(addr);
    session.connect().await.unwrap();

    assert!(session.is_connected());
    assert!(session.is_authenticated());
    assert_eq!(session.session_key(), Some(&[0x00u8, 0xFF, 0x7F][..]));
    assert!(session.last_failure().is_none());

    let (hello, _) = gateway.await.unwrap();
    assert_eq!(hello["type"], "hello");
    assert_eq!(hello["version"], 1);
    assert_eq!(
        hello["token"],
        hmac_sha256_hex(SECRET.as_bytes(), b"abc123").as_str()
    );
    let capabilities: Vec<&str> = hello["capabilities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(capabilities, ["time", "gps", "battery", "socks5"]);
}

#[tokio::test]
async fn test_handshake_rejected() {
    let (listener, addr) = create_test_listener().await;
    let gateway = stub_gateway::spawn(
        listener,
        json!({"type": "challenge", "nonce": "abc123"}),
        json!({"type": "hello_ack", "accepted": false}),
        0,
    );

    let mut session = session_for(addr);
    let err = session.connect().await.unwrap_err();

    assert!(err.is_rejection());
    assert!(!session.is_authenticated());
    assert!(session.last_failure().is_some());

    gateway.await.unwrap();
}

#[tokio::test]
async fn test_handshake_rejects_wrong_first_message() {
    let (listener, addr) = create_test_listener().await;
    let gateway = stub_gateway::spawn(
        listener,
        json!({"type": "welcome", "nonce": "abc123"}),
        json!({"type": "hello_ack", "accepted": true, "session_key": "00ff"}),
        0,
    );

    let mut session = session_for(addr);
    let err = session.connect().await.unwrap_err();

    assert!(matches!(err, HandshakeError::Protocol(_)));
    assert!(!session.is_authenticated());

    gateway.await.unwrap();
}

#[tokio::test]
async fn test_handshake_rejects_unusable_session_key() {
    let (listener, addr) = create_test_listener().await;
    let gateway = stub_gateway::spawn(
        listener,
        json!({"type": "challenge", "nonce": "abc123"}),
        json!({"type": "hello_ack", "accepted": true, "session_key": "zz"}),
        0,
    );

    let mut session = session_for(addr);
    let err = session.connect().await.unwrap_err();

    assert!(matches!(err, HandshakeError::Protocol(_)));
    assert!(!err.is_rejection());

    gateway.await.unwrap();
}

#[tokio::test]
async fn test_handshake_tolerates_missing_ack_type() {
    let (listener, addr) = create_test_listener().await;
    let gateway = stub_gateway::spawn(
        listener,
        json!({"type": "challenge", "nonce": "abc123"}),
        json!({"accepted": true, "session_key": "00ff"}),
        0,
    );

    let mut session = session_for(addr);
    session.connect().await.unwrap();

    assert!(session.is_authenticated());
    gateway.await.unwrap();
}

#[tokio::test]
async fn test_handshake_premature_close_is_transport_error() {
    let (listener, addr) = create_test_listener().await;
    let gateway = stub_gateway::spawn_closing(listener);

    let mut session = session_for(addr);
    let err = session.connect().await.unwrap_err();

    assert!(matches!(err, HandshakeError::Transport(_)));
    assert!(session.last_failure().is_some());

    gateway.await.unwrap();
}

#[tokio::test]
async fn test_handshake_unreachable_gateway() {
    // Bind and drop a listener so the port is known to be closed.
    let (listener, addr) = create_test_listener().await;
    drop(listener);

    let mut session = session_for(addr);
    let err = session.connect().await.unwrap_err();

    assert!(matches!(err, HandshakeError::Transport(_)));
    assert!(session.last_failure().is_some());
}

#[tokio::test]
async fn test_telemetry_is_signed_and_sequenced() {
    let (listener, addr) = create_test_listener().await;
    let gateway = stub_gateway::spawn(
        listener,
        json!({"type": "challenge", "nonce": "abc123"}),
        json!({"type": "hello_ack", "accepted": true, "session_key": "00ff7f"}),
        2,
    );

    let mut session = session_for(addr);
    session.connect().await.unwrap();

    let report = test_report();
    assert_eq!(session.send_status(1000, &report).await.unwrap(), 1);
    assert_eq!(session.send_status(2000, &report).await.unwrap(), 2);

    let (_, statuses) = gateway.await.unwrap();
    assert_eq!(statuses.len(), 2);

    let key = [0x00u8, 0xFF, 0x7F];
    for (i, status) in statuses.iter().enumerate() {
        assert_eq!(status["type"], "status");
        assert_eq!(status["seq"], (i + 1) as u64);
        assert!(verify_mac(status, &key));
    }
    assert_eq!(statuses[0]["sent_mono_ms"], 1000);
    assert_eq!(statuses[1]["sent_mono_ms"], 2000);
    assert_eq!(statuses[0]["gps"]["lat"], 52.52);
    assert_eq!(statuses[0]["battery"]["level"], 83);
    assert_eq!(statuses[0]["socks5"]["port"], 1080);
}

#[tokio::test]
async fn test_status_requires_handshake() {
    let (_listener, addr) = create_test_listener().await;
    let mut session = session_for(addr);

    let report = test_report();
    assert!(session.send_status(1000, &report).await.is_err());
}
