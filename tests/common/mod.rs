//! Test utilities for companion integration tests
//!
//! Provides a scripted gateway for handshake exchanges and SOCKS5 wire
//! fragments as a phone-side client would send them.

use openauto_companion::config::RelayConfig;
use openauto_companion::pairing::SharedSecret;
use openauto_companion::relay::Socks5Relay;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Start a relay on an ephemeral loopback port.
pub async fn spawn_relay(
    secret: &SharedSecret,
    max_connections: usize,
) -> (Socks5Relay, SocketAddr) {
    let config = RelayConfig {
        bind_addr: "127.0.0.1".to_string(),
        port: 0,
        max_connections,
        ..RelayConfig::default()
    };

    let mut relay = Socks5Relay::new(config, secret);
    relay.start().await.unwrap();
    let addr = relay.local_addr().unwrap();
    (relay, addr)
}

/// Scripted head unit gateway speaking newline-delimited JSON
pub mod stub_gateway {
    use serde_json::Value;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    async fn write_line(stream: &mut (impl AsyncWriteExt + Unpin), message: &Value) {
        let mut line = message.to_string();
        line.push('\n');
        stream.write_all(line.as_bytes()).await.unwrap();
        stream.flush().await.unwrap();
    }

    /// Serve one scripted handshake: send `challenge`, collect the hello,
    /// send `ack`, then read `expect_statuses` status lines.
    ///
    /// Returns the hello and the status messages the client sent. A client
    /// that hangs up without a hello yields `Value::Null`.
    pub fn spawn(
        listener: TcpListener,
        challenge: Value,
        ack: Value,
        expect_statuses: usize,
    ) -> JoinHandle<(Value, Vec<Value>)> {
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(stream);

            write_line(reader.get_mut(), &challenge).await;

            let mut hello_line = String::new();
            if reader.read_line(&mut hello_line).await.unwrap() == 0 {
                return (Value::Null, Vec::new());
            }
            let hello: Value = serde_json::from_str(&hello_line).unwrap();

            write_line(reader.get_mut(), &ack).await;

            let mut statuses = Vec::new();
            for _ in 0..expect_statuses {
                let mut status_line = String::new();
                reader.read_line(&mut status_line).await.unwrap();
                statuses.push(serde_json::from_str(&status_line).unwrap());
            }

            (hello, statuses)
        })
    }

    /// Accept one connection and drop it without sending anything.
    pub fn spawn_closing(listener: TcpListener) -> JoinHandle<()> {
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        })
    }
}

/// SOCKS5 wire fragments as a client would send them
pub mod socks5_wire {
    use openauto_companion::relay::{
        SOCKS5_ADDR_TYPE_DOMAIN, SOCKS5_ADDR_TYPE_IPV4, SOCKS5_AUTH_VERSION,
        SOCKS5_CMD_TCP_CONNECT, SOCKS5_CMD_UDP_ASSOCIATE, SOCKS5_RESERVED, SOCKS5_VERSION,
    };

    /// Client greeting offering the given methods
    pub fn create_greeting(methods: &[u8]) -> Vec<u8> {
        let mut data = vec![SOCKS5_VERSION, methods.len() as u8];
        data.extend_from_slice(methods);
        data
    }

    /// RFC 1929 credential message
    pub fn create_auth_request(username: &str, password: &str) -> Vec<u8> {
        let mut data = vec![SOCKS5_AUTH_VERSION, username.len() as u8];
        data.extend_from_slice(username.as_bytes());
        data.push(password.len() as u8);
        data.extend_from_slice(password.as_bytes());
        data
    }

    /// CONNECT request to an IPv4 address
    pub fn create_connect_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut data = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV4,
        ];
        data.extend_from_slice(&ip);
        data.extend_from_slice(&port.to_be_bytes());
        data
    }

    /// CONNECT request to a domain name
    pub fn create_connect_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut data = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            domain.len() as u8,
        ];
        data.extend_from_slice(domain.as_bytes());
        data.extend_from_slice(&port.to_be_bytes());
        data
    }

    /// UDP ASSOCIATE request with a zero IPv4 address
    pub fn create_udp_associate() -> Vec<u8> {
        vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_UDP_ASSOCIATE,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV4,
            0,
            0,
            0,
            0,
            0,
            0,
        ]
    }
}
