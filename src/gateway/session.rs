//! Gateway session management
//!
//! A [`GatewaySession`] owns one TCP connection to the head unit's gateway:
//! it runs the challenge/response handshake, holds the session key the
//! gateway hands back, and signs and sends telemetry over the same stream.

use crate::config::CompanionConfig;
use crate::error::{CompanionError, HandshakeError};
use crate::net::{self, SocketOpts};
use crate::pairing::SharedSecret;
use crate::protocol::{
    build_status, read_message, write_message, Challenge, Hello, HelloAck, StatusReport,
};
use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Client side of the gateway link
///
/// The session key is present exactly while a handshake has succeeded on
/// the current connection; [`GatewaySession::disconnect`] clears it together
/// with the stream.
pub struct GatewaySession {
    host: String,
    port: u16,
    secret: SharedSecret,
    connect_timeout: Duration,
    read_timeout: Duration,
    bind_addr: Option<SocketAddr>,
    stream: Option<BufReader<TcpStream>>,
    session_key: Option<Vec<u8>>,
    seq: u64,
    last_failure: Option<String>,
}

impl GatewaySession {
    /// Create a session for the gateway named by `config`.
    pub fn new(config: &CompanionConfig, secret: SharedSecret) -> Self {
        GatewaySession {
            host: config.gateway_host.clone(),
            port: config.gateway_port,
            secret,
            connect_timeout: Duration::from_secs(config.connect_timeout),
            read_timeout: Duration::from_secs(config.read_timeout),
            bind_addr: None,
            stream: None,
            session_key: None,
            seq: 0,
            last_failure: None,
        }
    }

    /// Pin the gateway connection to a local address.
    ///
    /// Used when the host has several interfaces and the gateway is only
    /// reachable through one of them.
    pub fn with_bind_addr(mut self, bind_addr: Option<SocketAddr>) -> Self {
        self.bind_addr = bind_addr;
        self
    }

    /// `host:port` of the gateway, for log messages.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connect and run the handshake.
    ///
    /// Any previous connection is torn down first. On failure the reason is
    /// retained for [`GatewaySession::last_failure`] and the session is left
    /// disconnected.
    pub async fn connect(&mut self) -> Result<(), HandshakeError> {
        self.disconnect();

        match self.try_connect().await {
            Ok(()) => {
                self.last_failure = None;
                Ok(())
            }
            Err(e) => {
                self.last_failure = Some(e.to_string());
                self.disconnect();
                Err(e)
            }
        }
    }

    async fn try_connect(&mut self) -> Result<(), HandshakeError> {
        let remote = net::resolve(&self.host, self.port)
            .await
            .map_err(|e| HandshakeError::Transport(format!("resolving {}: {}", self.host, e)))?;

        info!("Connecting to gateway at {}", remote);

        let (stream, _fell_back) =
            net::connect_with_fallback(remote, self.bind_addr, self.connect_timeout)
                .await
                .map_err(|e| {
                    HandshakeError::Transport(format!("connecting to {}: {}", remote, e))
                })?;

        if let Err(e) = SocketOpts::for_gateway().apply(&stream) {
            debug!("Could not apply socket options: {}", e);
        }

        let mut stream = BufReader::new(stream);

        let challenge: Challenge =
            read_with_timeout(&mut stream, self.read_timeout, "challenge").await?;
        challenge.validate()?;
        debug!("Received challenge");

        let hello = Hello::new(&self.secret, &challenge.nonce);
        write_message(&mut stream, &hello).await?;
        debug!("Sent hello");

        let ack: HelloAck = read_with_timeout(&mut stream, self.read_timeout, "hello_ack").await?;
        let session_key = ack.validate()?;

        info!("Gateway accepted hello, session established");

        self.stream = Some(stream);
        self.session_key = Some(session_key);
        self.seq = 0;
        Ok(())
    }

    /// Sign and send one status message; returns the sequence number used.
    ///
    /// Sequence numbers count up from 1 within a session. A send failure
    /// leaves the session in an unusable state; callers tear it down and
    /// reconnect.
    pub async fn send_status(
        &mut self,
        sent_mono_ms: u64,
        report: &StatusReport,
    ) -> Result<u64, CompanionError> {
        let key = match &self.session_key {
            Some(key) => key.clone(),
            None => {
                return Err(CompanionError::Session(
                    "cannot send status before handshake".to_string(),
                ))
            }
        };

        self.seq += 1;
        let message = build_status(self.seq, sent_mono_ms, &key, report);

        let stream = self.stream.as_mut().ok_or_else(|| {
            CompanionError::Session("cannot send status without a connection".to_string())
        })?;
        write_message(stream, &message).await?;

        debug!("Sent status seq={}", self.seq);
        Ok(self.seq)
    }

    /// Drop the connection and forget the session key.
    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            debug!("Gateway session closed");
        }
        self.session_key = None;
        self.seq = 0;
    }

    /// True while a gateway connection is held.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// True once the handshake has succeeded on the current connection.
    pub fn is_authenticated(&self) -> bool {
        self.session_key.is_some()
    }

    /// Session key handed back by the gateway, while authenticated.
    pub fn session_key(&self) -> Option<&[u8]> {
        self.session_key.as_deref()
    }

    /// Sequence number of the last sent status message.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Reason of the most recent handshake failure, until a connect succeeds.
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }
}

/// Read one message, bounding the wait with the session read timeout.
async fn read_with_timeout<T: DeserializeOwned>(
    reader: &mut BufReader<TcpStream>,
    timeout: Duration,
    label: &str,
) -> Result<T, HandshakeError> {
    match tokio::time::timeout(timeout, read_message(reader, label)).await {
        Ok(result) => result,
        Err(_) => Err(HandshakeError::Transport(format!(
            "timed out waiting for {}",
            label
        ))),
    }
}
