//! Socket plumbing for outbound connections
//!
//! Both the gateway link and the relay's egress connections go through
//! here: name resolution, bind-before-connect for pinning traffic to a
//! specific local interface, connect timeouts, and socket options.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tracing::warn;

/// Socket options for configuring connections
#[derive(Debug, Clone)]
pub struct SocketOpts {
    /// Enable TCP_NODELAY
    pub nodelay: bool,
    /// TCP keepalive timeout
    pub keepalive_secs: Option<u64>,
    /// TCP keepalive interval
    pub keepalive_interval: Option<u64>,
}

impl Default for SocketOpts {
    fn default() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive_secs: Some(20),
            keepalive_interval: Some(8),
        }
    }
}

impl SocketOpts {
    /// Socket options for the long-lived gateway link
    pub fn for_gateway() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive_secs: Some(30),
            keepalive_interval: Some(10),
        }
    }

    /// Socket options for relay client and egress connections
    pub fn for_relay() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive_secs: None,
            keepalive_interval: None,
        }
    }

    /// Apply socket options to a TCP stream
    pub fn apply(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(self.nodelay)?;

        if let (Some(timeout), Some(interval)) = (self.keepalive_secs, self.keepalive_interval) {
            let socket = socket2::SockRef::from(stream);
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(Duration::from_secs(timeout))
                .with_interval(Duration::from_secs(interval));
            socket.set_tcp_keepalive(&keepalive)?;
        }

        Ok(())
    }
}

/// Resolve `host:port` to the first reported socket address.
pub async fn resolve(host: &str, port: u16) -> io::Result<SocketAddr> {
    lookup_host((host, port)).await?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses found for {}", host),
        )
    })
}

/// Connect to `remote` within `timeout`, optionally binding a local address
/// first so traffic leaves through a specific interface.
pub async fn connect(
    remote: SocketAddr,
    bind_addr: Option<SocketAddr>,
    timeout: Duration,
) -> io::Result<TcpStream> {
    let socket = if remote.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    if let Some(addr) = bind_addr {
        socket.bind(addr)?;
    }

    match tokio::time::timeout(timeout, socket.connect(remote)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connect to {} timed out after {:?}", remote, timeout),
        )),
    }
}

/// Connect like [`connect`], but when the bound attempt fails with a
/// permission error, retry once without the bind.
///
/// Some platforms forbid processes from pinning sockets to an interface;
/// the connection still works over the default route. Returns the stream
/// and whether the fallback was taken.
pub async fn connect_with_fallback(
    remote: SocketAddr,
    bind_addr: Option<SocketAddr>,
    timeout: Duration,
) -> io::Result<(TcpStream, bool)> {
    match connect(remote, bind_addr, timeout).await {
        Ok(stream) => Ok((stream, false)),
        Err(e) if bind_addr.is_some() && is_permission_denied(&e) => {
            warn!(
                "Bound connect to {} denied ({}), retrying without interface bind",
                remote, e
            );
            let stream = connect(remote, None, timeout).await?;
            Ok((stream, true))
        }
        Err(e) => Err(e),
    }
}

/// True when an IO error means the OS refused the socket operation.
///
/// Checks the error kind first, then walks the cause chain for an EPERM
/// wrapped by an intermediate layer.
pub fn is_permission_denied(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::PermissionDenied {
        return true;
    }

    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(cause) = current {
        let message = cause.to_string();
        if message.contains("EPERM") || message.contains("Operation not permitted") {
            return true;
        }
        current = cause.source();
    }

    false
}
