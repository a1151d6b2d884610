//! SOCKS5 request parsing and reply encoding
//!
//! Only the CONNECT command is served. The bound address in every reply is
//! the zero address, since the client already knows where it connected.

use crate::net;
use crate::relay::consts::{
    SOCKS5_ADDR_TYPE_DOMAIN, SOCKS5_ADDR_TYPE_IPV4, SOCKS5_ADDR_TYPE_IPV6, SOCKS5_RESERVED,
    SOCKS5_VERSION,
};
use anyhow::{bail, Context, Result};
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Destination requested by a CONNECT command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetAddr {
    /// Literal socket address
    Ip(SocketAddr),
    /// Domain name and port, resolved at connect time
    Domain(String, u16),
}

impl TargetAddr {
    /// The host portion as a string.
    pub fn host(&self) -> String {
        match self {
            TargetAddr::Ip(addr) => addr.ip().to_string(),
            TargetAddr::Domain(host, _) => host.clone(),
        }
    }

    /// The destination port.
    pub fn port(&self) -> u16 {
        match self {
            TargetAddr::Ip(addr) => addr.port(),
            TargetAddr::Domain(_, port) => *port,
        }
    }

    /// Resolve to a concrete socket address.
    pub async fn resolve(&self) -> io::Result<SocketAddr> {
        match self {
            TargetAddr::Ip(addr) => Ok(*addr),
            TargetAddr::Domain(host, port) => net::resolve(host, *port).await,
        }
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ip(addr) => write!(f, "{}", addr),
            TargetAddr::Domain(host, port) => write!(f, "{}:{}", host, port),
        }
    }
}

/// Fixed-size part of a SOCKS5 request.
#[derive(Debug, Clone, Copy)]
pub struct RequestHeader {
    /// Protocol version byte, carried but not validated
    pub version: u8,
    /// Requested command
    pub command: u8,
    /// Address type of the destination that follows
    pub addr_type: u8,
}

/// Read the fixed-size request header.
///
/// ```text
/// +----+-----+-------+------+
/// |VER | CMD |  RSV  | ATYP |
/// +----+-----+-------+------+
/// | 1  |  1  | X'00' |  1   |
/// +----+-----+-------+------+
/// ```
pub async fn read_request_header<S>(stream: &mut S) -> Result<RequestHeader>
where
    S: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    stream
        .read_exact(&mut header)
        .await
        .with_context(|| "Failed to read request header")?;

    Ok(RequestHeader {
        version: header[0],
        command: header[1],
        addr_type: header[3],
    })
}

/// Read the destination address that follows the request header.
///
/// ```text
/// +----------+----------+
/// | DST.ADDR | DST.PORT |
/// +----------+----------+
/// | Variable |    2     |
/// +----------+----------+
/// ```
///
/// # Errors
///
/// Fails on an unknown address type or a zero-length domain name. No reply
/// is written here; a malformed address aborts the connection.
pub async fn read_target_addr<S>(stream: &mut S, addr_type: u8) -> Result<TargetAddr>
where
    S: AsyncRead + Unpin,
{
    match addr_type {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let mut buf = [0u8; 6];
            stream
                .read_exact(&mut buf)
                .await
                .with_context(|| "Failed to read IPv4 address")?;
            let ip = Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]);
            let port = u16::from_be_bytes([buf[4], buf[5]]);
            Ok(TargetAddr::Ip(SocketAddr::new(IpAddr::V4(ip), port)))
        }
        SOCKS5_ADDR_TYPE_DOMAIN => {
            let mut len = [0u8; 1];
            stream
                .read_exact(&mut len)
                .await
                .with_context(|| "Failed to read domain length")?;
            let len = len[0] as usize;
            if len == 0 {
                bail!("Zero-length domain name");
            }

            let mut domain = vec![0u8; len];
            stream
                .read_exact(&mut domain)
                .await
                .with_context(|| "Failed to read domain name")?;
            let domain =
                String::from_utf8(domain).with_context(|| "Invalid UTF-8 in domain name")?;

            let mut port = [0u8; 2];
            stream
                .read_exact(&mut port)
                .await
                .with_context(|| "Failed to read destination port")?;
            Ok(TargetAddr::Domain(domain, u16::from_be_bytes(port)))
        }
        SOCKS5_ADDR_TYPE_IPV6 => {
            let mut buf = [0u8; 18];
            stream
                .read_exact(&mut buf)
                .await
                .with_context(|| "Failed to read IPv6 address")?;
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&buf[..16]);
            let ip = Ipv6Addr::from(octets);
            let port = u16::from_be_bytes([buf[16], buf[17]]);
            Ok(TargetAddr::Ip(SocketAddr::new(IpAddr::V6(ip), port)))
        }
        other => bail!("Unsupported address type: {:#04x}", other),
    }
}

/// Send a reply with the given code and a zero bound address.
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   |    4     |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
pub async fn send_reply<S>(stream: &mut S, code: u8) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let reply = [
        SOCKS5_VERSION,
        code,
        SOCKS5_RESERVED,
        SOCKS5_ADDR_TYPE_IPV4,
        0,
        0,
        0,
        0,
        0,
        0,
    ];
    stream.write_all(&reply).await?;
    stream.flush().await?;
    Ok(())
}
