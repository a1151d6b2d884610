//! SOCKS5 method negotiation and username/password authentication
//!
//! The relay accepts exactly one method, RFC 1929 username/password. A
//! greeting that does not offer it is answered with NO ACCEPTABLE METHODS
//! and the connection is closed.

use crate::relay::consts::{
    AUTH_REQUEST_MAX_LEN, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE, SOCKS5_AUTH_METHOD_PASSWORD,
    SOCKS5_AUTH_VERSION, SOCKS5_VERSION,
};
use anyhow::{bail, Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Read the client greeting and select username/password authentication.
///
/// ```text
/// +----+----------+----------+        +----+--------+
/// |VER | NMETHODS | METHODS  |  --->  |VER | METHOD |
/// +----+----------+----------+        +----+--------+
/// | 1  |    1     | 1 to 255 |        | 1  |   1    |
/// +----+----------+----------+        +----+--------+
/// ```
///
/// # Errors
///
/// Fails when the greeting is not SOCKS5 (nothing is written back) or when
/// the client does not offer username/password (0xFF is written first).
pub async fn negotiate_method<S>(stream: &mut S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut header = [0u8; 2];
    stream
        .read_exact(&mut header)
        .await
        .with_context(|| "Failed to read greeting header")?;

    let version = header[0];
    let n_methods = header[1] as usize;

    if version != SOCKS5_VERSION {
        bail!("Unsupported SOCKS version: {:#04x}", version);
    }

    let mut methods = vec![0u8; n_methods];
    stream
        .read_exact(&mut methods)
        .await
        .with_context(|| "Failed to read greeting methods")?;

    if !methods.contains(&SOCKS5_AUTH_METHOD_PASSWORD) {
        stream
            .write_all(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE])
            .await?;
        stream.flush().await?;
        bail!("Client does not offer username/password authentication");
    }

    stream
        .write_all(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_PASSWORD])
        .await?;
    stream.flush().await?;
    Ok(())
}

/// Read one RFC 1929 credential message with a single bounded read.
///
/// Clients send the whole message in one segment. A short read is treated
/// as a malformed message rather than waiting for more bytes.
pub async fn read_auth_request<S>(stream: &mut S) -> Result<(String, String)>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; AUTH_REQUEST_MAX_LEN];
    let n = stream
        .read(&mut buf)
        .await
        .with_context(|| "Failed to read auth request")?;
    if n == 0 {
        bail!("Client closed before sending credentials");
    }
    parse_auth_request(&buf[..n])
}

/// Parse an RFC 1929 credential message.
///
/// ```text
/// +----+------+----------+------+----------+
/// |VER | ULEN |  UNAME   | PLEN |  PASSWD  |
/// +----+------+----------+------+----------+
/// | 1  |  1   | 1 to 255 |  1   | 1 to 255 |
/// +----+------+----------+------+----------+
/// ```
///
/// The version byte is not validated and trailing bytes are ignored.
///
/// # Returns
///
/// The `(username, password)` pair.
pub fn parse_auth_request(data: &[u8]) -> Result<(String, String)> {
    if data.len() < 2 {
        bail!("Auth request too short: {} bytes", data.len());
    }

    let user_len = data[1] as usize;
    let pass_len_idx = 2 + user_len;
    if pass_len_idx >= data.len() {
        bail!("Auth request truncated in username");
    }
    let username = String::from_utf8(data[2..pass_len_idx].to_vec())
        .with_context(|| "Invalid UTF-8 in username")?;

    let pass_len = data[pass_len_idx] as usize;
    let end = pass_len_idx + 1 + pass_len;
    if end > data.len() {
        bail!("Auth request truncated in password");
    }
    let password = String::from_utf8(data[pass_len_idx + 1..end].to_vec())
        .with_context(|| "Invalid UTF-8 in password")?;

    Ok((username, password))
}

/// Send the authentication sub-negotiation result.
///
/// ```text
/// +----+--------+
/// |VER | STATUS |
/// +----+--------+
/// | 1  |   1    |
/// +----+--------+
/// ```
pub async fn send_auth_result<S>(stream: &mut S, status: u8) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&[SOCKS5_AUTH_VERSION, status]).await?;
    stream.flush().await?;
    Ok(())
}
