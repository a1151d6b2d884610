//! Bidirectional byte shoveling for established tunnels

use crate::helper::DEFAULT_BUFFER_SIZE;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Copy bytes between client and remote until both directions end.
///
/// Reads from the client are bounded by `idle_timeout`; a client that sends
/// nothing for that long has its upstream direction closed. Reads from the
/// remote have no idle bound. When one direction ends, the peer's write
/// half is shut down so the other direction can still drain.
///
/// # Returns
///
/// The byte counts copied `(client_to_remote, remote_to_client)`.
pub async fn relay_streams<C, R>(client: C, remote: R, idle_timeout: Duration) -> (u64, u64)
where
    C: AsyncRead + AsyncWrite + Send + 'static,
    R: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut remote_read, mut remote_write) = tokio::io::split(remote);

    let upstream = tokio::spawn(async move {
        let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];
        let mut copied = 0u64;
        loop {
            let n = match tokio::time::timeout(idle_timeout, client_read.read(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    debug!("Client read ended: {}", e);
                    break;
                }
                Err(_) => {
                    debug!("Client idle for {:?}, closing upstream", idle_timeout);
                    break;
                }
            };
            if let Err(e) = remote_write.write_all(&buf[..n]).await {
                debug!("Remote write ended: {}", e);
                break;
            }
            copied += n as u64;
        }
        let _ = remote_write.shutdown().await;
        copied
    });

    let downstream = tokio::spawn(async move {
        let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];
        let mut copied = 0u64;
        loop {
            let n = match remote_read.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    debug!("Remote read ended: {}", e);
                    break;
                }
            };
            if let Err(e) = client_write.write_all(&buf[..n]).await {
                debug!("Client write ended: {}", e);
                break;
            }
            copied += n as u64;
        }
        let _ = client_write.shutdown().await;
        copied
    });

    let (up, down) = tokio::join!(upstream, downstream);
    (up.unwrap_or(0), down.unwrap_or(0))
}
