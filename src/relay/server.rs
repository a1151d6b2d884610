//! SOCKS5 relay server lifecycle and per-connection pipeline

use crate::config::RelayConfig;
use crate::net::{self, SocketOpts};
use crate::pairing::{SharedSecret, RELAY_USERNAME};
use crate::protocol::RelayStatus;
use crate::relay::auth::{negotiate_method, read_auth_request, send_auth_result};
use crate::relay::command::{read_request_header, read_target_addr, send_reply, TargetAddr};
use crate::relay::consts::{
    ACCEPT_STOP_GRACE, AUTH_FAILURE, AUTH_SUCCESS, SOCKS5_CMD_TCP_CONNECT,
    SOCKS5_REPLY_COMMAND_NOT_SUPPORTED, SOCKS5_REPLY_CONNECTION_NOT_ALLOWED,
    SOCKS5_REPLY_CONNECTION_REFUSED, SOCKS5_REPLY_SUCCEEDED,
};
use crate::relay::copy::relay_streams;
use crate::relay::filter;
use crate::relay::lockout::LockoutTable;
use anyhow::{bail, Context, Result};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Shared state each connection handler needs.
#[derive(Debug)]
struct RelayContext {
    username: String,
    password: String,
    egress_bind: Option<SocketAddr>,
    connect_timeout: Duration,
    idle_timeout: Duration,
    lockout: LockoutTable,
}

/// Authenticated SOCKS5 relay bound to the phone-facing interface.
///
/// Credentials are fixed for the lifetime of the pairing: the username is
/// always `oap` and the password is derived from the shared secret. One
/// relay instance can be started and stopped repeatedly; each start gets a
/// fresh listener and a fresh lockout table.
#[derive(Debug)]
pub struct Socks5Relay {
    config: RelayConfig,
    username: String,
    password: String,
    egress_bind: Option<SocketAddr>,
    active: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
    local_addr: Option<SocketAddr>,
    shutdown_tx: broadcast::Sender<bool>,
    accept_task: Option<JoinHandle<()>>,
}

impl Socks5Relay {
    /// Create a relay for the given configuration and pairing secret.
    pub fn new(config: RelayConfig, secret: &SharedSecret) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Socks5Relay {
            config,
            username: RELAY_USERNAME.to_string(),
            password: secret.relay_password().to_string(),
            egress_bind: None,
            active: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            local_addr: None,
            shutdown_tx,
            accept_task: None,
        }
    }

    /// Bind outbound tunnel sockets to a specific local address.
    pub fn with_egress_bind(mut self, bind_addr: Option<SocketAddr>) -> Self {
        self.egress_bind = bind_addr;
        self
    }

    /// Bind the listener and start accepting connections.
    ///
    /// Starting an already running relay is a no-op.
    pub async fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            debug!("Relay already running");
            return Ok(());
        }

        let bind_addr = format!("{}:{}", self.config.bind_addr, self.config.port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("Failed to bind relay listener on {}", bind_addr))?;
        let local_addr = listener
            .local_addr()
            .with_context(|| "Failed to read relay listener address")?;

        self.running.store(true, Ordering::SeqCst);
        self.local_addr = Some(local_addr);
        info!("SOCKS5 relay listening on {}", local_addr);

        let context = Arc::new(RelayContext {
            username: self.username.clone(),
            password: self.password.clone(),
            egress_bind: self.egress_bind,
            connect_timeout: Duration::from_secs(self.config.connect_timeout),
            idle_timeout: Duration::from_secs(self.config.idle_timeout),
            lockout: LockoutTable::default(),
        });

        let max_connections = self.config.max_connections;
        let active = self.active.clone();
        let running = self.running.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        self.accept_task = Some(tokio::spawn(async move {
            accept_loop(
                listener,
                context,
                active,
                running,
                max_connections,
                &mut shutdown_rx,
            )
            .await;
        }));

        Ok(())
    }

    /// Stop accepting connections and release the listener.
    ///
    /// Established tunnels drain on their own; only the accept loop is
    /// stopped here. Stopping an already stopped relay is a no-op.
    pub async fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        info!("Stopping SOCKS5 relay");
        let _ = self.shutdown_tx.send(true);

        if let Some(mut task) = self.accept_task.take() {
            if tokio::time::timeout(ACCEPT_STOP_GRACE, &mut task)
                .await
                .is_err()
            {
                warn!("Relay accept loop did not stop in time, aborting it");
                task.abort();
            }
        }
        self.local_addr = None;
    }

    /// Whether the listener is currently running.
    pub fn is_active(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The bound listener address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// The listener port. Falls back to the configured port when stopped.
    pub fn port(&self) -> u16 {
        self.local_addr
            .map(|addr| addr.port())
            .unwrap_or(self.config.port)
    }

    /// Number of connections currently being served.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Snapshot for telemetry reports.
    pub fn status(&self) -> RelayStatus {
        RelayStatus {
            port: self.port(),
            active: self.is_active(),
        }
    }
}

impl Drop for Socks5Relay {
    fn drop(&mut self) {
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

/// Counts one served connection against the cap, released on drop.
#[derive(Debug)]
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        ActiveGuard(counter)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn accept_loop(
    listener: TcpListener,
    context: Arc<RelayContext>,
    active: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
    max_connections: usize,
    shutdown_rx: &mut broadcast::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                debug!("Relay accept loop stopping");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        if active.load(Ordering::SeqCst) >= max_connections {
                            warn!("Relay connection cap reached, dropping {}", peer);
                            drop(stream);
                            continue;
                        }

                        let guard = ActiveGuard::new(active.clone());
                        let context = context.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, peer, context, guard).await;
                        });
                    }
                    Err(e) => {
                        if running.load(Ordering::SeqCst) {
                            warn!("Relay accept error: {}", e);
                        }
                    }
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    context: Arc<RelayContext>,
    _guard: ActiveGuard,
) {
    debug!("Relay connection from {}", peer);
    if let Err(e) = serve_client(stream, peer, &context).await {
        debug!("Relay connection from {} ended: {:#}", peer, e);
    }
}

/// Serve one client from greeting to tunnel teardown.
async fn serve_client(
    mut stream: TcpStream,
    peer: SocketAddr,
    context: &RelayContext,
) -> Result<()> {
    // Locked-out clients are dropped before any protocol bytes.
    if context.lockout.is_locked_out(peer.ip()) {
        debug!("Dropping connection from locked-out client {}", peer);
        return Ok(());
    }

    if let Err(e) = SocketOpts::for_relay().apply(&stream) {
        debug!("Could not apply relay socket options: {}", e);
    }

    // The whole negotiation is bounded by the same idle timeout that
    // applies to client reads during the relay phase.
    let remote = match tokio::time::timeout(
        context.idle_timeout,
        negotiate(&mut stream, peer, context),
    )
    .await
    {
        Ok(negotiated) => match negotiated? {
            Some(remote) => remote,
            None => return Ok(()),
        },
        Err(_) => bail!("negotiation timed out"),
    };

    let (to_remote, to_client) = relay_streams(stream, remote, context.idle_timeout).await;
    debug!(
        "Relay tunnel from {} closed ({} bytes out, {} bytes back)",
        peer, to_remote, to_client
    );
    Ok(())
}

/// Run greeting, authentication, and the CONNECT request.
///
/// # Returns
///
/// The connected egress stream, or `None` when the exchange ended with a
/// reply already written (bad credentials, unsupported command, blocked
/// destination, failed connect).
async fn negotiate(
    stream: &mut TcpStream,
    peer: SocketAddr,
    context: &RelayContext,
) -> Result<Option<TcpStream>> {
    negotiate_method(stream).await?;

    let (username, password) = read_auth_request(stream).await?;
    if username != context.username || password != context.password {
        send_auth_result(stream, AUTH_FAILURE).await?;
        let failures = context.lockout.record_failure(peer.ip());
        warn!("Relay auth failure from {} ({} so far)", peer, failures);
        return Ok(None);
    }
    send_auth_result(stream, AUTH_SUCCESS).await?;
    debug!("Relay client {} authenticated", peer);

    let header = read_request_header(stream).await?;
    if header.command != SOCKS5_CMD_TCP_CONNECT {
        debug!(
            "Unsupported relay command {:#04x} from {}",
            header.command, peer
        );
        send_reply(stream, SOCKS5_REPLY_COMMAND_NOT_SUPPORTED).await?;
        return Ok(None);
    }

    let target = read_target_addr(stream, header.addr_type).await?;

    if filter::is_blocked_target(&target).await {
        warn!("Relay refused blocked destination {} for {}", target, peer);
        send_reply(stream, SOCKS5_REPLY_CONNECTION_NOT_ALLOWED).await?;
        return Ok(None);
    }

    let remote = match connect_to_target(&target, context).await {
        Ok(remote) => remote,
        Err(e) => {
            debug!("Relay connect to {} failed: {}", target, e);
            send_reply(stream, SOCKS5_REPLY_CONNECTION_REFUSED).await?;
            return Ok(None);
        }
    };

    send_reply(stream, SOCKS5_REPLY_SUCCEEDED).await?;
    info!("Relay tunnel open: {} -> {}", peer, target);
    Ok(Some(remote))
}

async fn connect_to_target(target: &TargetAddr, context: &RelayContext) -> io::Result<TcpStream> {
    let addr = target.resolve().await?;
    let stream = net::connect(addr, context.egress_bind, context.connect_timeout).await?;
    if let Err(e) = SocketOpts::for_relay().apply(&stream) {
        debug!("Could not apply egress socket options: {}", e);
    }
    Ok(stream)
}
