//! Companion service orchestration
//!
//! Owns the full client lifecycle: resolve the pairing secret, start the
//! SOCKS5 relay, keep a gateway session alive with exponential backoff,
//! and push signed telemetry on a fixed interval. Connection state is
//! published through a watch channel for display surfaces.

use crate::config::{CompanionConfig, Config};
use crate::gateway::{push_status, Clock, GatewaySession, NoTelemetry, SystemClock, TelemetrySource};
use crate::helper::{duration_from_secs, RetryConfig};
use crate::pairing::{resolve_identity, SharedSecret, VehicleRegistry};
use crate::relay::Socks5Relay;
use anyhow::{anyhow, bail, Context, Result};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

/// Picks the local address outbound sockets bind to.
///
/// On a phone this pins traffic to the vehicle network even when another
/// network is the default route. The default implementation leaves routing
/// to the operating system.
pub trait EgressSelector: fmt::Debug + Send + Sync {
    /// Preferred local bind address, or `None` to let the OS choose.
    fn bind_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// Default selector that lets the OS route outbound sockets.
#[derive(Debug, Default)]
pub struct SystemEgress;

impl EgressSelector for SystemEgress {}

/// Snapshot of the companion's connection state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompanionStatus {
    /// Whether a TCP connection to the gateway is held
    pub connected: bool,
    /// Whether the handshake completed on that connection
    pub authenticated: bool,
    /// Resolved vehicle identity, empty when unknown
    pub vehicle: String,
    /// Whether the SOCKS5 relay listener is running
    pub relay_active: bool,
    /// Reason of the most recent connection failure, if any
    pub last_failure: Option<String>,
}

/// Long-running companion client.
///
/// Hardware-bound collaborators (clock, telemetry, egress network) are
/// injected as traits; the defaults work on any host without extra
/// instrumentation.
#[derive(Debug)]
pub struct Companion {
    config: CompanionConfig,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn TelemetrySource>,
    egress: Arc<dyn EgressSelector>,
    status_tx: watch::Sender<CompanionStatus>,
}

impl Companion {
    /// Create a companion from configuration with default collaborators.
    pub fn new(config: Config) -> Self {
        let (status_tx, _) = watch::channel(CompanionStatus::default());

        Companion {
            config: config.companion,
            clock: Arc::new(SystemClock::new()),
            telemetry: Arc::new(NoTelemetry),
            egress: Arc::new(SystemEgress),
            status_tx,
        }
    }

    /// Replace the clock source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the telemetry source.
    pub fn with_telemetry(mut self, telemetry: Arc<dyn TelemetrySource>) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Replace the egress network selector.
    pub fn with_egress(mut self, egress: Arc<dyn EgressSelector>) -> Self {
        self.egress = egress;
        self
    }

    /// Subscribe to connection state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<CompanionStatus> {
        self.status_tx.subscribe()
    }

    /// Run the companion until shutdown.
    ///
    /// Connect failures are retried with backoff indefinitely; an explicit
    /// rejection by the gateway ends the run, since retrying cannot succeed
    /// without a new pairing.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        let secret = resolve_secret(&self.config)?;
        let vehicle = resolve_identity(
            self.config.vehicle_id.as_deref(),
            self.config.vehicle_ssid.as_deref(),
        );

        info!("Starting OpenAuto companion");
        info!(
            "Gateway endpoint: {}:{}",
            self.config.gateway_host, self.config.gateway_port
        );
        if !vehicle.is_empty() {
            info!("Paired vehicle: {}", vehicle);
        }

        let mut relay = Socks5Relay::new(self.config.relay.clone(), &secret)
            .with_egress_bind(self.egress.bind_addr());
        if self.config.relay.enabled {
            // A relay that cannot bind is not fatal; telemetry still flows.
            if let Err(e) = relay.start().await {
                warn!("SOCKS5 relay failed to start: {:#}", e);
            }
        } else {
            info!("SOCKS5 relay disabled");
        }

        let mut session =
            GatewaySession::new(&self.config, secret).with_bind_addr(self.egress.bind_addr());

        let result = tokio::select! {
            result = self.session_loop(&mut session, &relay, &vehicle) => result,
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received, stopping companion");
                Ok(())
            }
        };

        relay.stop().await;
        session.disconnect();
        self.publish(&session, &relay, &vehicle);

        info!("Companion stopped");
        result
    }

    /// Keep a gateway session alive, reconnecting with backoff.
    async fn session_loop(
        &self,
        session: &mut GatewaySession,
        relay: &Socks5Relay,
        vehicle: &str,
    ) -> Result<()> {
        let retry = RetryConfig::default();
        let mut failures = 0u32;

        loop {
            match session.connect().await {
                Ok(()) => {
                    failures = 0;
                    info!("Gateway session established with {}", session.endpoint());
                    self.publish(session, relay, vehicle);

                    if let Err(e) = self.push_loop(session, relay).await {
                        warn!("Gateway session lost: {:#}", e);
                    }
                    session.disconnect();
                    self.publish(session, relay, vehicle);
                }
                Err(e) if e.is_rejection() => {
                    error!("Gateway rejected the pairing, a new pairing is required");
                    self.publish(session, relay, vehicle);
                    return Err(e.into());
                }
                Err(e) => {
                    warn!("Gateway connection failed: {}", e);
                    self.publish(session, relay, vehicle);
                }
            }

            if !retry.allows_attempt(failures) {
                bail!("Gateway unreachable after {} attempts", failures);
            }
            let delay = retry.delay_for_attempt(failures);
            failures = failures.saturating_add(1);
            debug!("Reconnecting in {:?}", delay);
            tokio::time::sleep(delay).await;
        }
    }

    /// Push signed status reports until the session drops.
    async fn push_loop(&self, session: &mut GatewaySession, relay: &Socks5Relay) -> Result<()> {
        let mut ticker = tokio::time::interval(duration_from_secs(self.config.push_interval));

        loop {
            ticker.tick().await;
            let seq = push_status(
                session,
                self.clock.as_ref(),
                self.telemetry.as_ref(),
                relay.status(),
            )
            .await?;
            debug!("Pushed status {}", seq);
        }
    }

    fn publish(&self, session: &GatewaySession, relay: &Socks5Relay, vehicle: &str) {
        let _ = self.status_tx.send_replace(CompanionStatus {
            connected: session.is_connected(),
            authenticated: session.is_authenticated(),
            vehicle: vehicle.to_string(),
            relay_active: relay.is_active(),
            last_failure: session.last_failure().map(str::to_string),
        });
    }
}

/// Build a companion from configuration and run it until shutdown.
pub async fn run_companion(config: Config, shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
    Companion::new(config).run(shutdown_rx).await
}

/// Resolve the pairing secret from configuration or the vehicle registry.
fn resolve_secret(config: &CompanionConfig) -> Result<SharedSecret> {
    if let Some(secret) = &config.shared_secret {
        return Ok(SharedSecret::new(secret.clone()));
    }

    let identity = resolve_identity(config.vehicle_id.as_deref(), config.vehicle_ssid.as_deref());
    if identity.is_empty() {
        bail!("No shared secret configured and no vehicle identity to look one up with");
    }

    let path = config
        .registry_path
        .as_ref()
        .ok_or_else(|| anyhow!("No shared secret configured and no registry path set"))?;
    let registry = VehicleRegistry::load(path)
        .with_context(|| format!("Failed to load vehicle registry from {:?}", path))?;
    let vehicle = registry
        .find(&identity)
        .ok_or_else(|| anyhow!("Vehicle '{}' is not in the registry", identity))?;

    Ok(SharedSecret::new(vehicle.shared_secret.clone()))
}
