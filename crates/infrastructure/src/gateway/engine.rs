//! Gateway lifecycle: Stopped → Starting → Running → Stopping → Stopped
//!
//! `start` provisions the tunnel through the [`TunnelProvider`], opens the
//! protected UDP socket, installs the upstream routes and spawns the two
//! long-running workers (tunnel reader, UDP receiver). `stop` flips the
//! running flag, cancels and joins the workers with a bounded wait, closes
//! QUIC connections and the tunnel write handle, then releases the tunnel.
//! Restart is always stop-then-start.

use super::workers::{self, RunSignals, Shared};
use crate::dns::router::UpstreamRouter;
use crate::dns::transport::{tls, BypassResolver, DoqConnections, TransportContext};
use crate::net::protected;
use dnsgate_application::ports::{TunnelDevice, TunnelProvider, TunnelRequest};
use dnsgate_application::services::{PendingRequestTable, RewriteEngine};
use dnsgate_domain::config::{TunnelConfig, UpstreamConfig};
use dnsgate_domain::dns_protocol::{parse_host_port, PLAIN_DNS_PORT};
use dnsgate_domain::{
    Config, DomainError, GatewayState, GatewayStatus, Profile, RewriteRule, UpstreamEndpoint,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

struct RunHandle {
    signals: RunSignals,
    workers: Vec<JoinHandle<()>>,
    doq: Arc<DoqConnections>,
}

pub struct GatewayLoop {
    provider: Arc<dyn TunnelProvider>,
    tunnel: TunnelConfig,
    upstream: UpstreamConfig,
    bootstrap: SocketAddr,
    /// Trust anchors for DoH and DoQ upstreams.
    roots: rustls::RootCertStore,
    shared: Arc<Shared>,
    run: Mutex<Option<RunHandle>>,
}

impl GatewayLoop {
    pub fn new(provider: Arc<dyn TunnelProvider>, config: &Config) -> Result<Self, DomainError> {
        let bootstrap = parse_host_port(&config.upstream.bootstrap_resolver, PLAIN_DNS_PORT)
            .and_then(|(host, port)| Some(SocketAddr::new(host.parse::<IpAddr>().ok()?, port)))
            .ok_or_else(|| {
                DomainError::ConfigError(format!(
                    "bootstrap resolver '{}' is not an IP address",
                    config.upstream.bootstrap_resolver
                ))
            })?;

        let shared = Shared {
            rewrites: RewriteEngine::new(config.rewrites.clone()),
            pending: PendingRequestTable::with_window(config.upstream.pending_window()),
            router: UpstreamRouter::new(),
            tunnel_out: Mutex::new(None),
            running: Default::default(),
            status: Default::default(),
            timeout: config.upstream.timeout(),
        };

        Ok(Self {
            provider,
            tunnel: config.tunnel.clone(),
            upstream: config.upstream.clone(),
            bootstrap,
            roots: tls::webpki_root_store(),
            shared: Arc::new(shared),
            run: Mutex::new(None),
        })
    }

    /// Replaces the bundled web PKI roots, for resolvers behind a private CA.
    pub fn with_root_certificates(mut self, roots: rustls::RootCertStore) -> Self {
        self.roots = roots;
        self
    }

    pub async fn start(&self, profile: &Profile) -> Result<(), DomainError> {
        let mut run = self.run.lock().await;
        if run.is_some() {
            return Err(DomainError::GatewayAlreadyRunning);
        }

        self.shared.update_status(|s| {
            s.state = GatewayState::Starting;
            s.provider_name = Some(profile.provider_name.clone());
            s.transport_label = None;
            s.last_error = None;
        });

        match self.launch(profile).await {
            Ok((handle, label)) => {
                *run = Some(handle);
                self.shared.update_status(|s| {
                    s.state = GatewayState::Running;
                    s.transport_label = Some(label);
                });
                info!(
                    provider = %profile.provider_name,
                    primary = %profile.primary,
                    transport = label,
                    "Gateway running"
                );
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                self.shared.update_status(|s| {
                    s.state = GatewayState::Stopped;
                    s.last_error = Some(reason.clone());
                });
                warn!(error = %e, "Gateway failed to start");
                Err(e)
            }
        }
    }

    async fn launch(&self, profile: &Profile) -> Result<(RunHandle, &'static str), DomainError> {
        let primary = profile.primary_endpoint()?;
        let secondary = profile.secondary_endpoint()?;
        let label = primary.transport().label();

        let request = TunnelRequest::for_profile(&self.tunnel, profile);
        let device = self
            .provider
            .establish(&request)
            .await?
            .ok_or(DomainError::TunnelPermissionRequired)?;

        match self.spawn_run(device, primary, secondary).await {
            Ok(handle) => Ok((handle, label)),
            Err(e) => {
                self.shared.router.clear();
                self.provider.release().await;
                Err(e)
            }
        }
    }

    async fn spawn_run(
        &self,
        device: Arc<dyn TunnelDevice>,
        primary: UpstreamEndpoint,
        secondary: Option<UpstreamEndpoint>,
    ) -> Result<RunHandle, DomainError> {
        let protector = self.provider.protector();
        let udp_socket = Arc::new(protected::udp_socket(
            protector.as_ref(),
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        )?);

        let resolver = Arc::new(BypassResolver::new(
            Arc::clone(&protector),
            self.bootstrap,
            self.upstream.bootstrap_timeout(),
        ));
        let doq = Arc::new(DoqConnections::new(
            tls::doq_client_config_with(self.roots.clone())?,
            Arc::clone(&resolver),
            Arc::clone(&protector),
        ));
        let ctx = TransportContext {
            protector,
            udp_socket: Arc::clone(&udp_socket),
            resolver,
            doh_tls: tls::doh_client_config_with(self.roots.clone())?,
            doq: Arc::clone(&doq),
        };

        let mut mappings = vec![(self.tunnel.primary_dns, primary)];
        if let Some(secondary) = secondary {
            mappings.push((self.tunnel.secondary_dns, secondary));
        }
        self.shared.router.install(&mappings, &ctx)?;

        self.shared.pending.clear();
        *self.shared.tunnel_out.lock().await = Some(Arc::clone(&device));
        self.shared.running.store(true, Ordering::SeqCst);

        let signals = RunSignals::new();
        let workers = vec![
            tokio::spawn(workers::read_tunnel(
                Arc::clone(&self.shared),
                device,
                signals.clone(),
            )),
            tokio::spawn(workers::receive_upstream(
                Arc::clone(&self.shared),
                udp_socket,
                signals.clone(),
            )),
        ];

        Ok(RunHandle {
            signals,
            workers,
            doq,
        })
    }

    /// Idempotent. In-flight DoH/DoQ tasks finish or time out on their own;
    /// their answers are discarded.
    pub async fn stop(&self) {
        let mut run = self.run.lock().await;
        let Some(handle) = run.take() else {
            return;
        };

        self.shared.update_status(|s| s.state = GatewayState::Stopping);
        self.shared.running.store(false, Ordering::SeqCst);
        handle.signals.cancel.cancel();

        for worker in handle.workers {
            let abort = worker.abort_handle();
            if tokio::time::timeout(WORKER_JOIN_TIMEOUT, worker).await.is_err() {
                warn!("Gateway worker did not stop in time, aborting");
                abort.abort();
            }
        }

        handle.doq.close_all();
        self.shared.tunnel_out.lock().await.take();
        self.shared.router.clear();
        self.shared.pending.clear();
        self.provider.release().await;

        self.shared.update_status(|s| {
            s.state = GatewayState::Stopped;
            s.transport_label = None;
        });
        info!("Gateway stopped");
    }

    pub async fn restart(&self, profile: &Profile) -> Result<(), DomainError> {
        self.stop().await;
        self.start(profile).await
    }

    /// Takes effect for the next intercepted query, running or not.
    pub fn reload_rules(&self, rules: Vec<RewriteRule>) {
        self.shared.rewrites.reload(rules);
    }

    pub fn status(&self) -> GatewayStatus {
        self.shared.status.load().as_ref().clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    /// Resolves when a worker of the current run fails (tunnel closed,
    /// socket error). Never resolves while stopped. The owner is expected to
    /// follow up with [`GatewayLoop::stop`].
    pub async fn closed(&self) {
        let fault = self
            .run
            .lock()
            .await
            .as_ref()
            .map(|h| h.signals.fault.clone());

        match fault {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }
}
