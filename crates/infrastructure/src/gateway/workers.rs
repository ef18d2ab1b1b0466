use crate::dns::router::{Route, UpstreamRouter};
use crate::dns::transport::TransportResponse;
use crate::packet::{ipv4_udp, DNS_PORT};
use arc_swap::ArcSwap;
use dnsgate_application::ports::TunnelDevice;
use dnsgate_application::services::{
    PendingRequest, PendingRequestTable, RewriteEngine, RewriteOutcome,
};
use dnsgate_domain::dns_wire::{transaction_id, HEADER_LEN};
use dnsgate_domain::{GatewayState, GatewayStatus};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

/// Largest IPv4 datagram; the tunnel MTU never exceeds it.
const MAX_FRAME_LEN: usize = 65_535;
const MAX_UDP_RESPONSE_LEN: usize = 65_535;

/// State shared by the lifecycle owner, the workers and per-query tasks.
pub(super) struct Shared {
    pub(super) rewrites: RewriteEngine,
    pub(super) pending: PendingRequestTable,
    pub(super) router: UpstreamRouter,
    /// Every write to the tunnel happens under this lock.
    pub(super) tunnel_out: Mutex<Option<Arc<dyn TunnelDevice>>>,
    pub(super) running: AtomicBool,
    pub(super) status: ArcSwap<GatewayStatus>,
    pub(super) timeout: Duration,
}

/// Cancellation for one run. `cancel` stops the workers; `fault` is only
/// tripped when a worker dies on its own.
#[derive(Clone)]
pub(super) struct RunSignals {
    pub(super) cancel: CancellationToken,
    pub(super) fault: CancellationToken,
}

impl RunSignals {
    pub(super) fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            fault: CancellationToken::new(),
        }
    }
}

impl Shared {
    pub(super) fn update_status<F>(&self, update: F)
    where
        F: Fn(&mut GatewayStatus),
    {
        self.status.rcu(|current| {
            let mut next = GatewayStatus::clone(current);
            update(&mut next);
            next
        });
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn fault(&self, signals: &RunSignals, reason: String) {
        if signals.fault.is_cancelled() || !self.is_running() {
            return;
        }
        error!(reason = %reason, "Gateway worker failed");
        self.update_status(|s| {
            s.state = GatewayState::Stopping;
            s.last_error = Some(reason.clone());
        });
        signals.cancel.cancel();
        signals.fault.cancel();
    }

    async fn handle_frame(self: &Arc<Self>, frame: &[u8]) {
        let Some(datagram) = ipv4_udp::parse(frame) else {
            return;
        };
        if datagram.payload.len() < HEADER_LEN {
            return;
        }
        let Some(route) = self.router.route(datagram.dst_ip) else {
            trace!(dst = %datagram.dst_ip, "DNS packet for unknown resolver address");
            return;
        };
        let Some(id) = transaction_id(datagram.payload) else {
            return;
        };

        let mut request = PendingRequest::new(datagram.src_ip, datagram.src_port, datagram.dst_ip);
        let outcome = self.rewrites.apply(datagram.payload);
        debug!(
            id,
            domain = outcome.queried_name().unwrap_or("<unreadable>"),
            rewritten = outcome.is_rewritten(),
            upstream = %route.endpoint,
            "Query intercepted"
        );

        let query = match outcome {
            RewriteOutcome::Rewritten {
                query,
                original_qname,
                ..
            } => {
                request = request.rewritten(original_qname);
                query
            }
            RewriteOutcome::PassThrough { .. } => datagram.payload.to_vec(),
        };

        if self.pending.insert(id, request).is_some() {
            debug!(id, "Transaction ID reused, replacing pending entry");
        }

        if route.transport.may_block() {
            let shared = Arc::clone(self);
            tokio::spawn(async move { shared.forward_and_deliver(route, id, query).await });
        } else if let Err(e) = route.transport.send(&query, self.timeout).await {
            warn!(id, upstream = %route.endpoint, error = %e, "Forwarding failed");
        }
    }

    async fn forward_and_deliver(self: Arc<Self>, route: Arc<Route>, id: u16, query: Vec<u8>) {
        match route.transport.send(&query, self.timeout).await {
            Ok(TransportResponse::Answer(response)) => self.deliver(id, &response).await,
            Ok(TransportResponse::Forwarded) => {}
            // The transport already logged it; the pending entry ages out.
            Err(e) => debug!(id, upstream = %route.endpoint, error = %e, "Query dropped"),
        }
    }

    /// Correlates an upstream answer with its client and writes it back into
    /// the tunnel. Unknown or expired IDs are dropped.
    async fn deliver(&self, id: u16, response: &[u8]) {
        let Some(pending) = self.pending.remove(id) else {
            trace!(id, "No pending request for response");
            return;
        };

        let payload = match pending.original_qname.as_deref() {
            Some(original) if pending.was_rewritten => RewriteEngine::restore(response, original),
            _ => response.to_vec(),
        };

        let frame = match ipv4_udp::build(
            pending.dst_ip,
            pending.src_ip,
            DNS_PORT,
            pending.src_port,
            &payload,
        ) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(id, error = %e, "Could not frame response");
                return;
            }
        };

        let out = self.tunnel_out.lock().await;
        if !self.is_running() {
            return;
        }
        if let Some(device) = out.as_ref() {
            if let Err(e) = device.send(&frame).await {
                warn!(id, error = %e, "Tunnel write failed");
            }
        }
    }
}

pub(super) async fn read_tunnel(
    shared: Arc<Shared>,
    device: Arc<dyn TunnelDevice>,
    signals: RunSignals,
) {
    let mut buf = vec![0u8; MAX_FRAME_LEN];

    loop {
        let read = tokio::select! {
            _ = signals.cancel.cancelled() => break,
            read = device.recv(&mut buf) => read,
        };

        match read {
            Ok(0) => {
                shared.fault(&signals, "tunnel closed".to_string());
                break;
            }
            Ok(n) => shared.handle_frame(&buf[..n]).await,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                shared.fault(&signals, format!("tunnel read failed: {}", e));
                break;
            }
        }
    }
    debug!("Tunnel reader exited");
}

pub(super) async fn receive_upstream(
    shared: Arc<Shared>,
    socket: Arc<UdpSocket>,
    signals: RunSignals,
) {
    let mut buf = vec![0u8; MAX_UDP_RESPONSE_LEN];

    loop {
        let received = tokio::select! {
            _ = signals.cancel.cancelled() => break,
            received = socket.recv_from(&mut buf) => received,
        };

        match received {
            Ok((n, from)) => {
                if n <= HEADER_LEN {
                    continue;
                }
                let response = &buf[..n];
                if let Some(id) = transaction_id(response) {
                    trace!(id, from = %from, len = n, "Upstream response");
                    shared.deliver(id, response).await;
                }
            }
            // ICMP unreachable from one upstream must not take the loop down.
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::ConnectionRefused
                        | io::ErrorKind::ConnectionReset
                        | io::ErrorKind::Interrupted
                ) =>
            {
                debug!(error = %e, "Transient upstream socket error");
            }
            Err(e) => {
                shared.fault(&signals, format!("upstream socket failed: {}", e));
                break;
            }
        }
    }
    debug!("Upstream receiver exited");
}
