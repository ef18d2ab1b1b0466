use crate::net::protected;
use dnsgate_application::ports::SocketProtector;
use dnsgate_domain::dns_wire::{build_minimal_query, first_a_record, transaction_id};
use dnsgate_domain::DomainError;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const MAX_RESPONSE_SIZE: usize = 512;

/// Resolves upstream hostnames without going through the tunnel.
///
/// A single A query goes to the bootstrap resolver over a protected socket.
/// Replies from other sources or with a different transaction ID are
/// ignored until the timeout.
pub struct BypassResolver {
    protector: Arc<dyn SocketProtector>,
    server: SocketAddr,
    timeout: Duration,
}

impl BypassResolver {
    pub fn new(protector: Arc<dyn SocketProtector>, server: SocketAddr, timeout: Duration) -> Self {
        Self {
            protector,
            server,
            timeout,
        }
    }

    pub fn server(&self) -> SocketAddr {
        self.server
    }

    /// IP literals are returned as-is.
    pub async fn resolve(&self, host: &str) -> Result<IpAddr, DomainError> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }

        let query = build_minimal_query(host)?;
        let id = transaction_id(&query)
            .ok_or_else(|| DomainError::InvalidDnsMessage("bootstrap query".to_string()))?;

        let socket =
            protected::udp_socket(self.protector.as_ref(), protected::unspecified_for(&self.server))?;
        socket.send_to(&query, self.server).await?;

        let lookup = async {
            let mut buf = [0u8; MAX_RESPONSE_SIZE];
            loop {
                let (len, from) = socket.recv_from(&mut buf).await?;
                let response = &buf[..len];
                if from != self.server || transaction_id(response) != Some(id) {
                    debug!(from = %from, "Ignoring unrelated bootstrap reply");
                    continue;
                }
                return first_a_record(response)
                    .map(IpAddr::V4)
                    .ok_or_else(|| DomainError::ResolutionFailed(host.to_string()));
            }
        };

        let ip = tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: self.server.to_string(),
            })
            .and_then(|r| r)
            .inspect_err(|e| warn!(host, error = %e, "Bootstrap resolution failed"))?;

        debug!(host, ip = %ip, "Upstream host resolved outside the tunnel");
        Ok(ip)
    }

    pub async fn resolve_socket(&self, host: &str, port: u16) -> Result<SocketAddr, DomainError> {
        self.resolve(host).await.map(|ip| SocketAddr::new(ip, port))
    }
}
