use super::bypass::BypassResolver;
use super::{DnsTransport, TransportResponse};
use async_trait::async_trait;
use dnsgate_domain::DomainError;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::OnceCell;
use tracing::debug;

/// Plain UDP to port 53 (or an explicit port).
///
/// Sends go out on the gateway's shared protected socket and return
/// immediately; the answer is picked up by the gateway's receive loop and
/// correlated by transaction ID.
pub struct PlainTransport {
    host: String,
    port: u16,
    socket: Arc<UdpSocket>,
    resolver: Arc<BypassResolver>,
    target: OnceCell<SocketAddr>,
}

impl PlainTransport {
    pub fn new(host: &str, port: u16, socket: Arc<UdpSocket>, resolver: Arc<BypassResolver>) -> Self {
        let literal = host.parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, port));
        Self {
            host: host.to_string(),
            port,
            socket,
            resolver,
            target: OnceCell::new_with(literal),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.target.initialized()
    }

    /// Resolved once; a failed lookup is retried on the next query.
    async fn target(&self) -> Result<SocketAddr, DomainError> {
        self.target
            .get_or_try_init(|| self.resolver.resolve_socket(&self.host, self.port))
            .await
            .copied()
    }
}

#[async_trait]
impl DnsTransport for PlainTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        let target = tokio::time::timeout(timeout, self.target())
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: self.host.clone(),
            })??;

        self.socket
            .send_to(message_bytes, target)
            .await
            .map_err(|e| DomainError::TransportFailed {
                server: target.to_string(),
                reason: e.to_string(),
            })?;

        debug!(server = %target, len = message_bytes.len(), "UDP query forwarded");
        Ok(TransportResponse::Forwarded)
    }

    fn protocol_name(&self) -> &'static str {
        "UDP"
    }
}
