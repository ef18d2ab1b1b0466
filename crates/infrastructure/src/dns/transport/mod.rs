pub mod bypass;
pub mod https;
pub mod plain;
pub mod quic;
pub mod sni;
pub mod tls;

use async_trait::async_trait;
use dnsgate_application::ports::SocketProtector;
use dnsgate_domain::{DomainError, TransportKind, UpstreamEndpoint};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

pub use bypass::BypassResolver;
pub use https::{DohTarget, HttpsTransport};
pub use plain::PlainTransport;
pub use quic::{DoqConnections, DoqTarget, QuicTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportResponse {
    /// Sent on the shared socket; the answer arrives through the gateway's
    /// receive loop.
    Forwarded,
    /// Complete answer with the client's transaction ID.
    Answer(Vec<u8>),
}

#[async_trait]
pub trait DnsTransport: Send + Sync {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError>;

    fn protocol_name(&self) -> &'static str;
}

pub enum Transport {
    Plain(PlainTransport),
    Https(HttpsTransport),
    Quic(QuicTransport),
}

impl Transport {
    pub async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        match self {
            Self::Plain(t) => DnsTransport::send(t, message_bytes, timeout).await,
            Self::Https(t) => DnsTransport::send(t, message_bytes, timeout).await,
            Self::Quic(t) => DnsTransport::send(t, message_bytes, timeout).await,
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self {
            Self::Plain(t) => t.protocol_name(),
            Self::Https(t) => t.protocol_name(),
            Self::Quic(t) => t.protocol_name(),
        }
    }

    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Plain(_) => TransportKind::Plain,
            Self::Https(_) => TransportKind::Doh,
            Self::Quic(_) => TransportKind::Doq,
        }
    }

    /// Whether `send` may wait on the network: DoH and DoQ wait for the
    /// answer, Plain waits only until its upstream address is resolved.
    /// Such sends belong off the packet reading path.
    pub fn may_block(&self) -> bool {
        match self {
            Self::Plain(t) => !t.is_resolved(),
            Self::Https(_) | Self::Quic(_) => true,
        }
    }
}

/// Shared resources every transport is built from during one gateway run.
#[derive(Clone)]
pub struct TransportContext {
    pub protector: Arc<dyn SocketProtector>,
    /// Protected socket whose replies feed the gateway's receive loop.
    pub udp_socket: Arc<UdpSocket>,
    pub resolver: Arc<BypassResolver>,
    pub doh_tls: Arc<rustls::ClientConfig>,
    pub doq: Arc<DoqConnections>,
}

pub fn create_transport(
    endpoint: &UpstreamEndpoint,
    ctx: &TransportContext,
) -> Result<Transport, DomainError> {
    match endpoint.transport() {
        TransportKind::Plain => {
            let (host, port) = endpoint.host_port()?;
            Ok(Transport::Plain(PlainTransport::new(
                host,
                port,
                Arc::clone(&ctx.udp_socket),
                Arc::clone(&ctx.resolver),
            )))
        }
        TransportKind::Doh => Ok(Transport::Https(HttpsTransport::new(
            DohTarget::parse(endpoint.address())?,
            Arc::clone(&ctx.doh_tls),
            Arc::clone(&ctx.resolver),
            Arc::clone(&ctx.protector),
        ))),
        TransportKind::Doq => Ok(Transport::Quic(QuicTransport::new(
            DoqTarget::parse(endpoint.address())?,
            Arc::clone(&ctx.doq),
        ))),
    }
}
