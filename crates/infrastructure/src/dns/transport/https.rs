//! HTTPS Transport for DNS queries: DNS-over-HTTPS (RFC 8484)
//!
//! Sends the raw query as the body of an HTTP POST with
//! `application/dns-message` content type over a TCP connection opened from a
//! protected socket. When the configured host is an IPv4 literal of a
//! well-known provider, the TLS server name and the request authority switch
//! to the provider's hostname while the TCP connection still targets the
//! literal.
//!
//! Wire format (HTTP):
//! ```text
//! POST /dns-query HTTP/2
//! Content-Type: application/dns-message
//! Accept: application/dns-message
//!
//! <raw DNS message bytes>
//! ```
//!
//! When ALPN selects `h2` the connection is kept and shared by later
//! queries until it closes or a query on it fails. HTTP/1.1 connections
//! serve one request.

use super::bypass::BypassResolver;
use super::sni::canonical_host;
use super::{DnsTransport, TransportResponse};
use crate::net::protected;
use async_trait::async_trait;
use bytes::Bytes;
use dnsgate_application::ports::SocketProtector;
use dnsgate_domain::dns_protocol::{parse_host_port, DOH_PORT};
use dnsgate_domain::dns_wire::HEADER_LEN;
use dnsgate_domain::DomainError;
use http::header::{ACCEPT, CONTENT_TYPE, HOST};
use http::Request;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::{http1, http2};
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::pki_types::ServerName;
use std::fmt::Display;
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_rustls::TlsConnector;
use tracing::{debug, warn};

/// Expected content type for DNS-over-HTTPS (RFC 8484 §4.1)
const DNS_MESSAGE_CONTENT_TYPE: &str = "application/dns-message";
const DEFAULT_PATH: &str = "/dns-query";
const DOH_SCHEME: &str = "https://";

/// Where a DoH query is sent and under which name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DohTarget {
    url: String,
    connect_host: String,
    port: u16,
    server_name: String,
    authority: String,
    path: String,
}

impl DohTarget {
    pub fn parse(url: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidEndpoint(format!("Invalid DoH URL '{}'", url));

        let rest = url.strip_prefix(DOH_SCHEME).ok_or_else(invalid)?;
        let split = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (authority, tail) = rest.split_at(split);

        let (host, port) = parse_host_port(authority, DOH_PORT)
            .filter(|(host, _)| !host.is_empty())
            .ok_or_else(invalid)?;

        let tail = tail.split('#').next().unwrap_or_default();
        let path = if tail.starts_with('/') {
            tail.to_string()
        } else {
            format!("{}{}", DEFAULT_PATH, tail)
        };

        let server_name = host
            .parse::<Ipv4Addr>()
            .ok()
            .and_then(canonical_host)
            .unwrap_or(host)
            .to_string();

        let uri_host = if server_name.contains(':') {
            format!("[{}]", server_name)
        } else {
            server_name.clone()
        };
        let authority = if port == DOH_PORT {
            uri_host
        } else {
            format!("{}:{}", uri_host, port)
        };

        Ok(Self {
            url: url.to_string(),
            connect_host: host.to_string(),
            port,
            server_name,
            authority,
            path,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Host the TCP connection goes to, literal or hostname.
    pub fn connect_host(&self) -> &str {
        &self.connect_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Name announced in TLS SNI and checked against the certificate.
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn request_uri(&self) -> String {
        format!("{}{}{}", DOH_SCHEME, self.authority, self.path)
    }
}

enum DohConnection {
    Http1(http1::SendRequest<Full<Bytes>>),
    Http2(http2::SendRequest<Full<Bytes>>),
}

impl DohConnection {
    fn is_http2(&self) -> bool {
        matches!(self, Self::Http2(_))
    }

    async fn send_request(
        &mut self,
        request: Request<Full<Bytes>>,
    ) -> hyper::Result<http::Response<Incoming>> {
        match self {
            Self::Http1(sender) => {
                sender.ready().await?;
                sender.send_request(request).await
            }
            Self::Http2(sender) => {
                sender.ready().await?;
                sender.send_request(request).await
            }
        }
    }
}

/// DNS-over-HTTPS transport (RFC 8484)
pub struct HttpsTransport {
    target: DohTarget,
    resolver: Arc<BypassResolver>,
    protector: Arc<dyn SocketProtector>,
    connector: TlsConnector,
    h2: Mutex<Option<http2::SendRequest<Full<Bytes>>>>,
}

impl HttpsTransport {
    pub fn new(
        target: DohTarget,
        tls_config: Arc<rustls::ClientConfig>,
        resolver: Arc<BypassResolver>,
        protector: Arc<dyn SocketProtector>,
    ) -> Self {
        Self {
            target,
            resolver,
            protector,
            connector: TlsConnector::from(tls_config),
            h2: Mutex::new(None),
        }
    }

    pub fn target(&self) -> &DohTarget {
        &self.target
    }

    fn failed(&self, reason: impl Display) -> DomainError {
        DomainError::TransportFailed {
            server: self.target.url.clone(),
            reason: reason.to_string(),
        }
    }

    /// Cached HTTP/2 connection, or a fresh one. The lock is held while
    /// connecting so concurrent queries share one handshake.
    async fn connection(&self, timeout: Duration) -> Result<DohConnection, DomainError> {
        let mut cached = self.h2.lock().await;
        if let Some(sender) = cached.as_ref().filter(|s| !s.is_closed()) {
            return Ok(DohConnection::Http2(sender.clone()));
        }

        let connection = self.connect(timeout).await?;
        *cached = match &connection {
            DohConnection::Http2(sender) => Some(sender.clone()),
            DohConnection::Http1(_) => None,
        };
        Ok(connection)
    }

    async fn connect(&self, timeout: Duration) -> Result<DohConnection, DomainError> {
        let addr = self
            .resolver
            .resolve_socket(&self.target.connect_host, self.target.port)
            .await?;

        let tcp = protected::tcp_connect(self.protector.as_ref(), addr, timeout)
            .await
            .map_err(|e| match e.kind() {
                io::ErrorKind::TimedOut => DomainError::TransportTimeout {
                    server: addr.to_string(),
                },
                io::ErrorKind::ConnectionRefused => DomainError::TransportConnectionRefused {
                    server: addr.to_string(),
                },
                _ => self.failed(e),
            })?;

        let server_name = ServerName::try_from(self.target.server_name.clone())
            .map_err(|e| self.failed(format!("invalid TLS name: {}", e)))?;
        let tls = self
            .connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| self.failed(format!("TLS handshake: {}", e)))?;

        let negotiated_h2 = tls.get_ref().1.alpn_protocol() == Some(&b"h2"[..]);
        let io = TokioIo::new(tls);

        if negotiated_h2 {
            let (sender, connection) = http2::Builder::new(TokioExecutor::new())
                .handshake(io)
                .await
                .map_err(|e| self.failed(e))?;

            let url = self.target.url.clone();
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    debug!(url = %url, error = %e, "HTTP/2 connection closed");
                }
            });

            debug!(server = %addr, sni = %self.target.server_name, "DoH HTTP/2 connection established");
            Ok(DohConnection::Http2(sender))
        } else {
            let (sender, connection) = http1::handshake(io).await.map_err(|e| self.failed(e))?;

            let url = self.target.url.clone();
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    debug!(url = %url, error = %e, "HTTP/1.1 connection closed");
                }
            });

            debug!(server = %addr, sni = %self.target.server_name, "DoH HTTP/1.1 connection established");
            Ok(DohConnection::Http1(sender))
        }
    }

    fn build_request(&self, message_bytes: &[u8], http2: bool) -> Result<Request<Full<Bytes>>, DomainError> {
        // HTTP/1.1 takes origin-form plus Host; HTTP/2 derives :authority from
        // the absolute URI.
        let builder = if http2 {
            Request::post(self.target.request_uri())
        } else {
            Request::post(self.target.path.as_str()).header(HOST, self.target.authority.as_str())
        };

        builder
            .header(CONTENT_TYPE, DNS_MESSAGE_CONTENT_TYPE)
            .header(ACCEPT, DNS_MESSAGE_CONTENT_TYPE)
            .body(Full::new(Bytes::copy_from_slice(message_bytes)))
            .map_err(|e| self.failed(e))
    }

    async fn exchange(&self, message_bytes: &[u8], timeout: Duration) -> Result<Vec<u8>, DomainError> {
        let mut connection = self.connection(timeout).await?;
        let request = self.build_request(message_bytes, connection.is_http2())?;

        let response = connection
            .send_request(request)
            .await
            .map_err(|e| self.failed(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::UpstreamHttpStatus {
                server: self.target.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| self.failed(e))?
            .to_bytes();

        if body.len() < HEADER_LEN {
            return Err(DomainError::InvalidDnsMessage(format!(
                "DoH body from {} is {} bytes",
                self.target.url,
                body.len()
            )));
        }

        Ok(body.to_vec())
    }
}

#[async_trait]
impl DnsTransport for HttpsTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        debug!(
            url = %self.target.url,
            sni = %self.target.server_name,
            message_len = message_bytes.len(),
            "Sending DoH query"
        );

        let result = tokio::time::timeout(timeout, self.exchange(message_bytes, timeout))
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: self.target.url.clone(),
            })
            .and_then(|r| r);

        match result {
            Ok(bytes) => {
                debug!(url = %self.target.url, response_len = bytes.len(), "DoH response received");
                Ok(TransportResponse::Answer(bytes))
            }
            Err(e) => {
                self.h2.lock().await.take();
                warn!(url = %self.target.url, error = %e, "DoH query failed");
                Err(e)
            }
        }
    }

    fn protocol_name(&self) -> &'static str {
        "HTTPS"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_is_dropped() {
        let target = DohTarget::parse("https://dns.example/q#frag").unwrap();
        assert_eq!(target.path(), "/q");
    }

    #[test]
    fn test_bare_query_string_gets_default_path() {
        let target = DohTarget::parse("https://dns.example?ct").unwrap();
        assert_eq!(target.path(), "/dns-query?ct");
    }

    #[test]
    fn test_ipv6_literal_is_bracketed() {
        let target = DohTarget::parse("https://[2606:4700:4700::1111]:8443/dns-query").unwrap();
        assert_eq!(target.connect_host(), "2606:4700:4700::1111");
        assert_eq!(target.authority(), "[2606:4700:4700::1111]:8443");
    }
}
