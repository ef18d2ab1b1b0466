//! QUIC Transport for DNS queries: DNS-over-QUIC (RFC 9250)
//!
//! One connection per `host:port`, kept in [`DoqConnections`] and recreated
//! lazily after any failure. Each query opens one bidirectional stream,
//! writes a 2-byte big-endian length prefix and the query with its ID
//! zeroed, finishes the send side, then reads until the peer finishes or
//! 64 KiB arrive. The original ID is put back into the answer.

use super::bypass::BypassResolver;
use super::{DnsTransport, TransportResponse};
use crate::net::protected;
use async_trait::async_trait;
use dashmap::DashMap;
use dnsgate_application::ports::SocketProtector;
use dnsgate_domain::dns_protocol::{parse_host_port, DOQ_PORT};
use dnsgate_domain::dns_wire::{set_transaction_id, transaction_id, HEADER_LEN};
use dnsgate_domain::DomainError;
use std::fmt::Display;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const DOQ_SCHEME: &str = "quic://";
const LENGTH_PREFIX_LEN: usize = 2;
const MAX_RESPONSE_BYTES: usize = 64 * 1024;
const READ_CHUNK: usize = 4096;
/// Length prefix plus a DNS header.
const MIN_FRAMED_RESPONSE: usize = LENGTH_PREFIX_LEN + HEADER_LEN;
/// Application error code for a clean close (RFC 9250 DOQ_NO_ERROR).
const DOQ_NO_ERROR: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoqTarget {
    host: String,
    port: u16,
}

impl DoqTarget {
    /// Accepts `quic://host[:port][/path]`; the path is ignored.
    pub fn parse(url: &str) -> Result<Self, DomainError> {
        let invalid = || DomainError::InvalidEndpoint(format!("Invalid DoQ URL '{}'", url));

        let rest = url.strip_prefix(DOQ_SCHEME).ok_or_else(invalid)?;
        let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        let (host, port) = parse_host_port(&rest[..end], DOQ_PORT)
            .filter(|(host, _)| !host.is_empty())
            .ok_or_else(invalid)?;

        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Connection table key.
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Zeroes the transaction ID and prepends the length. Returns the original
/// ID alongside the framed bytes.
pub fn frame_query(query: &[u8]) -> Result<(u16, Vec<u8>), DomainError> {
    let id = transaction_id(query).ok_or_else(|| {
        DomainError::InvalidDnsMessage(format!("{} byte query has no header", query.len()))
    })?;
    let len = u16::try_from(query.len()).map_err(|_| {
        DomainError::InvalidDnsMessage(format!("{} byte query is too large", query.len()))
    })?;

    let mut framed = Vec::with_capacity(LENGTH_PREFIX_LEN + query.len());
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(query);
    set_transaction_id(&mut framed[LENGTH_PREFIX_LEN..], 0);
    Ok((id, framed))
}

/// Strips the length prefix and restores `original_id`. A declared length
/// larger than what arrived is tolerated: everything available is used.
pub fn unframe_response(raw: &[u8], original_id: u16) -> Result<Vec<u8>, DomainError> {
    if raw.len() < MIN_FRAMED_RESPONSE {
        return Err(DomainError::InvalidDnsMessage(format!(
            "DoQ response of {} bytes is too short",
            raw.len()
        )));
    }

    let declared = u16::from_be_bytes([raw[0], raw[1]]) as usize;
    let end = (LENGTH_PREFIX_LEN + declared).min(raw.len());
    let mut message = raw[LENGTH_PREFIX_LEN..end].to_vec();
    set_transaction_id(&mut message, original_id);
    Ok(message)
}

struct LiveConnection {
    connection: quinn::Connection,
    endpoint: quinn::Endpoint,
}

impl LiveConnection {
    fn close(&self) {
        self.connection.close(DOQ_NO_ERROR.into(), b"");
        self.endpoint.close(DOQ_NO_ERROR.into(), b"");
    }
}

/// One slot per `host:port`. The lock is held across connection setup so
/// concurrent first queries share a single handshake.
type Slot = Arc<Mutex<Option<LiveConnection>>>;

/// Live QUIC connections keyed by `host:port`. Each connection owns its own
/// protected endpoint.
pub struct DoqConnections {
    conns: DashMap<String, Slot>,
    client_config: quinn::ClientConfig,
    resolver: Arc<BypassResolver>,
    protector: Arc<dyn SocketProtector>,
}

impl DoqConnections {
    pub fn new(
        client_config: quinn::ClientConfig,
        resolver: Arc<BypassResolver>,
        protector: Arc<dyn SocketProtector>,
    ) -> Self {
        Self {
            conns: DashMap::new(),
            client_config,
            resolver,
            protector,
        }
    }

    /// Keys holding a connection or currently connecting.
    pub fn len(&self) -> usize {
        self.conns
            .iter()
            .filter(|slot| slot.value().try_lock().map_or(true, |live| live.is_some()))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn get_or_connect(
        &self,
        target: &DoqTarget,
        timeout: Duration,
    ) -> Result<quinn::Connection, DomainError> {
        let slot = Arc::clone(self.conns.entry(target.key()).or_default().value());
        let mut live = slot.lock().await;

        if let Some(current) = live.as_ref() {
            if current.connection.close_reason().is_none() {
                return Ok(current.connection.clone());
            }
            debug!(server = %target.key(), "QUIC connection closed by peer, reconnecting");
        }

        let fresh = self.connect(target, timeout).await?;
        let conn = fresh.connection.clone();
        // Streams still open on a replaced connection keep it alive until
        // they finish.
        *live = Some(fresh);
        Ok(conn)
    }

    async fn connect(
        &self,
        target: &DoqTarget,
        timeout: Duration,
    ) -> Result<LiveConnection, DomainError> {
        let server_addr = self.resolver.resolve_socket(&target.host, target.port).await?;
        let failed = |reason: &dyn Display| DomainError::TransportFailed {
            server: target.key(),
            reason: reason.to_string(),
        };

        let socket = protected::std_udp_socket(
            self.protector.as_ref(),
            protected::unspecified_for(&server_addr),
        )?;
        let mut endpoint = quinn::Endpoint::new(
            quinn::EndpointConfig::default(),
            None,
            socket,
            Arc::new(quinn::TokioRuntime),
        )
        .map_err(|e| failed(&e))?;
        endpoint.set_default_client_config(self.client_config.clone());

        let connecting = endpoint
            .connect(server_addr, &target.host)
            .map_err(|e| failed(&e))?;

        let connection = tokio::time::timeout(timeout, connecting)
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: target.key(),
            })?
            .map_err(|e| DomainError::TransportConnectionRefused {
                server: format!("{}({}): {}", target.key(), server_addr, e),
            })?;

        info!(server = %target.key(), addr = %server_addr, "QUIC connected");
        Ok(LiveConnection {
            connection,
            endpoint,
        })
    }

    /// Forgets `failed` if it is still the connection cached for `key`.
    /// Streams other queries have open on it are left to finish.
    async fn invalidate(&self, key: &str, failed: &quinn::Connection) {
        let Some(slot) = self.conns.get(key).map(|slot| Arc::clone(slot.value())) else {
            return;
        };
        let mut live = slot.lock().await;
        if live
            .as_ref()
            .is_some_and(|current| current.connection.stable_id() == failed.stable_id())
        {
            live.take();
        }
    }

    pub fn close_all(&self) {
        let mut closed = 0;
        for slot in self.conns.iter() {
            if let Ok(mut live) = slot.value().try_lock() {
                if let Some(current) = live.take() {
                    current.close();
                    closed += 1;
                }
            }
        }
        self.conns.clear();
        if closed > 0 {
            debug!(closed, "QUIC connections closed");
        }
    }
}

/// DNS-over-QUIC transport (RFC 9250)
pub struct QuicTransport {
    target: DoqTarget,
    connections: Arc<DoqConnections>,
}

impl QuicTransport {
    pub fn new(target: DoqTarget, connections: Arc<DoqConnections>) -> Self {
        Self {
            target,
            connections,
        }
    }

    pub fn target(&self) -> &DoqTarget {
        &self.target
    }

    async fn send_on_stream(
        conn: &quinn::Connection,
        framed: &[u8],
        timeout: Duration,
        server: &str,
    ) -> Result<Vec<u8>, DomainError> {
        let deadline = Instant::now() + timeout;
        let timed_out = || DomainError::TransportTimeout {
            server: server.to_string(),
        };
        let failed = |reason: String| DomainError::TransportFailed {
            server: server.to_string(),
            reason,
        };

        let (mut send_stream, mut recv_stream) = tokio::time::timeout(timeout, conn.open_bi())
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| failed(format!("open stream: {}", e)))?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::timeout(remaining, send_stream.write_all(framed))
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| failed(format!("write: {}", e)))?;

        send_stream
            .finish()
            .map_err(|e| failed(format!("finish: {}", e)))?;

        let remaining = deadline.saturating_duration_since(Instant::now());
        tokio::time::timeout(remaining, read_response(&mut recv_stream))
            .await
            .map_err(|_| timed_out())?
            .map_err(|e| failed(format!("read: {}", e)))
    }
}

/// Reads until the peer finishes its side or the byte budget is spent.
async fn read_response<R>(stream: &mut R) -> io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut response = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    while response.len() < MAX_RESPONSE_BYTES {
        let budget = (MAX_RESPONSE_BYTES - response.len()).min(READ_CHUNK);
        match stream.read(&mut chunk[..budget]).await? {
            0 => break,
            n => response.extend_from_slice(&chunk[..n]),
        }
    }
    Ok(response)
}

#[async_trait]
impl DnsTransport for QuicTransport {
    async fn send(
        &self,
        message_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TransportResponse, DomainError> {
        let (original_id, framed) = frame_query(message_bytes)?;
        let key = self.target.key();

        let conn = match self.connections.get_or_connect(&self.target, timeout).await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(server = %key, error = %e, "DoQ connection failed");
                return Err(e);
            }
        };

        let result = async {
            let raw = Self::send_on_stream(&conn, &framed, timeout, &key).await?;
            unframe_response(&raw, original_id)
        }
        .await;

        match result {
            Ok(response) => {
                debug!(server = %key, response_len = response.len(), "QUIC response received");
                Ok(TransportResponse::Answer(response))
            }
            Err(e) => {
                self.connections.invalidate(&key, &conn).await;
                warn!(server = %key, error = %e, "DoQ query failed, connection dropped");
                Err(e)
            }
        }
    }

    fn protocol_name(&self) -> &'static str {
        "QUIC"
    }
}
