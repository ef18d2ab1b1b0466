//! Shared TLS client configuration
//!
//! Built once per client and reused for every handshake; rustls keeps an
//! in-memory session cache so reconnects resume instead of doing a full
//! handshake.

use dnsgate_domain::DomainError;
use std::sync::Arc;
use std::time::Duration;

const SESSION_CACHE_SIZE: usize = 64;
const QUIC_KEEP_ALIVE: Duration = Duration::from_secs(15);
const QUIC_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Mozilla's root program, as bundled by `webpki-roots`.
pub fn webpki_root_store() -> rustls::RootCertStore {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    root_store
}

fn base_config(
    root_store: rustls::RootCertStore,
    alpn: &[&[u8]],
) -> Result<rustls::ClientConfig, DomainError> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let mut config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| DomainError::TransportFailed {
            server: "tls".to_string(),
            reason: format!("TLS protocol setup failed: {}", e),
        })?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    config.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();
    config.resumption = rustls::client::Resumption::in_memory_sessions(SESSION_CACHE_SIZE);
    Ok(config)
}

/// Offers `h2` first and falls back to HTTP/1.1.
pub fn doh_client_config() -> Result<Arc<rustls::ClientConfig>, DomainError> {
    doh_client_config_with(webpki_root_store())
}

pub fn doh_client_config_with(
    root_store: rustls::RootCertStore,
) -> Result<Arc<rustls::ClientConfig>, DomainError> {
    base_config(root_store, &[b"h2", b"http/1.1"]).map(Arc::new)
}

/// RFC 9250 ALPN `doq`, with keep-alives so idle connections survive
/// between queries.
pub fn doq_client_config() -> Result<quinn::ClientConfig, DomainError> {
    doq_client_config_with(webpki_root_store())
}

pub fn doq_client_config_with(
    root_store: rustls::RootCertStore,
) -> Result<quinn::ClientConfig, DomainError> {
    let tls = base_config(root_store, &[b"doq"])?;
    let quic_tls = quinn::crypto::rustls::QuicClientConfig::try_from(Arc::new(tls)).map_err(|e| {
        DomainError::TransportFailed {
            server: "quic".to_string(),
            reason: format!("QUIC TLS setup failed: {}", e),
        }
    })?;

    let mut transport = quinn::TransportConfig::default();
    transport.keep_alive_interval(Some(QUIC_KEEP_ALIVE));
    if let Ok(idle) = quinn::IdleTimeout::try_from(QUIC_IDLE_TIMEOUT) {
        transport.max_idle_timeout(Some(idle));
    }

    let mut config = quinn::ClientConfig::new(Arc::new(quic_tls));
    config.transport_config(Arc::new(transport));
    Ok(config)
}
